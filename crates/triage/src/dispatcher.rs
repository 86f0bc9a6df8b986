//! Maps model action requests to read-only `kubectl` queries.
//!
//! Nothing here returns an error to the session: command failures, missing
//! fields and unknown actions all come back as text for the context.

use dialoguer::{theme::ColorfulTheme, Select};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cluster::ClusterQuery;
use crate::command::{execute, CommandRunner};
use crate::config::TriageConfig;
use crate::errors::TriageResult;
use crate::oracle::{ActionRequest, ActionType};
use crate::record::FailingPodRecord;

/// Chooses one container when a pod has several.
pub trait ContainerPicker: Send + Sync {
    /// Index into `containers` of the chosen container.
    fn pick(&self, pod: &str, containers: &[String]) -> TriageResult<usize>;
}

/// Interactive [`ContainerPicker`] on the terminal.
#[derive(Debug, Default)]
pub struct DialoguerPicker;

impl ContainerPicker for DialoguerPicker {
    fn pick(&self, pod: &str, containers: &[String]) -> TriageResult<usize> {
        let index = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Multiple containers in {pod}, select one"))
            .default(0)
            .items(containers)
            .interact()?;
        Ok(index)
    }
}

/// Result of one dispatched action, ready to be appended to the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Action tag, e.g. `LOGS`
    pub label: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub output: String,
}

impl DispatchOutcome {
    /// Outcome for an action tag outside the known set.
    pub fn unknown(tag: &str, namespace: Option<String>, name: Option<String>) -> Self {
        Self {
            label: tag.to_string(),
            namespace,
            name,
            output: format!("Unknown action: {tag}"),
        }
    }

    /// `# Result of TYPE (ns/name)` block for the session context.
    #[must_use]
    pub fn context_block(&self) -> String {
        format!(
            "\n\n# Result of {} ({}/{})\n{}\n",
            self.label,
            self.namespace.as_deref().unwrap_or("-"),
            self.name.as_deref().unwrap_or("-"),
            self.output
        )
    }
}

/// Container names from a pod spec: init containers first, then regular
/// containers, first occurrence wins.
#[must_use]
pub fn container_names(pod: &k8s_openapi::api::core::v1::Pod) -> Vec<String> {
    let Some(spec) = pod.spec.as_ref() else {
        return Vec::new();
    };
    let mut names: Vec<String> = Vec::new();
    for container in spec
        .init_containers
        .iter()
        .flatten()
        .chain(spec.containers.iter())
    {
        if !container.name.is_empty() && !names.contains(&container.name) {
            names.push(container.name.clone());
        }
    }
    names
}

/// Build the argv for an action whose fields are already resolved.
#[must_use]
pub fn build_argv(
    kubectl: &str,
    action: ActionType,
    namespace: &str,
    name: &str,
    tail_lines: u32,
    container: Option<&str>,
) -> Vec<String> {
    let parts: Vec<String> = match action {
        ActionType::DescribePod => vec![
            "describe".into(),
            "pod".into(),
            name.into(),
            "-n".into(),
            namespace.into(),
        ],
        ActionType::Logs => {
            let mut parts: Vec<String> = vec![
                "logs".into(),
                name.into(),
                "-n".into(),
                namespace.into(),
                format!("--tail={tail_lines}"),
            ];
            if let Some(container) = container {
                parts.push("-c".into());
                parts.push(container.into());
            }
            parts
        }
        ActionType::DescribeDeployment => vec![
            "describe".into(),
            "deployment".into(),
            name.into(),
            "-n".into(),
            namespace.into(),
        ],
        ActionType::GetConfigmap => vec![
            "get".into(),
            "configmap".into(),
            name.into(),
            "-n".into(),
            namespace.into(),
            "-o".into(),
            "yaml".into(),
        ],
        ActionType::GetEvents => vec![
            "get".into(),
            "events".into(),
            "-n".into(),
            namespace.into(),
        ],
        ActionType::Stop => Vec::new(),
    };
    std::iter::once(kubectl.to_string()).chain(parts).collect()
}

/// Required `(namespace, name)` for an action, or the first missing field.
fn required_fields<'a>(
    action: ActionType,
    namespace: Option<&'a str>,
    name: Option<&'a str>,
) -> Result<(&'a str, &'a str), &'static str> {
    let namespace = namespace.ok_or("namespace")?;
    match action {
        ActionType::GetEvents => Ok((namespace, "")),
        _ => Ok((namespace, name.ok_or("name")?)),
    }
}

/// How a LOGS query is qualified by container.
enum ContainerChoice {
    Named(String),
    /// Containers could not be enumerated; query without `-c`
    Unqualified,
    /// Several containers and no valid selection; run nothing
    Cancelled,
}

/// Executes model action requests against the cluster.
pub struct ActionDispatcher {
    runner: Arc<dyn CommandRunner>,
    cluster: Arc<dyn ClusterQuery>,
    picker: Arc<dyn ContainerPicker>,
    kubectl: String,
    tail_lines: u32,
}

impl ActionDispatcher {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        cluster: Arc<dyn ClusterQuery>,
        picker: Arc<dyn ContainerPicker>,
        config: &TriageConfig,
    ) -> Self {
        Self {
            runner,
            cluster,
            picker,
            kubectl: config.kubectl.clone(),
            tail_lines: config.log_tail_lines,
        }
    }

    /// Run the query for `request`. Only `LOGS` falls back to the current
    /// target for omitted fields.
    pub async fn dispatch(
        &self,
        request: &ActionRequest,
        target: &FailingPodRecord,
    ) -> DispatchOutcome {
        let (namespace, name) = match request.action {
            ActionType::Logs => (
                Some(
                    request
                        .namespace
                        .clone()
                        .unwrap_or_else(|| target.namespace.clone()),
                ),
                Some(request.name.clone().unwrap_or_else(|| target.name.clone())),
            ),
            _ => (request.namespace.clone(), request.name.clone()),
        };

        let output = if request.action == ActionType::Stop {
            "STOP requires no cluster query".to_string()
        } else {
            match required_fields(request.action, namespace.as_deref(), name.as_deref()) {
                Err(missing) => {
                    warn!(action = %request.action, field = missing, "Action request is missing a field");
                    format!(
                        "Error: {} requires '{missing}' from the model; nothing was executed",
                        request.action
                    )
                }
                Ok((ns, object_name)) => self.run_query(request.action, ns, object_name).await,
            }
        };

        DispatchOutcome {
            label: request.action.to_string(),
            namespace,
            name,
            output,
        }
    }

    async fn run_query(&self, action: ActionType, namespace: &str, name: &str) -> String {
        let container = if action == ActionType::Logs {
            match self.select_container(namespace, name).await {
                ContainerChoice::Named(container) => Some(container),
                ContainerChoice::Unqualified => None,
                ContainerChoice::Cancelled => {
                    return format!(
                        "Error: container selection for {name} was cancelled; nothing was executed"
                    );
                }
            }
        } else {
            None
        };
        let argv = build_argv(
            &self.kubectl,
            action,
            namespace,
            name,
            self.tail_lines,
            container.as_deref(),
        );
        execute(self.runner.as_ref(), &argv).await
    }

    /// Pick the container to read logs from.
    async fn select_container(&self, namespace: &str, pod: &str) -> ContainerChoice {
        let names = match self.cluster.get_pod(namespace, pod).await {
            Ok(found) => container_names(&found),
            Err(e) => {
                warn!(namespace, pod, error = %e, "Could not enumerate containers");
                return ContainerChoice::Unqualified;
            }
        };

        match names.len() {
            0 => ContainerChoice::Unqualified,
            1 => names
                .into_iter()
                .next()
                .map_or(ContainerChoice::Unqualified, ContainerChoice::Named),
            _ => match self.picker.pick(pod, &names) {
                Ok(index) => match names.get(index) {
                    Some(chosen) => {
                        debug!(pod, container = %chosen, "Container selected");
                        ContainerChoice::Named(chosen.clone())
                    }
                    None => {
                        warn!(pod, index, "Container selection out of range");
                        ContainerChoice::Cancelled
                    }
                },
                Err(e) => {
                    warn!(pod, error = %e, "Container selection failed");
                    ContainerChoice::Cancelled
                }
            },
        }
    }
}
