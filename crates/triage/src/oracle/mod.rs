//! Reasoning model contract.
//!
//! The model receives the full session context on every turn and answers with
//! an action request, a final analysis, or free-form text.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::errors::TriageResult;

pub use openai::OpenAiOracle;

/// Read-only diagnostic actions the model may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    DescribePod,
    Logs,
    DescribeDeployment,
    GetConfigmap,
    GetEvents,
    Stop,
}

impl ActionType {
    /// Wire tag, e.g. `DESCRIBE_POD`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DescribePod => "DESCRIBE_POD",
            Self::Logs => "LOGS",
            Self::DescribeDeployment => "DESCRIBE_DEPLOYMENT",
            Self::GetConfigmap => "GET_CONFIGMAP",
            Self::GetEvents => "GET_EVENTS",
            Self::Stop => "STOP",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diagnostic action requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub action: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ActionRequest {
    pub fn new(action: ActionType) -> Self {
        Self {
            action,
            namespace: None,
            name: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Treat empty strings from the model as absent.
    fn normalized(mut self) -> Self {
        self.namespace = self.namespace.filter(|s| !s.is_empty());
        self.name = self.name.filter(|s| !s.is_empty());
        self
    }
}

impl fmt::Display for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type={} namespace={} name={}",
            self.action,
            self.namespace.as_deref().unwrap_or("-"),
            self.name.as_deref().unwrap_or("-")
        )
    }
}

/// The model's conclusion for the current target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FinalAnalysis {
    #[serde(alias = "rootCause")]
    pub root_cause: String,
    pub remediation: String,
}

/// One reply from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleResponse {
    Action(ActionRequest),
    Analysis(FinalAnalysis),
    /// Action-shaped reply whose `type` tag is not one we know
    UnknownAction {
        tag: String,
        namespace: Option<String>,
        name: Option<String>,
    },
    /// Anything else, as raw text or pretty-printed JSON
    Text(String),
}

/// Client for the reasoning model.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Submit the full accumulated context and return the model's reply.
    async fn run(&self, context: &str) -> TriageResult<OracleResponse>;
}

/// Strip a Markdown code fence around a JSON reply.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"));
    inner.map_or(text, str::trim)
}

fn action_shaped(object: &serde_json::Map<String, Value>) -> bool {
    object
        .keys()
        .all(|key| matches!(key.as_str(), "type" | "namespace" | "name"))
}

fn optional_string(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Classify a raw model reply.
///
/// Shapes must match exactly: an object with extra keys is neither an action
/// nor an analysis and falls through to pretty-printed JSON text.
#[must_use]
pub fn parse_oracle_reply(text: &str) -> OracleResponse {
    let body = strip_code_fence(text);
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return OracleResponse::Text(text.trim().to_string());
    };

    if let Ok(action) = serde_json::from_value::<ActionRequest>(value.clone()) {
        return OracleResponse::Action(action.normalized());
    }
    if let Ok(analysis) = serde_json::from_value::<FinalAnalysis>(value.clone()) {
        return OracleResponse::Analysis(analysis);
    }

    if let Some(object) = value.as_object() {
        if let Some(tag) = object.get("type").and_then(Value::as_str) {
            if action_shaped(object) {
                return OracleResponse::UnknownAction {
                    tag: tag.to_string(),
                    namespace: optional_string(object, "namespace"),
                    name: optional_string(object, "name"),
                };
            }
        }
    }

    OracleResponse::Text(serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string()))
}
