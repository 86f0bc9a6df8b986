//! Controller resolution through owner-reference chains.
//!
//! Resolution is best-effort: any failure collapses to "no controller" at
//! [`ControllerResolver::resolve`] and never aborts a scan.

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cluster::ClusterQuery;
use crate::errors::TriageError;
use crate::record::{ControllerKind, ControllerRef};

/// Why a controller could not be resolved.
#[derive(Error, Debug)]
pub enum ResolutionFailure {
    #[error("owner reference is missing its kind or name (kind='{kind}', name='{name}')")]
    IncompleteOwnerReference { kind: String, name: String },

    #[error("lookup of {kind} '{name}' failed: {source}")]
    Lookup {
        kind: &'static str,
        name: String,
        #[source]
        source: TriageError,
    },

    #[error("{kind} '{name}' has no namespace to look it up in")]
    MissingNamespace { kind: &'static str, name: String },
}

/// Pick the owner flagged as managing controller, else the first owner.
#[must_use]
pub fn select_controller_ref(owners: &[OwnerReference]) -> Option<&OwnerReference> {
    owners
        .iter()
        .find(|owner| owner.controller == Some(true))
        .or_else(|| owners.first())
}

/// Resolves a pod to the top-level object that manages it.
#[derive(Clone)]
pub struct ControllerResolver {
    cluster: Arc<dyn ClusterQuery>,
}

impl ControllerResolver {
    pub fn new(cluster: Arc<dyn ClusterQuery>) -> Self {
        Self { cluster }
    }

    /// Resolve the pod's controller, or `None` when it has no owner or
    /// resolution failed.
    pub async fn resolve(&self, pod: &Pod) -> Option<ControllerRef> {
        match self.try_resolve(pod).await {
            Ok(controller) => controller,
            Err(failure) => {
                warn!(
                    pod = pod.metadata.name.as_deref().unwrap_or_default(),
                    error = %failure,
                    "Controller resolution failed"
                );
                None
            }
        }
    }

    /// Resolution with the failure detail preserved.
    pub async fn try_resolve(&self, pod: &Pod) -> Result<Option<ControllerRef>, ResolutionFailure> {
        let owners = pod.metadata.owner_references.as_deref().unwrap_or_default();
        let Some(owner) = select_controller_ref(owners) else {
            return Ok(None);
        };

        if owner.kind.is_empty() || owner.name.is_empty() {
            return Err(ResolutionFailure::IncompleteOwnerReference {
                kind: owner.kind.clone(),
                name: owner.name.clone(),
            });
        }

        let namespace = pod.metadata.namespace.as_deref();
        let name = owner.name.as_str();

        let controller = match ControllerKind::from_kind(&owner.kind) {
            ControllerKind::ReplicaSet => match self.deployment_for_replica_set(namespace, name).await {
                Ok(Some(deployment)) => ControllerRef::new(ControllerKind::Deployment, deployment),
                Ok(None) => ControllerRef::new(ControllerKind::ReplicaSet, name),
                Err(failure) => {
                    debug!(replica_set = name, error = %failure, "Keeping ReplicaSet as controller");
                    ControllerRef::new(ControllerKind::ReplicaSet, name)
                }
            },
            ControllerKind::Job => {
                // CronJob ownership is not followed
                if let Err(failure) = self.check_job(namespace, name).await {
                    debug!(job = name, error = %failure, "Job lookup failed");
                }
                ControllerRef::new(ControllerKind::Job, name)
            }
            kind => ControllerRef::new(kind, name),
        };

        Ok(Some(controller))
    }

    /// Name of the Deployment controlling a ReplicaSet, if any.
    async fn deployment_for_replica_set(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<String>, ResolutionFailure> {
        let namespace = namespace.ok_or_else(|| ResolutionFailure::MissingNamespace {
            kind: "ReplicaSet",
            name: name.to_string(),
        })?;
        let replica_set = self
            .cluster
            .get_replica_set(namespace, name)
            .await
            .map_err(|source| ResolutionFailure::Lookup {
                kind: "ReplicaSet",
                name: name.to_string(),
                source,
            })?;

        let deployment = replica_set
            .metadata
            .owner_references
            .unwrap_or_default()
            .into_iter()
            .find(|owner| owner.controller == Some(true) && owner.kind == "Deployment")
            .map(|owner| owner.name);
        Ok(deployment)
    }

    async fn check_job(&self, namespace: Option<&str>, name: &str) -> Result<(), ResolutionFailure> {
        let namespace = namespace.ok_or_else(|| ResolutionFailure::MissingNamespace {
            kind: "Job",
            name: name.to_string(),
        })?;
        let job = self
            .cluster
            .get_job(namespace, name)
            .await
            .map_err(|source| ResolutionFailure::Lookup {
                kind: "Job",
                name: name.to_string(),
                source,
            })?;
        if let Some(status) = job.status {
            debug!(
                job = name,
                active = status.active.unwrap_or(0),
                failed = status.failed.unwrap_or(0),
                "Resolved Job controller"
            );
        }
        Ok(())
    }
}
