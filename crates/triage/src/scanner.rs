//! Not-ready pod detection and failure reason derivation.

use k8s_openapi::api::core::v1::{Pod, PodCondition};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cluster::ClusterQuery;
use crate::errors::TriageResult;
use crate::record::FailingPodRecord;
use crate::resolver::ControllerResolver;

/// Reason reported by finished pods; these are not failures.
pub const COMPLETED_REASON: &str = "PodCompleted";

/// Reason used when no other signal is available.
pub const FALLBACK_REASON: &str = "NotReady";

fn ready_condition(pod: &Pod) -> Option<&PodCondition> {
    pod.status
        .as_ref()?
        .conditions
        .as_ref()?
        .iter()
        .find(|condition| condition.type_ == "Ready")
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// A pod is ready only when its `Ready` condition has status `True`.
#[must_use]
pub fn is_pod_ready(pod: &Pod) -> bool {
    ready_condition(pod).is_some_and(|condition| condition.status == "True")
}

/// Waiting/terminated reasons of the regular containers, sorted and
/// de-duplicated. Init containers are skipped: a finished one reports
/// `Completed`, which says nothing about the failure.
fn container_reasons(pod: &Pod) -> BTreeSet<String> {
    let Some(statuses) = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
    else {
        return BTreeSet::new();
    };

    let mut reasons = BTreeSet::new();
    for state in statuses.iter().filter_map(|cs| cs.state.as_ref()) {
        if let Some(reason) = non_empty(state.waiting.as_ref().and_then(|w| w.reason.as_ref())) {
            reasons.insert(reason.to_string());
        }
        if let Some(reason) = non_empty(state.terminated.as_ref().and_then(|t| t.reason.as_ref())) {
            reasons.insert(reason.to_string());
        }
    }
    reasons
}

/// Derive why a not-ready pod is failing.
///
/// Priority: the Ready condition's reason, then its message; the joined
/// container state reasons; the pod phase; finally `NotReady`.
#[must_use]
pub fn derive_reason(pod: &Pod) -> String {
    if let Some(condition) = ready_condition(pod) {
        if let Some(reason) =
            non_empty(condition.reason.as_ref()).or_else(|| non_empty(condition.message.as_ref()))
        {
            return reason.to_string();
        }
    }

    let reasons = container_reasons(pod);
    if !reasons.is_empty() {
        return reasons.into_iter().collect::<Vec<_>>().join(", ");
    }

    pod.status
        .as_ref()
        .and_then(|s| non_empty(s.phase.as_ref()))
        .unwrap_or(FALLBACK_REASON)
        .to_string()
}

/// The failure reason for a pod that should be reported, or `None` when the
/// pod is ready or has completed.
#[must_use]
pub fn failure_reason(pod: &Pod) -> Option<String> {
    if is_pod_ready(pod) {
        return None;
    }
    let reason = derive_reason(pod);
    (reason != COMPLETED_REASON).then_some(reason)
}

/// Scans a namespace (or the whole cluster) for failing pods.
#[derive(Clone)]
pub struct FailureScanner {
    cluster: Arc<dyn ClusterQuery>,
    resolver: ControllerResolver,
}

impl FailureScanner {
    pub fn new(cluster: Arc<dyn ClusterQuery>) -> Self {
        let resolver = ControllerResolver::new(Arc::clone(&cluster));
        Self { cluster, resolver }
    }

    /// List not-ready pods in `namespace`, or in every namespace when `None`.
    ///
    /// Only the pod listing can fail; controller resolution degrades to no
    /// controller.
    pub async fn scan(&self, namespace: Option<&str>) -> TriageResult<Vec<FailingPodRecord>> {
        let pods = self.cluster.list_pods(namespace).await?;
        let total = pods.len();

        let mut failing = Vec::new();
        for pod in &pods {
            let Some(reason) = failure_reason(pod) else {
                continue;
            };
            let name = pod.metadata.name.clone().unwrap_or_default();
            let pod_namespace = pod.metadata.namespace.clone().unwrap_or_default();
            debug!(namespace = %pod_namespace, pod = %name, reason = %reason, "Pod not ready");

            let controller = self.resolver.resolve(pod).await;
            failing.push(FailingPodRecord::new(pod_namespace, name, reason, controller));
        }

        info!(
            namespace = namespace.unwrap_or("<all>"),
            scanned = total,
            failing = failing.len(),
            "Scan complete"
        );
        Ok(failing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ControllerKind, ControllerRef};
    use crate::test_support::{container_status, owner, pod_json, FakeCluster};
    use serde_json::{json, Value};

    fn pod(name: &str, status: Value) -> Pod {
        pod_json(json!({
            "metadata": {"name": name, "namespace": "prod"},
            "status": status
        }))
    }

    #[test]
    fn test_ready_pod_is_not_failing() {
        let p = pod(
            "ok",
            json!({"phase": "Running", "conditions": [{"type": "Ready", "status": "True"}]}),
        );
        assert!(is_pod_ready(&p));
        assert_eq!(failure_reason(&p), None);
    }

    #[test]
    fn test_ready_condition_reason_wins_over_containers() {
        let p = pod(
            "crash",
            json!({
                "phase": "Running",
                "conditions": [{"type": "Ready", "status": "False", "reason": "ContainersNotReady"}],
                "containerStatuses": [
                    container_status("app", json!({"waiting": {"reason": "CrashLoopBackOff"}}))
                ]
            }),
        );
        assert_eq!(derive_reason(&p), "ContainersNotReady");
    }

    #[test]
    fn test_ready_condition_message_when_no_reason() {
        let p = pod(
            "msg",
            json!({"conditions": [{"type": "Ready", "status": "False", "message": "probe failed"}]}),
        );
        assert_eq!(derive_reason(&p), "probe failed");
    }

    #[test]
    fn test_container_reasons_sorted_and_deduplicated() {
        let p = pod(
            "multi",
            json!({
                "phase": "Running",
                "conditions": [{"type": "Ready", "status": "False"}],
                "containerStatuses": [
                    container_status("a", json!({"waiting": {"reason": "ImagePullBackOff"}})),
                    container_status("b", json!({"terminated": {"exitCode": 137, "reason": "OOMKilled"}})),
                    container_status("c", json!({"waiting": {"reason": "ImagePullBackOff"}})),
                    container_status("d", json!({"waiting": {"reason": ""}}))
                ]
            }),
        );
        assert_eq!(derive_reason(&p), "ImagePullBackOff, OOMKilled");
    }

    #[test]
    fn test_init_container_reasons_ignored() {
        let p = pod(
            "init",
            json!({
                "phase": "Pending",
                "initContainerStatuses": [
                    container_status("migrate", json!({"waiting": {"reason": "CrashLoopBackOff"}}))
                ]
            }),
        );
        assert_eq!(derive_reason(&p), "Pending");
    }

    #[test]
    fn test_completed_init_container_not_mixed_into_reason() {
        let p = pod(
            "api-1",
            json!({
                "phase": "Running",
                "conditions": [{"type": "Ready", "status": "False"}],
                "initContainerStatuses": [
                    container_status("migrate", json!({"terminated": {"exitCode": 0, "reason": "Completed"}}))
                ],
                "containerStatuses": [
                    container_status("app", json!({"waiting": {"reason": "CrashLoopBackOff"}}))
                ]
            }),
        );
        assert_eq!(derive_reason(&p), "CrashLoopBackOff");
    }

    #[test]
    fn test_phase_then_fallback() {
        let pending = pod("pending", json!({"phase": "Pending"}));
        assert_eq!(derive_reason(&pending), "Pending");

        let bare = pod_json(json!({"metadata": {"name": "bare", "namespace": "prod"}}));
        assert_eq!(derive_reason(&bare), FALLBACK_REASON);
        assert!(!is_pod_ready(&bare));
    }

    #[test]
    fn test_completed_pod_excluded() {
        let p = pod(
            "done",
            json!({
                "phase": "Succeeded",
                "conditions": [{"type": "Ready", "status": "False", "reason": "PodCompleted"}]
            }),
        );
        assert_eq!(failure_reason(&p), None);
    }

    #[test]
    fn test_completed_container_state_does_not_exclude() {
        // Only the final reason is compared, so a masked cause still reports
        let p = pod(
            "masked",
            json!({
                "phase": "Running",
                "conditions": [{"type": "Ready", "status": "False", "reason": "ContainersNotReady"}],
                "containerStatuses": [
                    container_status("a", json!({"terminated": {"exitCode": 0, "reason": "PodCompleted"}}))
                ]
            }),
        );
        assert_eq!(failure_reason(&p).as_deref(), Some("ContainersNotReady"));
    }

    #[tokio::test]
    async fn test_scan_builds_records_with_controllers() {
        let failing = pod_json(json!({
            "metadata": {
                "name": "api-7d9f-x1",
                "namespace": "prod",
                "ownerReferences": [owner("ReplicaSet", "api-7d9f", true)]
            },
            "status": {
                "phase": "Running",
                "conditions": [{"type": "Ready", "status": "False", "reason": "ContainersNotReady"}]
            }
        }));
        let healthy = pod(
            "healthy",
            json!({"conditions": [{"type": "Ready", "status": "True"}]}),
        );
        let other_ns = pod_json(json!({
            "metadata": {"name": "elsewhere", "namespace": "dev"},
            "status": {"phase": "Pending"}
        }));
        let cluster = FakeCluster::default()
            .with_pod(failing)
            .with_pod(healthy)
            .with_pod(other_ns)
            .with_replica_set("prod", "api-7d9f", vec![owner("Deployment", "api", true)]);
        let scanner = FailureScanner::new(Arc::new(cluster));

        let records = scanner.scan(Some("prod")).await.unwrap();
        assert_eq!(
            records,
            vec![FailingPodRecord::new(
                "prod",
                "api-7d9f-x1",
                "ContainersNotReady",
                Some(ControllerRef::new(ControllerKind::Deployment, "api"))
            )]
        );

        let all = scanner.scan(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].name, "elsewhere");
        assert_eq!(all[1].controller, None);
    }
}
