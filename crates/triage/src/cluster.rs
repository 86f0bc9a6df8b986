//! Read-only Kubernetes queries used by the scanner, resolver and dispatcher.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::{
    api::{Api, ListParams},
    Client as KubeClient,
};
use tracing::{debug, info};

use crate::errors::{TriageError, TriageResult};

/// Cluster reads consumed by the diagnosis core.
///
/// Every operation is read-only. Callers decide how to degrade on failure.
#[async_trait]
pub trait ClusterQuery: Send + Sync {
    /// List pods in `namespace`, or across all namespaces when `None`.
    async fn list_pods(&self, namespace: Option<&str>) -> TriageResult<Vec<Pod>>;

    /// Read a pod by name.
    async fn get_pod(&self, namespace: &str, name: &str) -> TriageResult<Pod>;

    /// Read a ReplicaSet by name.
    async fn get_replica_set(&self, namespace: &str, name: &str) -> TriageResult<ReplicaSet>;

    /// Read a Job by name.
    async fn get_job(&self, namespace: &str, name: &str) -> TriageResult<Job>;

    /// Namespace names, sorted.
    async fn list_namespaces(&self) -> TriageResult<Vec<String>>;
}

/// [`ClusterQuery`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeCluster {
    client: KubeClient,
}

impl KubeCluster {
    pub fn new(client: KubeClient) -> Self {
        Self { client }
    }

    /// Connect using the local kubeconfig, falling back to in-cluster config.
    pub async fn try_default() -> TriageResult<Self> {
        debug!("Initializing Kubernetes client");
        let client = KubeClient::try_default().await?;
        info!("Connected to Kubernetes cluster");
        Ok(Self { client })
    }

    fn pods(&self, namespace: Option<&str>) -> Api<Pod> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

/// Map a 404 from the API server to [`TriageError::NotFound`].
fn not_found_or(err: kube::Error, kind: &str, namespace: &str, name: &str) -> TriageError {
    match err {
        kube::Error::Api(ref response) if response.code == 404 => TriageError::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        other => TriageError::Kube(other),
    }
}

#[async_trait]
impl ClusterQuery for KubeCluster {
    async fn list_pods(&self, namespace: Option<&str>) -> TriageResult<Vec<Pod>> {
        let pods = self.pods(namespace).list(&ListParams::default()).await?;
        debug!(
            namespace = namespace.unwrap_or("<all>"),
            count = pods.items.len(),
            "Listed pods"
        );
        Ok(pods.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> TriageResult<Pod> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.get(name)
            .await
            .map_err(|e| not_found_or(e, "Pod", namespace, name))
    }

    async fn get_replica_set(&self, namespace: &str, name: &str) -> TriageResult<ReplicaSet> {
        let replica_sets: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        replica_sets
            .get(name)
            .await
            .map_err(|e| not_found_or(e, "ReplicaSet", namespace, name))
    }

    async fn get_job(&self, namespace: &str, name: &str) -> TriageResult<Job> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        jobs.get(name)
            .await
            .map_err(|e| not_found_or(e, "Job", namespace, name))
    }

    async fn list_namespaces(&self) -> TriageResult<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = namespaces.list(&ListParams::default()).await?;
        let mut names: Vec<String> = list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect();
        names.sort();
        Ok(names)
    }
}
