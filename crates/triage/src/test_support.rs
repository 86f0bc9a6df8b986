//! In-memory collaborators shared by unit tests.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::cluster::ClusterQuery;
use crate::command::{CommandOutput, CommandRunner};
use crate::dispatcher::ContainerPicker;
use crate::errors::{TriageError, TriageResult};

/// Owner reference JSON with every required field populated.
pub fn owner(kind: &str, name: &str, controller: bool) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": kind,
        "name": name,
        "uid": format!("uid-{name}"),
        "controller": controller
    })
}

/// Build a pod from partial JSON.
pub fn pod_json(mut value: Value) -> Pod {
    value["apiVersion"] = json!("v1");
    value["kind"] = json!("Pod");
    serde_json::from_value(value).expect("valid pod json")
}

/// Container status JSON in the given state.
pub fn container_status(name: &str, state: Value) -> Value {
    json!({
        "name": name,
        "image": "registry.local/app:1",
        "imageID": "",
        "ready": false,
        "restartCount": 0,
        "state": state
    })
}

fn not_found(kind: &str, namespace: &str, name: &str) -> TriageError {
    TriageError::NotFound {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

#[derive(Default)]
pub struct FakeCluster {
    pub pods: Vec<Pod>,
    pub replica_sets: HashMap<(String, String), ReplicaSet>,
    pub jobs: HashMap<(String, String), Job>,
}

impl FakeCluster {
    pub fn with_pod(mut self, pod: Pod) -> Self {
        self.pods.push(pod);
        self
    }

    pub fn with_replica_set(mut self, namespace: &str, name: &str, owners: Vec<Value>) -> Self {
        let replica_set: ReplicaSet = serde_json::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "ReplicaSet",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "ownerReferences": owners
            }
        }))
        .expect("valid replica set json");
        self.replica_sets
            .insert((namespace.to_string(), name.to_string()), replica_set);
        self
    }

    pub fn with_job(mut self, namespace: &str, name: &str, status: Value) -> Self {
        let job: Job = serde_json::from_value(json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": name, "namespace": namespace},
            "status": status
        }))
        .expect("valid job json");
        self.jobs
            .insert((namespace.to_string(), name.to_string()), job);
        self
    }
}

#[async_trait]
impl ClusterQuery for FakeCluster {
    async fn list_pods(&self, namespace: Option<&str>) -> TriageResult<Vec<Pod>> {
        Ok(self
            .pods
            .iter()
            .filter(|pod| namespace.is_none() || pod.metadata.namespace.as_deref() == namespace)
            .cloned()
            .collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> TriageResult<Pod> {
        self.pods
            .iter()
            .find(|pod| {
                pod.metadata.namespace.as_deref() == Some(namespace)
                    && pod.metadata.name.as_deref() == Some(name)
            })
            .cloned()
            .ok_or_else(|| not_found("Pod", namespace, name))
    }

    async fn get_replica_set(&self, namespace: &str, name: &str) -> TriageResult<ReplicaSet> {
        self.replica_sets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found("ReplicaSet", namespace, name))
    }

    async fn get_job(&self, namespace: &str, name: &str) -> TriageResult<Job> {
        self.jobs
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found("Job", namespace, name))
    }

    async fn list_namespaces(&self) -> TriageResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Records every argv and answers with a fixed result.
pub struct RecordingRunner {
    pub calls: Mutex<Vec<Vec<String>>>,
    pub reply: CommandOutput,
}

impl RecordingRunner {
    pub fn ok(output: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reply: CommandOutput::ok(output),
        }
    }

    pub fn failing(output: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reply: CommandOutput::failed(output),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, argv: &[String]) -> TriageResult<CommandOutput> {
        self.calls.lock().unwrap().push(argv.to_vec());
        Ok(self.reply.clone())
    }
}

/// Picks a fixed index, or fails like an interrupted prompt when it has none,
/// and records every prompt.
pub struct FixedPicker {
    pub index: Option<usize>,
    pub prompts: Mutex<Vec<Vec<String>>>,
}

impl FixedPicker {
    pub fn new(index: usize) -> Self {
        Self {
            index: Some(index),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            index: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl ContainerPicker for FixedPicker {
    fn pick(&self, _pod: &str, containers: &[String]) -> TriageResult<usize> {
        self.prompts.lock().unwrap().push(containers.to_vec());
        self.index.ok_or_else(|| TriageError::Prompt {
            reason: "interrupted".to_string(),
        })
    }
}
