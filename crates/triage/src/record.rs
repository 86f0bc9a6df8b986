//! Failing pod records and controller identities.

use serde::{Serialize, Serializer};
use std::fmt;

/// Kind of the top-level object managing a pod.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    Deployment,
    ReplicaSet,
    StatefulSet,
    DaemonSet,
    Job,
    /// Any owner kind without dedicated handling (e.g. a custom resource)
    Other(String),
}

impl ControllerKind {
    /// Map an owner-reference `kind` string to a controller kind.
    #[must_use]
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "Deployment" => Self::Deployment,
            "ReplicaSet" => Self::ReplicaSet,
            "StatefulSet" => Self::StatefulSet,
            "DaemonSet" => Self::DaemonSet,
            "Job" => Self::Job,
            other => Self::Other(other.to_string()),
        }
    }

    /// The Kubernetes kind string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Deployment => "Deployment",
            Self::ReplicaSet => "ReplicaSet",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
            Self::Job => "Job",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ControllerKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A resolved controller: kind and name always travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerRef {
    pub kind: ControllerKind,
    pub name: String,
}

impl ControllerRef {
    pub fn new(kind: ControllerKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ControllerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.name)
    }
}

/// Snapshot of one not-ready pod, produced once per scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailingPodRecord {
    pub namespace: String,
    pub name: String,
    /// Derived failure reason, never empty
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<ControllerRef>,
}

impl FailingPodRecord {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
        controller: Option<ControllerRef>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            reason: reason.into(),
            controller,
        }
    }

    #[must_use]
    pub fn controller_kind(&self) -> Option<&ControllerKind> {
        self.controller.as_ref().map(|c| &c.kind)
    }

    #[must_use]
    pub fn controller_name(&self) -> Option<&str> {
        self.controller.as_ref().map(|c| c.name.as_str())
    }

    /// Opening line of a session context for this pod.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = format!(
            "Pod {} in namespace {} is failing: {}",
            self.name, self.namespace, self.reason
        );
        if let Some(controller) = &self.controller {
            text.push_str(&format!(
                " (controller: {}/{})",
                controller.kind, controller.name
            ));
        }
        text
    }
}

impl fmt::Display for FailingPodRecord {
    /// `pod (ns=…, reason=…, Kind=name)`, as shown in the selection list.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (ns={}, reason={}",
            self.name, self.namespace, self.reason
        )?;
        if let Some(controller) = &self.controller {
            write!(f, ", {controller}")?;
        }
        f.write_str(")")
    }
}
