//! # Triage
//!
//! Interactive diagnosis of not-ready pods in a Kubernetes cluster.
//!
//! This crate provides:
//! - A failure scanner that turns pod status into one `FailingPodRecord` per pod
//! - Controller resolution through owner references (ReplicaSet → Deployment)
//! - A reasoning-model adapter that returns action requests or a final analysis
//! - A dispatcher mapping action requests to read-only `kubectl` queries
//! - The interactive session loop with single-key target switching
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use triage::{FailureScanner, KubeCluster};
//!
//! let cluster = KubeCluster::try_default().await?;
//! let scanner = FailureScanner::new(Arc::new(cluster));
//! let failing = scanner.scan(Some("prod")).await?;
//! ```

// Collaborator interfaces
pub mod cluster;
pub mod command;

// Configuration and errors
pub mod config;
pub mod errors;

// Failure classification
pub mod record;
pub mod resolver;
pub mod scanner;

// Reasoning loop
pub mod dispatcher;
pub mod input;
pub mod oracle;
pub mod session;

pub use cluster::{ClusterQuery, KubeCluster};
pub use command::{execute, CommandOutput, CommandRunner, ProcessRunner};
pub use config::TriageConfig;
pub use dispatcher::{ActionDispatcher, ContainerPicker, DialoguerPicker, DispatchOutcome};
pub use errors::{TriageError, TriageResult};
pub use input::{InputEvent, InputSource, LineEditor, TerminalInput};
pub use oracle::{
    parse_oracle_reply, ActionRequest, ActionType, FinalAnalysis, OpenAiOracle, OracleResponse,
    ReasoningOracle,
};
pub use record::{ControllerKind, ControllerRef, FailingPodRecord};
pub use resolver::ControllerResolver;
pub use scanner::FailureScanner;
pub use session::{format_bullets, SelectionCursor, SessionContext, SessionController, Turn};

#[cfg(test)]
mod test_support;
