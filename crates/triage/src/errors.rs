//! Error types for the triage crate.

use thiserror::Error;

/// Errors raised by the triage library.
///
/// Collaborator failures inside the dispatcher and resolver never surface as
/// this type; they are folded into output strings or defaults at those
/// boundaries.
#[derive(Error, Debug)]
pub enum TriageError {
    // Cluster errors
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{kind} '{namespace}/{name}' not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("No failing pods to debug")]
    NoTargets,

    // Oracle errors
    #[error("Reasoning model request failed: {0}")]
    Oracle(String),

    #[error("Reasoning model returned an unreadable reply: {reason}")]
    OracleReply { reason: String },

    // Command errors
    #[error("Failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    // Configuration errors
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Environment variable '{var}' is required")]
    MissingEnv { var: String },

    // Terminal errors
    #[error("Terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Selection prompt failed: {reason}")]
    Prompt { reason: String },
}

impl From<reqwest::Error> for TriageError {
    fn from(err: reqwest::Error) -> Self {
        Self::Oracle(err.to_string())
    }
}

impl From<dialoguer::Error> for TriageError {
    fn from(err: dialoguer::Error) -> Self {
        Self::Prompt {
            reason: err.to_string(),
        }
    }
}

/// Result alias used across the crate.
pub type TriageResult<T> = Result<T, TriageError>;
