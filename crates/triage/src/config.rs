//! Runtime configuration.
//!
//! Values come from built-in defaults, an optional JSON file, and finally
//! command-line flags or environment variables applied by the binary.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{TriageError, TriageResult};

/// Chat-completions endpoint used when none is configured
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default reasoning model
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Ctrl+N
pub const DEFAULT_SWITCH_KEY: u8 = 0x0e;

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

fn default_log_tail_lines() -> u32 {
    100
}

fn default_exit_keywords() -> Vec<String> {
    vec!["exit".to_string(), "quit".to_string()]
}

fn default_switch_key() -> u8 {
    DEFAULT_SWITCH_KEY
}

/// Triage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriageConfig {
    /// Reasoning model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Chat-completions endpoint
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,

    /// HTTP timeout for one model call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// kubectl binary used for diagnostic actions
    #[serde(default = "default_kubectl")]
    pub kubectl: String,

    /// Lines of log output requested per LOGS action
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: u32,

    /// Utterances that end the session (case-insensitive)
    #[serde(default = "default_exit_keywords")]
    pub exit_keywords: Vec<String>,

    /// Control byte that switches to the next failing pod
    #[serde(default = "default_switch_key")]
    pub switch_key: u8,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base_url: default_api_base_url(),
            api_key_env: default_api_key_env(),
            temperature: None,
            request_timeout_secs: default_request_timeout_secs(),
            kubectl: default_kubectl(),
            log_tail_lines: default_log_tail_lines(),
            exit_keywords: default_exit_keywords(),
            switch_key: default_switch_key(),
        }
    }
}

impl TriageConfig {
    /// Load from a JSON file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> TriageResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|e| TriageError::Config {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| TriageError::Config {
            reason: format!("failed to parse {}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> TriageResult<()> {
        let reserved = matches!(self.switch_key, b'\r' | b'\n' | 0x03 | 0x04 | 0x08);
        if self.switch_key >= 0x20 || reserved {
            return Err(TriageError::Config {
                reason: format!(
                    "switchKey {:#04x} must be a control byte other than Enter, Backspace, Ctrl+C or Ctrl+D",
                    self.switch_key
                ),
            });
        }
        if self.log_tail_lines == 0 {
            return Err(TriageError::Config {
                reason: "logTailLines must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> TriageResult<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| TriageError::MissingEnv {
                var: self.api_key_env.clone(),
            })
    }

    /// Whether `input` is one of the exit keywords.
    #[must_use]
    pub fn is_exit_keyword(&self, input: &str) -> bool {
        self.exit_keywords
            .iter()
            .any(|keyword| keyword.eq_ignore_ascii_case(input))
    }

    /// Human-readable name of the switch key, e.g. `Ctrl+N`.
    #[must_use]
    pub fn switch_key_label(&self) -> String {
        match self.switch_key {
            byte @ 0x01..=0x1a => format!("Ctrl+{}", char::from(b'A' + byte - 1)),
            byte => format!("{byte:#04x}"),
        }
    }
}
