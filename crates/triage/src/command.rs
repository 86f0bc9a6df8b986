//! External command execution.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::{TriageError, TriageResult};

/// Captured result of one finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Stdout followed by stderr, skipping whichever is empty.
    #[must_use]
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Runs an argv to completion.
///
/// `Err` means the process could not be started at all; a non-zero exit is
/// reported through [`CommandOutput::success`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[String]) -> TriageResult<CommandOutput>;
}

/// [`CommandRunner`] that spawns local processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, argv: &[String]) -> TriageResult<CommandOutput> {
        let (program, args) = argv.split_first().ok_or_else(|| TriageError::Spawn {
            program: String::new(),
            reason: "empty command line".to_string(),
        })?;

        debug!(command = %argv.join(" "), "Running command");
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| TriageError::Spawn {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run `argv` and always return text: the output on success, otherwise an
/// `Error executing …` block carrying the command line and whatever it printed.
pub async fn execute(runner: &dyn CommandRunner, argv: &[String]) -> String {
    let command_line = argv.join(" ");
    match runner.run(argv).await {
        Ok(output) if output.success => output.stdout,
        Ok(output) => format!("Error executing {command_line}:\n{}", output.combined()),
        Err(e) => format!("Error executing {command_line}:\n{e}"),
    }
}
