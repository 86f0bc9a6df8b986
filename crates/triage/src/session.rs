//! Interactive diagnosis session.
//!
//! ```text
//! AwaitingInput ──text──▶ OracleTurn ──▶ Action | Analysis | Passthrough ──▶ AwaitingInput
//!       │                     │
//!       │ switch key          └── model error: context untouched ──▶ AwaitingInput
//!       ▼
//!   next target, fresh context
//! ```
//!
//! The session ends on an exit keyword, closed input, or a `STOP` request.

use colored::Colorize;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::config::TriageConfig;
use crate::dispatcher::{ActionDispatcher, DispatchOutcome};
use crate::errors::{TriageError, TriageResult};
use crate::input::{InputEvent, InputSource};
use crate::oracle::{ActionType, FinalAnalysis, OracleResponse, ReasoningOracle};
use crate::record::FailingPodRecord;

/// Bullet glyphs and numbered-list markers.
static BULLET_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-•*]\s+|\d+\.\s+").expect("valid bullet pattern"));

/// Put every bullet or numbered-list marker on its own line.
#[must_use]
pub fn format_bullets(text: &str) -> String {
    let mut formatted = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for marker in BULLET_PATTERN.find_iter(text) {
        formatted.push_str(&text[last..marker.start()]);
        if marker.start() > 0 && !formatted.ends_with('\n') {
            formatted.push('\n');
        }
        formatted.push_str(marker.as_str());
        last = marker.end();
    }
    formatted.push_str(&text[last..]);
    formatted
}

/// Append-only transcript sent to the model on every turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    text: String,
}

impl SessionContext {
    /// Fresh context describing `target`.
    pub fn for_target(target: &FailingPodRecord) -> Self {
        Self {
            text: target.describe(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn append(&mut self, block: &str) {
        self.text.push_str(block);
    }

    /// The context as it would read with the operator's utterance added.
    #[must_use]
    pub fn with_user_turn(&self, input: &str) -> String {
        format!("{}{}", self.text, user_block(input))
    }
}

fn user_block(input: &str) -> String {
    format!("\nUser: {input}")
}

fn analysis_block(root_cause: &str, remediation: &str) -> String {
    format!("\n\n# Final Analysis\nRoot Cause: {root_cause}\nRemediation:\n{remediation}\n")
}

fn response_block(text: &str) -> String {
    format!("\n\n# Model Response\n{text}\n")
}

/// Index of the active target within the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionCursor {
    index: usize,
    len: usize,
}

impl SelectionCursor {
    /// Cursor at `index`, clamped to the first entry when out of range.
    pub fn new(index: usize, len: usize) -> Self {
        let index = if index < len { index } else { 0 };
        Self { index, len }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Move to the next entry, wrapping at the end.
    pub fn advance(&mut self) -> usize {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
        self.index
    }

    /// Select a 1-based position; out-of-range positions leave the cursor as is.
    pub fn select(&mut self, position: i64) -> Option<usize> {
        let index = usize::try_from(position).ok()?.checked_sub(1)?;
        (index < self.len).then(|| {
            self.index = index;
            index
        })
    }
}

/// Outcome of handling one input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// Back to awaiting input
    Continue,
    /// Session is over
    Exit,
}

/// Drives one operator's diagnosis session over a fixed working set.
pub struct SessionController {
    targets: Vec<FailingPodRecord>,
    cursor: SelectionCursor,
    context: SessionContext,
    oracle: Arc<dyn ReasoningOracle>,
    dispatcher: ActionDispatcher,
    config: TriageConfig,
}

impl SessionController {
    /// Start a session on `targets[initial]`.
    pub fn new(
        targets: Vec<FailingPodRecord>,
        initial: usize,
        oracle: Arc<dyn ReasoningOracle>,
        dispatcher: ActionDispatcher,
        config: TriageConfig,
    ) -> TriageResult<Self> {
        if targets.is_empty() {
            return Err(TriageError::NoTargets);
        }
        let cursor = SelectionCursor::new(initial, targets.len());
        let context = SessionContext::for_target(&targets[cursor.index()]);
        Ok(Self {
            targets,
            cursor,
            context,
            oracle,
            dispatcher,
            config,
        })
    }

    /// The pod currently under investigation.
    #[must_use]
    pub fn current(&self) -> &FailingPodRecord {
        &self.targets[self.cursor.index()]
    }

    #[must_use]
    pub fn cursor(&self) -> SelectionCursor {
        self.cursor
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Run until exit, closed input, or a `STOP` from the model.
    ///
    /// Only a failure of the input source itself ends the session with an error.
    pub async fn run(&mut self, input: &mut dyn InputSource) -> TriageResult<()> {
        println!("\n{}", "💬 Interactive Debugging Session Started".bold());
        println!(
            "Type '{}' to quit. Press {} to switch to the next pod.\n",
            self.config
                .exit_keywords
                .first()
                .map_or("exit", String::as_str),
            self.config.switch_key_label()
        );
        info!(namespace = %self.current().namespace, pod = %self.current().name, "Session started");

        let prompt = format!("{} ", "👤 You:".cyan().bold());
        loop {
            let Some(event) = input.read_event(&prompt)? else {
                println!("👋 Input closed, exiting debugger.");
                break;
            };
            if self.handle_event(event).await == Turn::Exit {
                break;
            }
        }
        info!("Session ended");
        Ok(())
    }

    /// Apply one input event to the session.
    pub async fn handle_event(&mut self, event: InputEvent) -> Turn {
        match event {
            InputEvent::SwitchTarget => {
                self.cursor.advance();
                self.reset_context();
                Turn::Continue
            }
            InputEvent::Text(text) => self.handle_text(text.trim()).await,
        }
    }

    async fn handle_text(&mut self, input: &str) -> Turn {
        if self.config.is_exit_keyword(input) {
            println!("👋 Exiting debugger.");
            return Turn::Exit;
        }

        // Kept for compatibility with the text-based switch command
        if input.split_whitespace().next() == Some("switch") {
            self.switch_by_number(input);
            return Turn::Continue;
        }

        if input.is_empty() {
            return Turn::Continue;
        }

        self.oracle_turn(input).await
    }

    fn switch_by_number(&mut self, input: &str) {
        let position = input
            .split_whitespace()
            .nth(1)
            .and_then(|token| token.parse::<i64>().ok());
        match position {
            Some(position) => {
                if self.cursor.select(position).is_some() {
                    self.reset_context();
                } else {
                    println!("{}", "❌ Invalid choice, try again.".red());
                }
            }
            None => println!(
                "{}",
                "❌ Invalid switch command. Use 'switch <number>'.".red()
            ),
        }
    }

    fn reset_context(&mut self) {
        self.context = SessionContext::for_target(self.current());
        let target = self.current();
        println!(
            "\n🔄 Switched to pod {} (ns={}, reason={})",
            target.name.bold(),
            target.namespace,
            target.reason
        );
        debug!(index = self.cursor.index(), pod = %target.name, "Target switched");
    }

    async fn oracle_turn(&mut self, input: &str) -> Turn {
        let candidate = self.context.with_user_turn(input);
        let response = match self.oracle.run(&candidate).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Reasoning model call failed");
                println!("\n{} {e}", "❌ Error from model:".red());
                return Turn::Continue;
            }
        };
        self.context.append(&user_block(input));

        match response {
            OracleResponse::Action(request) => {
                println!("\n🤖 Model requests action: {request}");
                if request.action == ActionType::Stop {
                    println!("🛑 Model requested to stop.");
                    return Turn::Exit;
                }
                let outcome = self.dispatcher.dispatch(&request, self.current()).await;
                self.record_outcome(&outcome);
            }
            OracleResponse::UnknownAction {
                tag,
                namespace,
                name,
            } => {
                warn!(tag = %tag, "Model requested an unknown action");
                self.record_outcome(&DispatchOutcome::unknown(&tag, namespace, name));
            }
            OracleResponse::Analysis(analysis) => self.record_analysis(&analysis),
            OracleResponse::Text(text) => {
                println!("\n📝 Model response:\n{text}\n");
                self.context.append(&response_block(&text));
            }
        }
        Turn::Continue
    }

    fn record_outcome(&mut self, outcome: &DispatchOutcome) {
        println!(
            "\n📡 Cluster output for {}:\n{}\n",
            outcome.label.bold(),
            outcome.output
        );
        self.context.append(&outcome.context_block());
    }

    fn record_analysis(&mut self, analysis: &FinalAnalysis) {
        let remediation = format_bullets(&analysis.remediation);
        println!("\n{}", "✅ Final Analysis:".green().bold());
        println!("Root Cause: {}", analysis.root_cause);
        println!("Remediation:\n{remediation}\n");
        self.context
            .append(&analysis_block(&analysis.root_cause, &remediation));
    }
}
