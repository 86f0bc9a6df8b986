//! Operator input with a single-key "switch target" signal.
//!
//! The terminal is put in raw mode for the duration of one read so the switch
//! key arrives as a single byte, while ordinary text is still edited and
//! committed a line at a time.

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::tty::IsTty;
use std::io::{self, BufRead, Read, Write};
use tracing::debug;

use crate::errors::TriageResult;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;
const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const ESC: u8 = 0x1b;

/// One unit of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A committed, trimmed line
    Text(String),
    /// The switch key was pressed; any partial line was discarded
    SwitchTarget,
}

/// Result of feeding one byte to a [`LineEditor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// Keep reading; write `echo` to the terminal if present
    Continue { echo: Option<String> },
    /// A complete event
    Event(InputEvent),
    /// The operator closed input (Ctrl+C, or Ctrl+D on an empty line)
    Closed,
}

/// Progress through an ANSI escape sequence such as an arrow key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    Idle,
    /// Saw ESC
    Started,
    /// Inside `ESC [` or `ESC O`, waiting for the final byte
    Sequence,
}

/// Byte-at-a-time line editor.
#[derive(Debug, Clone)]
pub struct LineEditor {
    buffer: String,
    switch_key: u8,
    escape: Escape,
}

impl LineEditor {
    pub fn new(switch_key: u8) -> Self {
        Self {
            buffer: String::new(),
            switch_key,
            escape: Escape::Idle,
        }
    }

    /// Text typed so far on the current line.
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn feed(&mut self, byte: u8) -> Feed {
        match self.escape {
            Escape::Idle => {}
            Escape::Started if byte == b'[' || byte == b'O' => {
                self.escape = Escape::Sequence;
                return Feed::Continue { echo: None };
            }
            Escape::Sequence if (0x20..=0x3f).contains(&byte) => {
                return Feed::Continue { echo: None };
            }
            Escape::Sequence if (0x40..=0x7e).contains(&byte) => {
                self.escape = Escape::Idle;
                return Feed::Continue { echo: None };
            }
            // Lone ESC or a malformed sequence: handle the byte normally
            Escape::Started | Escape::Sequence => self.escape = Escape::Idle,
        }

        match byte {
            b if b == self.switch_key => {
                self.buffer.clear();
                Feed::Event(InputEvent::SwitchTarget)
            }
            b'\r' | b'\n' => {
                let line = std::mem::take(&mut self.buffer);
                Feed::Event(InputEvent::Text(line.trim().to_string()))
            }
            DELETE | BACKSPACE => {
                let echo = self.buffer.pop().map(|_| "\x08 \x08".to_string());
                Feed::Continue { echo }
            }
            CTRL_C => Feed::Closed,
            CTRL_D if self.buffer.is_empty() => Feed::Closed,
            ESC => {
                self.escape = Escape::Started;
                Feed::Continue { echo: None }
            }
            0x20..=0x7e => {
                let ch = char::from(byte);
                self.buffer.push(ch);
                Feed::Continue {
                    echo: Some(ch.to_string()),
                }
            }
            _ => Feed::Continue { echo: None },
        }
    }
}

/// Source of operator input events.
pub trait InputSource {
    /// Block until the next event; `None` once input is closed.
    fn read_event(&mut self, prompt: &str) -> TriageResult<Option<InputEvent>>;
}

/// Restores cooked mode when dropped, including on error paths.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            debug!(error = %e, "Failed to restore terminal mode");
        }
    }
}

/// [`InputSource`] reading the process's stdin.
///
/// When stdin is not a terminal, input is read line by line and the switch
/// key is only recognised if it appears as a byte on its own line.
#[derive(Debug, Clone)]
pub struct TerminalInput {
    switch_key: u8,
}

impl TerminalInput {
    pub fn new(switch_key: u8) -> Self {
        Self { switch_key }
    }

    fn read_raw(&self, stdout: &mut io::Stdout) -> TriageResult<Option<InputEvent>> {
        let _guard = RawModeGuard::enable()?;
        let mut editor = LineEditor::new(self.switch_key);
        let mut stdin = io::stdin().lock();
        let mut byte = [0u8; 1];

        loop {
            if stdin.read(&mut byte)? == 0 {
                write!(stdout, "\r\n")?;
                stdout.flush()?;
                return Ok(None);
            }
            match editor.feed(byte[0]) {
                Feed::Continue { echo: Some(echo) } => {
                    stdout.write_all(echo.as_bytes())?;
                    stdout.flush()?;
                }
                Feed::Continue { echo: None } => {}
                Feed::Event(event) => {
                    write!(stdout, "\r\n")?;
                    stdout.flush()?;
                    return Ok(Some(event));
                }
                Feed::Closed => {
                    write!(stdout, "\r\n")?;
                    stdout.flush()?;
                    return Ok(None);
                }
            }
        }
    }

    fn read_line(&self) -> TriageResult<Option<InputEvent>> {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let mut editor = LineEditor::new(self.switch_key);
        for byte in line.trim_end_matches(['\r', '\n']).bytes() {
            match editor.feed(byte) {
                Feed::Event(event) => return Ok(Some(event)),
                Feed::Closed => return Ok(None),
                Feed::Continue { .. } => {}
            }
        }
        Ok(Some(InputEvent::Text(editor.buffer().trim().to_string())))
    }
}

impl InputSource for TerminalInput {
    fn read_event(&mut self, prompt: &str) -> TriageResult<Option<InputEvent>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        if io::stdin().is_tty() {
            self.read_raw(&mut stdout)
        } else {
            self.read_line()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWITCH: u8 = 0x0e;

    fn feed_all(editor: &mut LineEditor, bytes: &[u8]) -> Option<Feed> {
        for &byte in bytes {
            let feed = editor.feed(byte);
            if !matches!(feed, Feed::Continue { .. }) {
                return Some(feed);
            }
        }
        None
    }

    #[test]
    fn test_commit_on_carriage_return() {
        let mut editor = LineEditor::new(SWITCH);
        assert_eq!(
            feed_all(&mut editor, b"  why is it crashing \r"),
            Some(Feed::Event(InputEvent::Text("why is it crashing".to_string())))
        );
        assert_eq!(editor.buffer(), "");
    }

    #[test]
    fn test_commit_on_newline() {
        let mut editor = LineEditor::new(SWITCH);
        assert_eq!(
            feed_all(&mut editor, b"exit\n"),
            Some(Feed::Event(InputEvent::Text("exit".to_string())))
        );
    }

    #[test]
    fn test_backspace_erases_and_echoes() {
        let mut editor = LineEditor::new(SWITCH);
        feed_all(&mut editor, b"logz");
        assert_eq!(
            editor.feed(DELETE),
            Feed::Continue {
                echo: Some("\x08 \x08".to_string())
            }
        );
        assert_eq!(editor.buffer(), "log");
        assert_eq!(
            feed_all(&mut editor, b"s\r"),
            Some(Feed::Event(InputEvent::Text("logs".to_string())))
        );
    }

    #[test]
    fn test_backspace_on_empty_line_is_silent() {
        let mut editor = LineEditor::new(SWITCH);
        assert_eq!(editor.feed(DELETE), Feed::Continue { echo: None });
    }

    #[test]
    fn test_switch_key_discards_partial_line() {
        let mut editor = LineEditor::new(SWITCH);
        assert_eq!(
            feed_all(&mut editor, b"half typed\x0e"),
            Some(Feed::Event(InputEvent::SwitchTarget))
        );
        assert_eq!(editor.buffer(), "");
        assert_eq!(
            feed_all(&mut editor, b"next\r"),
            Some(Feed::Event(InputEvent::Text("next".to_string())))
        );
    }

    #[test]
    fn test_other_control_bytes_ignored() {
        let mut editor = LineEditor::new(SWITCH);
        assert_eq!(editor.feed(0x1b), Feed::Continue { echo: None });
        assert_eq!(editor.feed(b'\t'), Feed::Continue { echo: None });
        assert_eq!(editor.buffer(), "");
    }

    #[test]
    fn test_arrow_keys_leave_no_text() {
        let mut editor = LineEditor::new(SWITCH);
        assert_eq!(
            feed_all(&mut editor, b"why\x1b[A\x1b[D\x1bOB\x1b[1;5C crash\r"),
            Some(Feed::Event(InputEvent::Text("why crash".to_string())))
        );
    }

    #[test]
    fn test_lone_escape_does_not_swallow_enter() {
        let mut editor = LineEditor::new(SWITCH);
        assert_eq!(
            feed_all(&mut editor, b"logs\x1b\r"),
            Some(Feed::Event(InputEvent::Text("logs".to_string())))
        );
    }

    #[test]
    fn test_ctrl_c_closes() {
        let mut editor = LineEditor::new(SWITCH);
        assert_eq!(feed_all(&mut editor, b"abc\x03"), Some(Feed::Closed));
    }

    #[test]
    fn test_ctrl_d_closes_only_empty_line() {
        let mut editor = LineEditor::new(SWITCH);
        assert_eq!(editor.feed(CTRL_D), Feed::Closed);

        let mut editor = LineEditor::new(SWITCH);
        feed_all(&mut editor, b"ab");
        assert_eq!(editor.feed(CTRL_D), Feed::Continue { echo: None });
        assert_eq!(editor.buffer(), "ab");
    }

    #[test]
    fn test_custom_switch_key() {
        let mut editor = LineEditor::new(0x10);
        assert_eq!(editor.feed(0x0e), Feed::Continue { echo: None });
        assert_eq!(editor.feed(0x10), Feed::Event(InputEvent::SwitchTarget));
    }
}
