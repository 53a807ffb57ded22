//! IPC bridge: stdin reader and stdout event emitter.
//!
//! A blocking stdin reader thread sends deserialized commands through an
//! mpsc channel to the async session loop, plus a helper to emit JSON-line
//! events to stdout. Logging goes to stderr so stdout stays a clean
//! protocol channel.

use std::io::{self, BufRead, Write};
#[cfg(test)]
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, error};

use super::{CoreEvent, ShellCommand};

/// Where core events go. The production sink writes JSON lines to stdout;
/// tests substitute a capturing sink.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &CoreEvent);
}

/// Production sink: JSON lines on stdout.
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: &CoreEvent) {
        emit_event(event);
    }
}

/// Test sink: records every emitted event.
#[cfg(test)]
pub struct CapturingSink {
    pub events: Mutex<Vec<CoreEvent>>,
}

#[cfg(test)]
impl CapturingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn take(&self) -> Vec<CoreEvent> {
        std::mem::take(&mut self.events.lock().unwrap())
    }
}

#[cfg(test)]
impl Default for CapturingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl EventSink for CapturingSink {
    fn emit(&self, event: &CoreEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Emit a `CoreEvent` as a JSON line on stdout and flush.
pub fn emit_event(event: &CoreEvent) {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Failed to serialize event: {}", e);
            return;
        }
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    // Ignore write/flush errors; pipe may be closed.
    let _ = writeln!(handle, "{}", json);
    let _ = handle.flush();
}

/// Convenience helper for emitting error events.
pub fn emit_error(message: &str) {
    emit_event(&CoreEvent::Error {
        message: message.to_string(),
    });
}

/// Spawn a blocking thread that reads JSON lines from stdin, deserializes
/// them into `ShellCommand`, and forwards them through the returned channel.
///
/// The thread exits when stdin is closed (parent process gone) or on
/// unrecoverable read error.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<ShellCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        let reader = stdin.lock();
        for line in reader.lines() {
            match line {
                Ok(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<ShellCommand>(trimmed) {
                        Ok(cmd) => {
                            debug!(?cmd, "Received command from shell");
                            if tx.send(cmd).is_err() {
                                break; // Receiver dropped; session is gone.
                            }
                        }
                        Err(e) => {
                            error!("Invalid JSON command: {}; input: {}", e, trimmed);
                            emit_error(&format!("Invalid JSON command: {}", e));
                        }
                    }
                }
                Err(e) => {
                    error!("stdin read error: {}", e);
                    break; // stdin closed
                }
            }
        }
        debug!("stdin reader thread exiting");
    });

    rx
}
