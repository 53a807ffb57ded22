//! Voice command engine: wake-word gating, emergency interruption, and
//! phrase matching over a live transcript stream.
//!
//! The engine never touches audio itself. The shell owns the platform
//! recognizer and relays its callbacks as typed events (result / error /
//! end / started); the engine turns those into symbolic commands and
//! drives recognizer start/stop through a [`RecognizerPort`].

pub mod commands;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use commands::{Action, CommandTable};

/// Abstract control surface of the shell-side recognizer.
///
/// Implementations request start/stop; confirmation arrives back through
/// `on_recognizer_started` / `on_end`.
pub trait RecognizerPort: Send + Sync {
    fn request_start(&self, continuous: bool);
    fn request_stop(&self);
}

/// Recognition error kinds, mapped from the shell's error codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerErrorKind {
    /// Nothing was said in the listening window. Expected, never surfaced.
    NoSpeech,
    /// Microphone capture failed. Fatal to the session.
    AudioCapture,
    /// Microphone permission denied. Fatal to the session.
    NotAllowed,
    /// The recognizer was aborted by the shell.
    Aborted,
    /// Anything else (network, service unavailable, ...).
    Other(String),
}

impl RecognizerErrorKind {
    /// Parse a Web-Speech-style error code string.
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::AudioCapture,
            "not-allowed" | "service-not-allowed" => Self::NotAllowed,
            "aborted" => Self::Aborted,
            other => Self::Other(other.to_string()),
        }
    }

    fn is_fatal(&self) -> bool {
        matches!(self, Self::AudioCapture | Self::NotAllowed)
    }
}

impl std::fmt::Display for RecognizerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSpeech => write!(f, "no-speech"),
            Self::AudioCapture => write!(f, "audio-capture"),
            Self::NotAllowed => write!(f, "not-allowed"),
            Self::Aborted => write!(f, "aborted"),
            Self::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Listening state machine.
///
/// `Restarting` carries whether the restart was requested manually (a second
/// `start()` while active) or automatically (continuous-mode stream end).
/// A manual restart in flight suppresses the automatic restart path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    Idle,
    Starting,
    Listening,
    Stopping,
    Restarting { manual: bool },
}

/// Events emitted by the engine to the session loop.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Wake word heard; the engine is now awake. No command is emitted.
    WakeWord { transcript: String },
    /// A command matched (or the emergency path fired).
    Command {
        action: Action,
        transcript: String,
        confidence: f64,
    },
    /// Listening started or stopped.
    ListeningChanged { listening: bool },
    /// A recognition error surfaced to the caller. Fatal errors have
    /// already disabled continuous mode and returned the engine to Idle.
    Error { fatal: bool, message: String },
    /// Internal: the continuous-mode restart backoff elapsed. The session
    /// routes this back into `restart_elapsed()`.
    RestartElapsed,
}

/// Ephemeral per-listening-session record. Reset when listening stops.
#[derive(Debug, Clone, Default)]
pub struct VoiceSession {
    pub awake: bool,
    pub last_transcript: Option<String>,
    pub last_action: Option<Action>,
    pub last_confidence: f64,
}

/// The voice command engine.
pub struct VoiceCommandEngine {
    state: ListenState,
    continuous: bool,
    /// Continuous flag to apply when a pending (re)start completes.
    pending_continuous: bool,
    wake_word: String,
    table: CommandTable,
    emergency_keywords: Vec<String>,
    restart_backoff: Duration,
    session: VoiceSession,
    port: Arc<dyn RecognizerPort>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    restart_task: Option<tokio::task::JoinHandle<()>>,
}

impl VoiceCommandEngine {
    pub fn new(
        wake_word: &str,
        table: CommandTable,
        emergency_keywords: Vec<String>,
        restart_backoff: Duration,
        port: Arc<dyn RecognizerPort>,
        events_tx: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            state: ListenState::Idle,
            continuous: false,
            pending_continuous: false,
            wake_word: wake_word.trim().to_lowercase(),
            table,
            emergency_keywords: normalize_keywords(emergency_keywords),
            restart_backoff,
            session: VoiceSession::default(),
            port,
            events_tx,
            restart_task: None,
        }
    }

    pub fn state(&self) -> ListenState {
        self.state
    }

    pub fn session(&self) -> &VoiceSession {
        &self.session
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// Update the wake word. Applies to the next transcript.
    pub fn set_wake_word(&mut self, phrase: &str) {
        self.wake_word = phrase.trim().to_lowercase();
        info!(wake_word = %self.wake_word, "Wake word updated");
    }

    /// Replace the emergency keyword list.
    pub fn set_emergency_keywords(&mut self, keywords: Vec<String>) {
        self.emergency_keywords = normalize_keywords(keywords);
    }

    /// Begin listening.
    ///
    /// If the recognizer is already active, performs a cooperative
    /// stop-then-restart: the actual start request is deferred until the
    /// shell confirms stream end. The platform recognizer rejects a second
    /// concurrent start, so we never issue one.
    pub fn start(&mut self, continuous: bool) {
        self.cancel_restart_timer();
        self.pending_continuous = continuous;

        match self.state {
            ListenState::Idle => {
                self.continuous = continuous;
                self.state = ListenState::Starting;
                self.port.request_start(continuous);
            }
            ListenState::Starting => {
                // Start already in flight; just adopt the new flag.
                self.continuous = continuous;
            }
            ListenState::Listening | ListenState::Restarting { .. } => {
                info!("Recognizer active; restarting cooperatively");
                self.state = ListenState::Restarting { manual: true };
                self.port.request_stop();
            }
            ListenState::Stopping => {
                // A stop is already in flight; turn it into a restart.
                self.state = ListenState::Restarting { manual: true };
            }
        }
    }

    /// Stop listening. Idempotent: a second call is a no-op.
    pub fn stop(&mut self) {
        self.cancel_restart_timer();
        self.session = VoiceSession::default();

        match self.state {
            ListenState::Idle | ListenState::Stopping => {}
            ListenState::Restarting { manual: true } => {
                // A stop request is already in flight; wait for its end event.
                self.state = ListenState::Stopping;
            }
            ListenState::Restarting { manual: false } => {
                // The stream already ended on its own; no end event will ever
                // arrive. The cancelled backoff leaves nothing pending.
                self.state = ListenState::Idle;
                self.emit(EngineEvent::ListeningChanged { listening: false });
            }
            ListenState::Starting | ListenState::Listening => {
                self.state = ListenState::Stopping;
                self.port.request_stop();
            }
        }
    }

    /// Shell confirmed the recognizer stream is live.
    pub fn on_recognizer_started(&mut self) {
        debug!(state = ?self.state, "Recognizer started");
        self.state = ListenState::Listening;
        self.emit(EngineEvent::ListeningChanged { listening: true });
    }

    /// Shell relayed a recognition result.
    pub fn on_result(&mut self, transcript: &str, confidence: f64, is_final: bool) {
        if !is_final {
            return;
        }
        let text = transcript.trim().to_lowercase();
        if text.is_empty() {
            return;
        }
        debug!(transcript = %text, confidence, "Transcript segment");
        self.session.last_transcript = Some(text.clone());
        self.handle_transcript(&text, confidence);
    }

    /// Shell relayed a recognition error.
    pub fn on_error(&mut self, kind: RecognizerErrorKind) {
        match kind {
            RecognizerErrorKind::NoSpeech => {
                // Expected in a quiet room. Never surfaced.
                debug!("No speech in listening window");
            }
            kind if kind.is_fatal() => {
                warn!(%kind, "Fatal recognition error; disabling continuous mode");
                self.continuous = false;
                self.cancel_restart_timer();
                self.session = VoiceSession::default();
                let was_active = self.state != ListenState::Idle;
                self.state = ListenState::Idle;
                self.emit(EngineEvent::Error {
                    fatal: true,
                    message: format!("recognition unavailable: {}", kind),
                });
                if was_active {
                    self.emit(EngineEvent::ListeningChanged { listening: false });
                }
            }
            kind => {
                warn!(%kind, "Recognition error");
                self.emit(EngineEvent::Error {
                    fatal: false,
                    message: format!("recognition error: {}", kind),
                });
            }
        }
    }

    /// Shell signalled stream end (distinct from error).
    pub fn on_end(&mut self) {
        debug!(state = ?self.state, "Recognizer stream ended");
        match self.state {
            ListenState::Idle => {}
            ListenState::Stopping => {
                self.state = ListenState::Idle;
                self.emit(EngineEvent::ListeningChanged { listening: false });
            }
            ListenState::Restarting { manual: true } => {
                // Cooperative restart: the stream is confirmed down, start anew.
                self.continuous = self.pending_continuous;
                self.state = ListenState::Starting;
                self.port.request_start(self.continuous);
            }
            ListenState::Restarting { manual: false } => {
                // Backoff already scheduled; nothing to do.
            }
            ListenState::Starting | ListenState::Listening => {
                if self.continuous {
                    // Stream ended on its own; restart after a fixed backoff.
                    self.state = ListenState::Restarting { manual: false };
                    self.schedule_restart();
                } else {
                    self.session.awake = false;
                    self.state = ListenState::Idle;
                    self.emit(EngineEvent::ListeningChanged { listening: false });
                }
            }
        }
    }

    /// The continuous-mode restart backoff elapsed (routed back by the
    /// session loop). Ignored unless an automatic restart is still pending;
    /// a manual restart or a stop in the meantime supersedes it.
    pub fn restart_elapsed(&mut self) {
        if self.state == (ListenState::Restarting { manual: false }) {
            self.restart_task = None;
            self.state = ListenState::Starting;
            self.port.request_start(self.continuous);
        }
    }

    // -- transcript pipeline --

    fn handle_transcript(&mut self, text: &str, confidence: f64) {
        // 1. Emergency check: unconditional, full confidence, short-circuits.
        if self
            .emergency_keywords
            .iter()
            .any(|kw| text.contains(kw.as_str()))
        {
            warn!(transcript = %text, "Emergency keyword detected");
            self.session.last_action = Some(Action::EmergencyDetected);
            self.session.last_confidence = 1.0;
            self.emit(EngineEvent::Command {
                action: Action::EmergencyDetected,
                transcript: text.to_string(),
                confidence: 1.0,
            });
            return;
        }

        // 2. Wake-word gate (outside continuous mode). The wake word itself
        //    is not dispatched as a command.
        if !self.session.awake && !self.continuous {
            if !self.wake_word.is_empty() && text.contains(self.wake_word.as_str()) {
                info!("Wake word heard");
                self.session.awake = true;
                self.emit(EngineEvent::WakeWord {
                    transcript: text.to_string(),
                });
            }
            return;
        }

        // 3. Command matching: first table entry with a phrase contained in
        //    the transcript wins.
        if let Some(entry) = self.table.match_transcript(text) {
            info!(action = ?entry.action, confidence, "Command matched");
            self.session.last_action = Some(entry.action);
            self.session.last_confidence = confidence;
            // Each command consumes the wake word unless always-on.
            if !self.continuous {
                self.session.awake = false;
            }
            self.emit(EngineEvent::Command {
                action: entry.action,
                transcript: text.to_string(),
                confidence,
            });
        }
        // 4. No match: the awake state is left unconsumed; wait for the
        //    next utterance.
    }

    // -- internals --

    fn schedule_restart(&mut self) {
        let tx = self.events_tx.clone();
        let backoff = self.restart_backoff;
        self.restart_task = Some(tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            let _ = tx.send(EngineEvent::RestartElapsed);
        }));
    }

    fn cancel_restart_timer(&mut self) {
        if let Some(task) = self.restart_task.take() {
            task.abort();
        }
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events_tx.send(event);
    }
}

impl Drop for VoiceCommandEngine {
    fn drop(&mut self) {
        self.cancel_restart_timer();
    }
}

/// Matching lower-cases the transcript, so keywords must be lower-case too,
/// wherever they came from. An empty keyword would match every transcript
/// via `contains`; drop it.
fn normalize_keywords(keywords: Vec<String>) -> Vec<String> {
    keywords
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}
