//! Session: owns the voice engine, slideshow controller, dispatcher,
//! speaker, and auto-advance timer, and routes events between them.
//!
//! Everything is explicitly constructed here and torn down on drop; there
//! are no process-wide singletons. The main loop feeds the session shell
//! commands, engine events, and timer ticks in arrival order; all state
//! mutation happens on that single task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::assistant::OpenAiAssistant;
use crate::config::{FrameConfig, FrameConfigPatch};
use crate::dispatch::{CommandDispatcher, Followup};
use crate::ipc::bridge::EventSink;
use crate::ipc::{CoreEvent, ShellCommand};
use crate::slideshow::timer::{AdvanceTimer, Tick};
use crate::slideshow::{PlaybackSnapshot, SlideshowController};
use crate::tts::Speaker;
use crate::voice::commands::CommandTable;
use crate::voice::{EngineEvent, RecognizerErrorKind, RecognizerPort, VoiceCommandEngine};

/// Recognizer control that asks the shell to drive the platform recognizer.
struct IpcRecognizerPort {
    sink: Arc<dyn EventSink>,
}

impl RecognizerPort for IpcRecognizerPort {
    fn request_start(&self, continuous: bool) {
        self.sink.emit(&CoreEvent::StartRecognizer { continuous });
    }

    fn request_stop(&self) {
        self.sink.emit(&CoreEvent::StopRecognizer {});
    }
}

pub struct Session {
    engine: VoiceCommandEngine,
    slideshow: SlideshowController,
    dispatcher: CommandDispatcher,
    speaker: Speaker,
    timer: AdvanceTimer,
    tick_tx: mpsc::UnboundedSender<Tick>,
    sink: Arc<dyn EventSink>,
    last_snapshot: Option<PlaybackSnapshot>,
}

impl Session {
    pub fn new(
        config: &FrameConfig,
        sink: Arc<dyn EventSink>,
        engine_tx: mpsc::UnboundedSender<EngineEvent>,
        tick_tx: mpsc::UnboundedSender<Tick>,
    ) -> Self {
        let table = config
            .commands
            .clone()
            .map(CommandTable::new)
            .unwrap_or_default();

        let engine = VoiceCommandEngine::new(
            &config.wake_word,
            table,
            config.emergency_keywords.clone(),
            Duration::from_millis(config.restart_backoff_ms),
            Arc::new(IpcRecognizerPort { sink: sink.clone() }),
            engine_tx,
        );

        let slideshow =
            SlideshowController::new(config.order, config.interval_secs, config.transition);

        let assistant = Arc::new(OpenAiAssistant::new(
            config.assistant.endpoint.as_deref(),
            config.assistant.api_key.as_deref(),
            config.assistant.model.as_deref(),
        ));
        let dispatcher = CommandDispatcher::new(assistant, sink.clone());

        let speaker = Speaker::new(
            sink.clone(),
            config.tts_rate,
            config.tts_pitch,
            config.tts_volume,
        );

        Self {
            engine,
            slideshow,
            dispatcher,
            speaker,
            timer: AdvanceTimer::new(),
            tick_tx,
            sink,
            last_snapshot: None,
        }
    }

    /// Handle one command from the shell. Returns `false` when the session
    /// should shut down.
    pub fn handle_shell_command(&mut self, cmd: ShellCommand) -> bool {
        match cmd {
            // -- recognizer callbacks relayed by the shell --
            ShellCommand::RecognizerStarted {} => self.engine.on_recognizer_started(),
            ShellCommand::RecognitionResult {
                transcript,
                confidence,
                is_final,
            } => self.engine.on_result(&transcript, confidence, is_final),
            ShellCommand::RecognitionError { error } => {
                self.engine.on_error(RecognizerErrorKind::from_code(&error))
            }
            ShellCommand::RecognitionEnd {} => self.engine.on_end(),

            // -- listening control --
            ShellCommand::StartListening { continuous } => self.engine.start(continuous),
            ShellCommand::StopListening {} => self.engine.stop(),
            ShellCommand::SetWakeWord { phrase } => self.engine.set_wake_word(&phrase),

            // -- photo set and direct navigation --
            ShellCommand::PhotoSet { photos } => {
                self.slideshow.set_photos(photos);
                self.publish();
            }
            ShellCommand::Next {} => {
                self.slideshow.next();
                self.publish();
            }
            ShellCommand::Previous {} => {
                self.slideshow.previous();
                self.publish();
            }
            ShellCommand::GoTo { index } => {
                self.slideshow.go_to(index);
                self.publish();
            }
            ShellCommand::TogglePlay {} => {
                self.slideshow.toggle_play_pause();
                self.publish();
            }
            ShellCommand::Restart {} => {
                self.slideshow.restart();
                self.publish();
            }
            ShellCommand::Shuffle {} => {
                self.slideshow.reshuffle();
                self.publish();
            }
            ShellCommand::SetOrder { mode } => {
                self.slideshow.set_order(mode);
                self.publish();
            }
            ShellCommand::SetInterval { seconds } => {
                self.slideshow.set_interval_secs(seconds);
                self.publish();
            }
            ShellCommand::SetTransition { transition } => {
                self.slideshow.set_transition(transition);
                self.publish();
            }
            ShellCommand::SetNightMode { enabled } => {
                self.slideshow.set_night_mode(enabled);
                self.publish();
            }
            ShellCommand::ToggleCaptions {} => {
                self.slideshow.toggle_captions();
                self.publish();
            }
            ShellCommand::SetFolder { folder } => {
                self.slideshow.set_folder_filter(folder);
                self.publish();
            }

            // -- misc --
            ShellCommand::SpeakDone {} => self.speaker.on_speak_done(),
            ShellCommand::ConfigUpdate { config } => {
                self.apply_config_patch(&config);
                self.sink.emit(&CoreEvent::ConfigUpdated { config });
                self.publish();
            }
            ShellCommand::Ping {} => self.sink.emit(&CoreEvent::Pong {}),
            ShellCommand::Stop {} => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    /// Handle one event from the voice engine.
    pub async fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::WakeWord { transcript } => {
                self.sink.emit(&CoreEvent::WakeWord { transcript });
            }
            EngineEvent::Command {
                action,
                transcript,
                confidence,
            } => {
                self.sink.emit(&CoreEvent::Command {
                    action,
                    transcript: transcript.clone(),
                    confidence,
                });
                let followup = self
                    .dispatcher
                    .dispatch(action, &transcript, &mut self.slideshow, &mut self.speaker)
                    .await;
                if followup == Followup::StopListening {
                    self.engine.stop();
                }
                self.publish();
            }
            EngineEvent::ListeningChanged { listening } => {
                self.sink.emit(&CoreEvent::Listening { active: listening });
            }
            EngineEvent::Error { fatal, message } => {
                self.sink.emit(&CoreEvent::Error {
                    message: message.clone(),
                });
                if fatal {
                    // The user can't read an error dialog; say it instead.
                    self.speaker
                        .say("I'm having trouble with the microphone right now.");
                }
            }
            EngineEvent::RestartElapsed => self.engine.restart_elapsed(),
        }
    }

    /// An auto-advance tick fired.
    pub fn handle_tick(&mut self) {
        if self.slideshow.is_playing() {
            self.slideshow.next();
            self.publish();
        }
    }

    /// Tear down: stop listening and cancel the advance timer.
    pub fn shutdown(&mut self) {
        info!("Session shutting down");
        self.engine.stop();
        self.timer.cancel();
        self.speaker.clear();
    }

    /// Push state outward after any mutation: slide-change and playback
    /// events when something actually changed, and keep the timer in line
    /// with the play flag and interval.
    fn publish(&mut self) {
        let snapshot = self.slideshow.snapshot();

        let slide_changed = self.last_snapshot.as_ref().map_or(true, |last| {
            last.position != snapshot.position
                || last.current_photo_id != snapshot.current_photo_id
                || last.total != snapshot.total
        });
        if slide_changed {
            self.sink.emit(&CoreEvent::SlideChanged {
                position: snapshot.position,
                total: snapshot.total,
                photo_id: snapshot.current_photo_id.clone(),
            });
        }

        if self.last_snapshot.as_ref() != Some(&snapshot) {
            self.sink.emit(&CoreEvent::Playback {
                state: snapshot.clone(),
            });
        }

        self.timer.reconfigure(
            snapshot.playing,
            Duration::from_secs(snapshot.interval_secs),
            self.tick_tx.clone(),
        );
        self.last_snapshot = Some(snapshot);
    }

    fn apply_config_patch(&mut self, raw: &serde_json::Value) {
        let patch: FrameConfigPatch = match serde_json::from_value(raw.clone()) {
            Ok(p) => p,
            Err(e) => {
                warn!("Ignoring malformed config update: {}", e);
                return;
            }
        };
        if let Some(wake_word) = patch.wake_word {
            self.engine.set_wake_word(&wake_word);
        }
        if let Some(keywords) = patch.emergency_keywords {
            self.engine.set_emergency_keywords(keywords);
        }
        if let Some(secs) = patch.interval_secs {
            self.slideshow.set_interval_secs(secs);
        }
        if let Some(rate) = patch.tts_rate {
            self.speaker.set_rate(rate);
        }
        if let Some(volume) = patch.tts_volume {
            self.speaker.set_volume(volume);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::bridge::CapturingSink;
    use crate::slideshow::Photo;
    use crate::voice::commands::Action;

    fn photo(id: &str, name: &str) -> Photo {
        Photo {
            id: id.to_string(),
            name: name.to_string(),
            captured_at: None,
            created_at: None,
            folder: None,
            url: None,
            hidden: false,
            favorite: false,
            tags: Vec::new(),
        }
    }

    struct Harness {
        session: Session,
        sink: Arc<CapturingSink>,
        engine_rx: mpsc::UnboundedReceiver<EngineEvent>,
    }

    fn harness() -> Harness {
        let sink = Arc::new(CapturingSink::new());
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let (tick_tx, _tick_rx) = mpsc::unbounded_channel();
        // _tick_rx dropped: timer sends fail silently, which is fine here.
        let config = FrameConfig {
            order: crate::slideshow::OrderMode::Sequential,
            ..FrameConfig::default()
        };
        let session = Session::new(&config, sink.clone(), engine_tx, tick_tx);
        Harness {
            session,
            sink,
            engine_rx,
        }
    }

    impl Harness {
        /// Route all pending engine events back into the session, the way
        /// the main loop does.
        async fn pump(&mut self) {
            while let Ok(ev) = self.engine_rx.try_recv() {
                self.session.handle_engine_event(ev).await;
            }
        }
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let mut h = harness();
        assert!(h.session.handle_shell_command(ShellCommand::Ping {}));
        assert!(h
            .sink
            .take()
            .iter()
            .any(|e| matches!(e, CoreEvent::Pong {})));
    }

    #[tokio::test]
    async fn test_photo_set_publishes_slide_and_playback() {
        let mut h = harness();
        h.session.handle_shell_command(ShellCommand::PhotoSet {
            photos: vec![photo("1", "a"), photo("2", "b")],
        });
        let events = h.sink.take();
        assert!(events.iter().any(
            |e| matches!(e, CoreEvent::SlideChanged { total: 2, position: 0, .. })
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e, CoreEvent::Playback { .. })));
    }

    #[tokio::test]
    async fn test_voice_command_end_to_end() {
        let mut h = harness();
        h.session.handle_shell_command(ShellCommand::PhotoSet {
            photos: vec![photo("1", "a"), photo("2", "b")],
        });
        h.session
            .handle_shell_command(ShellCommand::StartListening { continuous: true });
        h.session
            .handle_shell_command(ShellCommand::RecognizerStarted {});
        h.sink.take();

        h.session
            .handle_shell_command(ShellCommand::RecognitionResult {
                transcript: "next picture please".to_string(),
                confidence: 0.85,
                is_final: true,
            });
        h.pump().await;

        let events = h.sink.take();
        assert!(events.iter().any(|e| matches!(
            e,
            CoreEvent::Command { action: Action::NextImage, .. }
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, CoreEvent::SlideChanged { position: 1, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, CoreEvent::Speak { .. })));
    }

    #[tokio::test]
    async fn test_emergency_emits_alert_and_keeps_slide() {
        let mut h = harness();
        h.session.handle_shell_command(ShellCommand::PhotoSet {
            photos: vec![photo("1", "a"), photo("2", "b")],
        });
        h.session
            .handle_shell_command(ShellCommand::StartListening { continuous: false });
        h.session
            .handle_shell_command(ShellCommand::RecognizerStarted {});
        h.sink.take();

        // Not awake: only the emergency path may fire.
        h.session
            .handle_shell_command(ShellCommand::RecognitionResult {
                transcript: "please help me".to_string(),
                confidence: 0.5,
                is_final: true,
            });
        h.pump().await;

        let events = h.sink.take();
        assert!(events
            .iter()
            .any(|e| matches!(e, CoreEvent::Emergency { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, CoreEvent::SlideChanged { position: 1, .. })));
    }

    #[tokio::test]
    async fn test_listening_control_round_trip() {
        let mut h = harness();
        h.session
            .handle_shell_command(ShellCommand::StartListening { continuous: false });
        let events = h.sink.take();
        assert!(events.iter().any(
            |e| matches!(e, CoreEvent::StartRecognizer { continuous: false })
        ));

        h.session
            .handle_shell_command(ShellCommand::RecognizerStarted {});
        h.pump().await;
        assert!(h
            .sink
            .take()
            .iter()
            .any(|e| matches!(e, CoreEvent::Listening { active: true })));

        h.session.handle_shell_command(ShellCommand::StopListening {});
        assert!(h
            .sink
            .take()
            .iter()
            .any(|e| matches!(e, CoreEvent::StopRecognizer {})));
    }

    #[tokio::test]
    async fn test_config_patch_applies_wake_word() {
        let mut h = harness();
        h.session.handle_shell_command(ShellCommand::ConfigUpdate {
            config: serde_json::json!({"wakeWord": "hello frame"}),
        });
        h.session
            .handle_shell_command(ShellCommand::StartListening { continuous: false });
        h.session
            .handle_shell_command(ShellCommand::RecognizerStarted {});
        h.sink.take();

        h.session
            .handle_shell_command(ShellCommand::RecognitionResult {
                transcript: "hello frame".to_string(),
                confidence: 0.9,
                is_final: true,
            });
        h.pump().await;
        assert!(h
            .sink
            .take()
            .iter()
            .any(|e| matches!(e, CoreEvent::WakeWord { .. })));
    }

    #[tokio::test]
    async fn test_stop_command_ends_session() {
        let mut h = harness();
        assert!(!h.session.handle_shell_command(ShellCommand::Stop {}));
    }
}
