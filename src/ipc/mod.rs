//! IPC protocol types for communication with the UI shell.
//!
//! Events use `{"event": "<name>", "data": {...}}` format (core -> shell).
//! Commands use `{"command": "<name>", ...}` format (shell -> core).
//!
//! The shell owns the platform speech APIs and the photo store; recognition
//! callbacks and photo-set changes come in as commands, synthesis requests
//! and photo mutations go out as events.

pub mod bridge;

use serde::{Deserialize, Serialize};

use crate::slideshow::{OrderMode, Photo, PlaybackSnapshot, Transition};
use crate::voice::commands::Action;

// ---------------------------------------------------------------------------
// Events: core -> shell (stdout)
// ---------------------------------------------------------------------------

/// All events emitted to the shell via stdout as JSON lines.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum CoreEvent {
    Starting {},
    Ready {},
    /// Ask the shell to start its speech recognizer.
    StartRecognizer { continuous: bool },
    /// Ask the shell to stop its speech recognizer.
    StopRecognizer {},
    /// Listening state changed.
    Listening { active: bool },
    /// Wake word heard; the shell may show a visual cue.
    WakeWord { transcript: String },
    /// A symbolic command was recognized.
    Command {
        action: Action,
        transcript: String,
        confidence: f64,
    },
    /// Ask the shell to synthesize speech. The shell answers with
    /// `speak_done` when the utterance ends.
    Speak {
        text: String,
        rate: f32,
        pitch: f32,
        volume: f32,
    },
    /// The current slide changed.
    SlideChanged {
        position: usize,
        total: usize,
        #[serde(rename = "photoId", skip_serializing_if = "Option::is_none")]
        photo_id: Option<String>,
    },
    /// Full playback state snapshot.
    Playback { state: PlaybackSnapshot },
    /// Request a favorite-flag change; the shell persists it and sends a
    /// fresh photo set.
    SetFavorite {
        #[serde(rename = "photoId")]
        photo_id: String,
        favorite: bool,
    },
    /// Request a hidden-flag change; same contract as `set_favorite`.
    SetHidden {
        #[serde(rename = "photoId")]
        photo_id: String,
        hidden: bool,
    },
    /// Emergency keyword heard. The shell notifies caregivers; the
    /// slideshow is untouched.
    Emergency { transcript: String },
    Error { message: String },
    Pong {},
    ConfigUpdated { config: serde_json::Value },
    Stopping {},
}

// ---------------------------------------------------------------------------
// Commands: shell -> core (stdin)
// ---------------------------------------------------------------------------

/// All commands received from the shell via stdin as JSON lines.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command")]
#[serde(rename_all = "snake_case")]
pub enum ShellCommand {
    /// The shell's recognizer confirmed it is live.
    RecognizerStarted {},
    /// A recognition result (relayed platform callback).
    RecognitionResult {
        transcript: String,
        #[serde(default)]
        confidence: f64,
        #[serde(rename = "isFinal", default = "default_true")]
        is_final: bool,
    },
    /// A recognition error with the platform error code string
    /// (e.g. "no-speech", "audio-capture", "not-allowed").
    RecognitionError { error: String },
    /// The recognition stream ended (distinct from error).
    RecognitionEnd {},

    /// Begin voice listening.
    StartListening {
        #[serde(default)]
        continuous: bool,
    },
    /// Stop voice listening.
    StopListening {},
    SetWakeWord { phrase: String },

    /// Replace the photo set (also sent after favorite/hide mutations).
    PhotoSet { photos: Vec<Photo> },

    // Direct UI navigation; shares entry points with voice commands.
    Next {},
    Previous {},
    GoTo { index: usize },
    TogglePlay {},
    Restart {},
    Shuffle {},
    SetOrder { mode: OrderMode },
    SetInterval { seconds: u64 },
    SetTransition { transition: Transition },
    SetNightMode { enabled: bool },
    ToggleCaptions {},
    SetFolder {
        #[serde(default)]
        folder: Option<String>,
    },

    /// The shell finished speaking the last `speak` event.
    SpeakDone {},
    ConfigUpdate {
        #[serde(default)]
        config: serde_json::Value,
    },
    Ping {},
    Stop {},
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_deserialization() {
        let cmd: ShellCommand = serde_json::from_str(
            r#"{"command": "recognition_result", "transcript": "next picture", "confidence": 0.92}"#,
        )
        .unwrap();
        match cmd {
            ShellCommand::RecognitionResult {
                transcript,
                confidence,
                is_final,
            } => {
                assert_eq!(transcript, "next picture");
                assert!((confidence - 0.92).abs() < f64::EPSILON);
                assert!(is_final); // defaults to true when omitted
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_event_serialization_shape() {
        let json = serde_json::to_value(CoreEvent::Command {
            action: Action::NextImage,
            transcript: "next picture".to_string(),
            confidence: 0.9,
        })
        .unwrap();
        assert_eq!(json["event"], "command");
        assert_eq!(json["data"]["action"], "NEXT_IMAGE");
    }

    #[test]
    fn test_photo_set_accepts_minimal_photos() {
        let cmd: ShellCommand = serde_json::from_str(
            r#"{"command": "photo_set", "photos": [{"id": "p1", "name": "garden"}]}"#,
        )
        .unwrap();
        match cmd {
            ShellCommand::PhotoSet { photos } => {
                assert_eq!(photos.len(), 1);
                assert!(!photos[0].hidden);
                assert!(photos[0].captured_at.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_set_order_mode_strings() {
        let cmd: ShellCommand =
            serde_json::from_str(r#"{"command": "set_order", "mode": "date_desc"}"#).unwrap();
        assert!(matches!(
            cmd,
            ShellCommand::SetOrder {
                mode: OrderMode::DateDesc
            }
        ));
    }
}
