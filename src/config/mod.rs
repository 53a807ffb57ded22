//! Configuration reading and runtime updates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::slideshow::{OrderMode, Transition, DEFAULT_INTERVAL_SECS};
use crate::voice::commands::{default_emergency_keywords, CommandEntry};

/// Top-level frame_config.json shape (written by the shell settings panel).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameConfig {
    #[serde(default = "default_wake_word")]
    pub wake_word: String,
    #[serde(default = "default_emergency_keywords")]
    pub emergency_keywords: Vec<String>,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_order")]
    pub order: OrderMode,
    #[serde(default = "default_transition")]
    pub transition: Transition,
    #[serde(default = "default_rate")]
    pub tts_rate: f32,
    #[serde(default = "default_pitch")]
    pub tts_pitch: f32,
    #[serde(default = "default_volume")]
    pub tts_volume: f32,
    #[serde(default = "default_backoff")]
    pub restart_backoff_ms: u64,
    #[serde(default)]
    pub assistant: AssistantConfig,
    /// Optional full phrase-table override. Order matters: first match wins.
    #[serde(default)]
    pub commands: Option<Vec<CommandEntry>>,
}

/// Assistant endpoint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Runtime config patch, applied from the shell's `config_update` command.
/// Only the fields present in the payload change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameConfigPatch {
    #[serde(default)]
    pub wake_word: Option<String>,
    #[serde(default)]
    pub emergency_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub tts_rate: Option<f32>,
    #[serde(default)]
    pub tts_volume: Option<f32>,
}

fn default_wake_word() -> String {
    "hey sunny".to_string()
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_order() -> OrderMode {
    OrderMode::Random
}

fn default_transition() -> Transition {
    Transition::Fade
}

// Slightly slower than normal speech reads better for the target audience.
fn default_rate() -> f32 {
    0.9
}

fn default_pitch() -> f32 {
    1.0
}

fn default_volume() -> f32 {
    1.0
}

fn default_backoff() -> u64 {
    750
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            wake_word: default_wake_word(),
            emergency_keywords: default_emergency_keywords(),
            interval_secs: default_interval(),
            order: default_order(),
            transition: default_transition(),
            tts_rate: default_rate(),
            tts_pitch: default_pitch(),
            tts_volume: default_volume(),
            restart_backoff_ms: default_backoff(),
            assistant: AssistantConfig::default(),
            commands: None,
        }
    }
}

/// Read frame_config.json from the data directory.
pub fn read_frame_config() -> FrameConfig {
    let path = get_config_path();
    read_json_file(&path).unwrap_or_default()
}

/// Path to frame_config.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("frame_config.json")
}

/// Data directory: `<platform config dir>/sunny-frame/data`. The `dirs`
/// crate resolves the platform base (%APPDATA%, `~/Library/Application
/// Support`, `$XDG_CONFIG_HOME`); a missing base falls back to the home
/// directory, then the working directory.
pub fn get_data_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sunny-frame")
        .join("data")
}

/// Generic helper: read a JSON file and deserialize it.
fn read_json_file<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FrameConfig::default();
        assert_eq!(config.wake_word, "hey sunny");
        assert_eq!(config.interval_secs, DEFAULT_INTERVAL_SECS);
        assert!(!config.emergency_keywords.is_empty());
        assert!(config.commands.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: FrameConfig =
            serde_json::from_str(r#"{"wakeWord": "hello frame", "intervalSecs": 15}"#).unwrap();
        assert_eq!(config.wake_word, "hello frame");
        assert_eq!(config.interval_secs, 15);
        assert_eq!(config.order, OrderMode::Random);
        assert_eq!(config.transition, Transition::Fade);
    }

    #[test]
    fn test_config_path_layout() {
        let path = get_config_path();
        assert!(path.ends_with("sunny-frame/data/frame_config.json"));
    }

    #[test]
    fn test_patch_only_carries_present_fields() {
        let patch: FrameConfigPatch =
            serde_json::from_str(r#"{"ttsVolume": 0.5}"#).unwrap();
        assert_eq!(patch.tts_volume, Some(0.5));
        assert!(patch.wake_word.is_none());
        assert!(patch.interval_secs.is_none());
    }
}
