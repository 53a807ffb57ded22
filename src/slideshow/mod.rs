//! Slideshow playback controller.
//!
//! Derives a display sequence from the photo set under the selected ordering
//! policy and exposes safe navigation. The controller never mutates photos:
//! favorite/hide changes are requested outward and applied by the shell,
//! which then replaces the photo set.

pub mod timer;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Minimum auto-advance interval. Anything shorter flips photos faster than
/// the intended audience can look at them.
const MIN_INTERVAL_SECS: u64 = 2;

/// Default auto-advance interval.
pub const DEFAULT_INTERVAL_SECS: u64 = 8;

/// A photo record supplied by the shell. Read-only for the whole playback
/// cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub folder: Option<String>,
    /// Where the shell serves the image from, for AI descriptions.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Photo {
    /// Timestamp used by the date ordering modes: capture time if present,
    /// else creation time.
    fn sort_time(&self) -> Option<DateTime<Utc>> {
        self.captured_at.or(self.created_at)
    }
}

/// Ordering policy for the display sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMode {
    Random,
    Sequential,
    Reverse,
    DateAsc,
    DateDesc,
}

impl std::fmt::Display for OrderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
            Self::Sequential => write!(f, "sequential"),
            Self::Reverse => write!(f, "reverse"),
            Self::DateAsc => write!(f, "date_asc"),
            Self::DateDesc => write!(f, "date_desc"),
        }
    }
}

/// Visual transition between slides. The shell renders it; the core only
/// carries the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Fade,
    Slide,
    Zoom,
}

/// Serializable snapshot of the playback state, emitted to the shell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub position: usize,
    pub total: usize,
    pub playing: bool,
    pub interval_secs: u64,
    pub order: OrderMode,
    pub transition: Transition,
    pub night_mode: bool,
    pub captions: bool,
    pub current_photo_id: Option<String>,
}

/// The slideshow controller.
///
/// Owns the filtered, ordered sequence of photo ids and the current
/// position. The auto-advance timer lives outside (see [`timer`]) and
/// drives `next()` through the session loop.
pub struct SlideshowController {
    photos: Vec<Photo>,
    order: OrderMode,
    folder_filter: Option<String>,
    sequence: Vec<String>,
    position: usize,
    playing: bool,
    interval_secs: u64,
    night_mode: bool,
    transition: Transition,
    captions: bool,
}

impl SlideshowController {
    pub fn new(order: OrderMode, interval_secs: u64, transition: Transition) -> Self {
        Self {
            photos: Vec::new(),
            order,
            folder_filter: None,
            sequence: Vec::new(),
            position: 0,
            playing: false,
            interval_secs: interval_secs.max(MIN_INTERVAL_SECS),
            night_mode: false,
            transition,
            captions: true,
        }
    }

    // -- sequence derivation --

    /// Replace the photo set and rebuild the sequence.
    pub fn set_photos(&mut self, photos: Vec<Photo>) {
        self.photos = photos;
        self.rebuild();
        info!(
            photos = self.photos.len(),
            sequence = self.sequence.len(),
            "Photo set replaced"
        );
    }

    /// Change the ordering mode and rebuild.
    pub fn set_order(&mut self, order: OrderMode) {
        self.order = order;
        self.rebuild();
    }

    /// Set or clear the folder filter and rebuild.
    pub fn set_folder_filter(&mut self, folder: Option<String>) {
        self.folder_filter = folder;
        self.rebuild();
    }

    /// Recompute the display sequence under the current mode. For `random`
    /// this draws a fresh uniform shuffle.
    pub fn reshuffle(&mut self) {
        self.rebuild();
    }

    /// Filter and order the photo set into a fresh sequence.
    ///
    /// Filtering policy: hidden photos are excluded, except when a folder
    /// filter is active; then folder membership alone decides, hidden or
    /// not. The folder view deliberately shows everything in the folder.
    fn rebuild(&mut self) {
        let current = self.current_photo_id();

        let mut eligible: Vec<&Photo> = match &self.folder_filter {
            Some(folder) => self
                .photos
                .iter()
                .filter(|p| p.folder.as_deref() == Some(folder.as_str()))
                .collect(),
            None => self.photos.iter().filter(|p| !p.hidden).collect(),
        };

        match self.order {
            OrderMode::Random => {
                eligible.shuffle(&mut rand::thread_rng());
            }
            OrderMode::Sequential => {
                eligible.sort_by(|a, b| a.name.cmp(&b.name));
            }
            OrderMode::Reverse => {
                eligible.sort_by(|a, b| b.name.cmp(&a.name));
            }
            OrderMode::DateAsc => {
                eligible.sort_by(|a, b| a.sort_time().cmp(&b.sort_time()));
            }
            OrderMode::DateDesc => {
                eligible.sort_by(|a, b| b.sort_time().cmp(&a.sort_time()));
            }
        }

        self.sequence.clear();
        for photo in eligible {
            // The shell should not send duplicate ids, but the sequence
            // invariant is ours to hold.
            if !self.sequence.contains(&photo.id) {
                self.sequence.push(photo.id.clone());
            }
        }

        // Keep showing the same photo when it survives the rebuild.
        self.position = current
            .and_then(|id| self.sequence.iter().position(|p| *p == id))
            .unwrap_or(0);
    }

    // -- navigation --

    pub fn can_go_next(&self) -> bool {
        self.sequence.len() > 1
    }

    pub fn can_go_previous(&self) -> bool {
        self.sequence.len() > 1
    }

    /// Advance with wraparound. No-op for sequences of length <= 1.
    pub fn next(&mut self) {
        if !self.can_go_next() {
            return;
        }
        self.position = (self.position + 1) % self.sequence.len();
        debug!(position = self.position, "Advanced");
    }

    /// Retreat with wraparound. No-op for sequences of length <= 1.
    pub fn previous(&mut self) {
        if !self.can_go_previous() {
            return;
        }
        self.position = if self.position == 0 {
            self.sequence.len() - 1
        } else {
            self.position - 1
        };
        debug!(position = self.position, "Retreated");
    }

    /// Jump to an explicit index. Ignored if out of bounds.
    pub fn go_to(&mut self, index: usize) {
        if index < self.sequence.len() {
            self.position = index;
        }
    }

    /// Flip the play flag. The timer reacts by observing the snapshot; this
    /// has no direct timer side effect.
    pub fn toggle_play_pause(&mut self) {
        self.playing = !self.playing;
        info!(playing = self.playing, "Play/pause toggled");
    }

    /// Reset to the first slide and force playback on.
    pub fn restart(&mut self) {
        self.position = 0;
        self.playing = true;
    }

    // -- settings --

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Set the auto-advance interval, clamped to the minimum.
    pub fn set_interval_secs(&mut self, secs: u64) {
        self.interval_secs = secs.max(MIN_INTERVAL_SECS);
    }

    pub fn set_transition(&mut self, transition: Transition) {
        self.transition = transition;
    }

    pub fn set_night_mode(&mut self, enabled: bool) {
        self.night_mode = enabled;
    }

    pub fn toggle_captions(&mut self) {
        self.captions = !self.captions;
    }

    // -- accessors --

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn night_mode(&self) -> bool {
        self.night_mode
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn sequence(&self) -> &[String] {
        &self.sequence
    }

    pub fn current_photo_id(&self) -> Option<String> {
        self.sequence.get(self.position).cloned()
    }

    pub fn current_photo(&self) -> Option<&Photo> {
        let id = self.sequence.get(self.position)?;
        self.photos.iter().find(|p| p.id == *id)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            position: self.position,
            total: self.sequence.len(),
            playing: self.playing,
            interval_secs: self.interval_secs,
            order: self.order,
            transition: self.transition,
            night_mode: self.night_mode,
            captions: self.captions,
            current_photo_id: self.current_photo_id(),
        }
    }
}
