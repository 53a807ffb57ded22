//! Speech output.
//!
//! The core does not synthesize audio itself: it emits `speak` events and
//! the shell drives the platform synthesizer, answering with `speak_done`
//! when the utterance ends. The [`Speaker`] serializes utterances so the
//! synthesizer is never asked to speak over itself.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::ipc::bridge::EventSink;
use crate::ipc::CoreEvent;

pub struct Speaker {
    sink: Arc<dyn EventSink>,
    rate: f32,
    pitch: f32,
    volume: f32,
    /// Waiting for `speak_done` of an in-flight utterance.
    speaking: bool,
    queue: VecDeque<String>,
}

impl Speaker {
    pub fn new(sink: Arc<dyn EventSink>, rate: f32, pitch: f32, volume: f32) -> Self {
        Self {
            sink,
            rate,
            pitch,
            volume: volume.clamp(0.0, 1.0),
            speaking: false,
            queue: VecDeque::new(),
        }
    }

    /// Speak a phrase, queueing it behind any in-flight utterance.
    pub fn say(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.speaking {
            debug!(text, "Queueing utterance");
            self.queue.push_back(text.to_string());
            return;
        }
        self.emit(text);
    }

    /// The shell finished the current utterance; start the next, if any.
    pub fn on_speak_done(&mut self) {
        match self.queue.pop_front() {
            Some(next) => self.emit(&next),
            None => self.speaking = false,
        }
    }

    /// Drop anything queued and forget the in-flight utterance.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.speaking = false;
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
    }

    /// Set output volume (0.0 = silent, 1.0 = full volume).
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    fn emit(&mut self, text: &str) {
        self.speaking = true;
        self.sink.emit(&CoreEvent::Speak {
            text: text.to_string(),
            rate: self.rate,
            pitch: self.pitch,
            volume: self.volume,
        });
    }
}
