//! Command dispatch: symbolic command -> effect + spoken acknowledgement.
//!
//! Every recognized command produces a spoken phrase; the target audience
//! cannot be expected to read an error dialog, so failures speak too.
//! Slideshow mutations go through the controller; favorite/hide and
//! emergency effects are requested outward through the event sink.

use std::sync::Arc;

use tracing::{info, warn};

use crate::assistant::AssistantClient;
use crate::ipc::bridge::EventSink;
use crate::ipc::CoreEvent;
use crate::slideshow::SlideshowController;
use crate::tts::Speaker;
use crate::voice::commands::Action;

/// Spoken when the assistant call fails. Fixed phrase, never a raw error.
const ASSISTANT_FALLBACK: &str =
    "I'm sorry, I can't answer that right now. Let's keep looking at your pictures.";

const HELP_TEXT: &str = "You can say things like: next picture, go back, pause, \
describe this picture, or shuffle. If you ever need help, just say help me.";

/// Follow-up work the session must do after a dispatch; the dispatcher
/// itself never touches the voice engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    None,
    StopListening,
}

pub struct CommandDispatcher {
    assistant: Arc<dyn AssistantClient>,
    sink: Arc<dyn EventSink>,
    /// Seconds added/removed by the faster/slower commands.
    speed_step: u64,
}

impl CommandDispatcher {
    pub fn new(assistant: Arc<dyn AssistantClient>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            assistant,
            sink,
            speed_step: 2,
        }
    }

    /// Apply a symbolic command.
    ///
    /// Consults the current slideshow state where relevant (pausing an
    /// already-paused show acknowledges without changing anything).
    pub async fn dispatch(
        &self,
        action: Action,
        transcript: &str,
        slideshow: &mut SlideshowController,
        speaker: &mut Speaker,
    ) -> Followup {
        info!(?action, "Dispatching command");
        match action {
            Action::NextImage => {
                if slideshow.can_go_next() {
                    slideshow.next();
                    speaker.say("Here is the next picture.");
                } else {
                    speaker.say("This is the only picture right now.");
                }
            }
            Action::PreviousImage => {
                if slideshow.can_go_previous() {
                    slideshow.previous();
                    speaker.say("Going back one picture.");
                } else {
                    speaker.say("This is the only picture right now.");
                }
            }
            Action::Pause => {
                if slideshow.is_playing() {
                    slideshow.set_playing(false);
                    speaker.say("Pausing the slideshow.");
                } else {
                    speaker.say("The slideshow is already paused.");
                }
            }
            Action::Resume => {
                if slideshow.is_playing() {
                    speaker.say("The slideshow is already playing.");
                } else {
                    slideshow.set_playing(true);
                    speaker.say("Resuming the slideshow.");
                }
            }
            Action::ShufflePhotos => {
                slideshow.reshuffle();
                speaker.say("Shuffling your pictures.");
            }
            Action::RestartSlideshow => {
                slideshow.restart();
                speaker.say("Starting over from the beginning.");
            }
            Action::DescribePhoto => {
                self.describe_current(slideshow, speaker).await;
            }
            Action::AddFavorite => match slideshow.current_photo() {
                Some(photo) => {
                    self.sink.emit(&CoreEvent::SetFavorite {
                        photo_id: photo.id.clone(),
                        favorite: true,
                    });
                    speaker.say("I'll remember that this is one of your favorites.");
                }
                None => speaker.say("I don't see a picture to mark right now."),
            },
            Action::HidePhoto => match slideshow.current_photo() {
                Some(photo) => {
                    let id = photo.id.clone();
                    self.sink.emit(&CoreEvent::SetHidden {
                        photo_id: id,
                        hidden: true,
                    });
                    // Move off the hidden photo; the shell's next photo_set
                    // removes it from the sequence for good.
                    slideshow.next();
                    speaker.say("All right, I won't show that picture again.");
                }
                None => speaker.say("I don't see a picture to hide right now."),
            },
            Action::NightModeOn => {
                if slideshow.night_mode() {
                    speaker.say("Night mode is already on.");
                } else {
                    slideshow.set_night_mode(true);
                    speaker.say("Turning night mode on.");
                }
            }
            Action::NightModeOff => {
                if slideshow.night_mode() {
                    slideshow.set_night_mode(false);
                    speaker.say("Turning night mode off.");
                } else {
                    speaker.say("Night mode is already off.");
                }
            }
            Action::SpeedUp => {
                let next = slideshow.interval_secs().saturating_sub(self.speed_step);
                slideshow.set_interval_secs(next);
                speaker.say(&format!(
                    "Speeding up. Pictures will change every {} seconds.",
                    slideshow.interval_secs()
                ));
            }
            Action::SlowDown => {
                slideshow.set_interval_secs(slideshow.interval_secs() + self.speed_step);
                speaker.say(&format!(
                    "Slowing down. Pictures will change every {} seconds.",
                    slideshow.interval_secs()
                ));
            }
            Action::ToggleCaptions => {
                slideshow.toggle_captions();
                if slideshow.snapshot().captions {
                    speaker.say("Showing the picture names.");
                } else {
                    speaker.say("Hiding the picture names.");
                }
            }
            Action::Help => {
                speaker.say(HELP_TEXT);
            }
            Action::StopListening => {
                speaker.say("Going to sleep. Say the wake word when you need me.");
                return Followup::StopListening;
            }
            Action::AskQuestion => {
                self.open_response(transcript, speaker).await;
            }
            Action::EmergencyDetected => {
                // Never touches slideshow state.
                warn!(transcript, "Emergency routed to notifier");
                self.sink.emit(&CoreEvent::Emergency {
                    transcript: transcript.to_string(),
                });
                speaker.say("I heard you. I am calling for help right now.");
            }
        }
        Followup::None
    }

    /// Ask the assistant to describe the current photo.
    async fn describe_current(&self, slideshow: &SlideshowController, speaker: &mut Speaker) {
        let Some(photo) = slideshow.current_photo() else {
            speaker.say("I can't see a picture right now.");
            return;
        };

        let mut prompt = format!("Describe the photo called \"{}\"", photo.name);
        if !photo.tags.is_empty() {
            prompt.push_str(&format!(" (tagged: {})", photo.tags.join(", ")));
        }
        prompt.push_str(" for the person viewing it.");

        match self.assistant.respond(&prompt, photo.url.as_deref()).await {
            Ok(text) => speaker.say(&text),
            Err(e) => {
                warn!("Photo description failed: {}", e);
                speaker.say(ASSISTANT_FALLBACK);
            }
        }
    }

    /// Open-ended response for conversational commands.
    async fn open_response(&self, transcript: &str, speaker: &mut Speaker) {
        match self.assistant.respond(transcript, None).await {
            Ok(text) => speaker.say(&text),
            Err(e) => {
                warn!("Assistant response failed: {}", e);
                speaker.say(ASSISTANT_FALLBACK);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::bridge::CapturingSink;
    use crate::slideshow::{OrderMode, Photo, Transition, DEFAULT_INTERVAL_SECS};
    use std::future::Future;
    use std::pin::Pin;

    struct StubAssistant {
        reply: Option<String>,
    }

    impl AssistantClient for StubAssistant {
        fn respond<'a>(
            &'a self,
            _prompt: &'a str,
            _image_url: Option<&'a str>,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
            let reply = self.reply.clone();
            Box::pin(async move {
                reply.ok_or_else(|| anyhow::anyhow!("assistant unavailable"))
            })
        }
    }

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

    fn setup(
        reply: Option<&str>,
    ) -> (
        CommandDispatcher,
        Arc<CapturingSink>,
        SlideshowController,
        Speaker,
    ) {
        let sink = Arc::new(CapturingSink::new());
        let assistant = Arc::new(StubAssistant {
            reply: reply.map(|s| s.to_string()),
        });
        let dispatcher = CommandDispatcher::new(assistant, sink.clone());
        let mut slideshow =
            SlideshowController::new(OrderMode::Sequential, DEFAULT_INTERVAL_SECS, Transition::Fade);
        slideshow.set_photos(vec![photo("1", "a"), photo("2", "b"), photo("3", "c")]);
        let speaker = Speaker::new(sink.clone(), 1.0, 1.0, 1.0);
        (dispatcher, sink, slideshow, speaker)
    }

    fn spoken(events: &[CoreEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                CoreEvent::Speak { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_next_advances_and_acknowledges() {
        let (dispatcher, sink, mut slideshow, mut speaker) = setup(None);
        dispatcher
            .dispatch(Action::NextImage, "next picture", &mut slideshow, &mut speaker)
            .await;
        assert_eq!(slideshow.position(), 1);
        assert_eq!(spoken(&sink.take()), vec!["Here is the next picture."]);
    }

    #[tokio::test]
    async fn test_pause_when_already_paused_still_acknowledges() {
        let (dispatcher, sink, mut slideshow, mut speaker) = setup(None);
        assert!(!slideshow.is_playing());
        dispatcher
            .dispatch(Action::Pause, "pause", &mut slideshow, &mut speaker)
            .await;
        assert!(!slideshow.is_playing());
        assert_eq!(spoken(&sink.take()), vec!["The slideshow is already paused."]);
    }

    #[tokio::test]
    async fn test_emergency_never_touches_slideshow() {
        let (dispatcher, sink, mut slideshow, mut speaker) = setup(None);
        slideshow.go_to(1);
        slideshow.set_playing(true);
        let before = slideshow.snapshot();

        dispatcher
            .dispatch(
                Action::EmergencyDetected,
                "help me",
                &mut slideshow,
                &mut speaker,
            )
            .await;

        assert_eq!(slideshow.snapshot(), before);
        let events = sink.take();
        assert!(events
            .iter()
            .any(|e| matches!(e, CoreEvent::Emergency { transcript } if transcript == "help me")));
        assert!(!spoken(&events).is_empty());
    }

    #[tokio::test]
    async fn test_assistant_failure_speaks_fixed_fallback() {
        let (dispatcher, sink, mut slideshow, mut speaker) = setup(None);
        dispatcher
            .dispatch(
                Action::AskQuestion,
                "tell me about spain",
                &mut slideshow,
                &mut speaker,
            )
            .await;
        assert_eq!(spoken(&sink.take()), vec![ASSISTANT_FALLBACK]);
    }

    #[tokio::test]
    async fn test_describe_speaks_assistant_reply() {
        let (dispatcher, sink, mut slideshow, mut speaker) =
            setup(Some("A lovely garden in spring."));
        dispatcher
            .dispatch(
                Action::DescribePhoto,
                "describe this",
                &mut slideshow,
                &mut speaker,
            )
            .await;
        assert_eq!(spoken(&sink.take()), vec!["A lovely garden in spring."]);
    }

    #[tokio::test]
    async fn test_favorite_requests_mutation_outward() {
        let (dispatcher, sink, mut slideshow, mut speaker) = setup(None);
        dispatcher
            .dispatch(
                Action::AddFavorite,
                "i love this one",
                &mut slideshow,
                &mut speaker,
            )
            .await;
        let events = sink.take();
        assert!(events.iter().any(|e| matches!(
            e,
            CoreEvent::SetFavorite { photo_id, favorite: true } if photo_id == "1"
        )));
    }

    #[tokio::test]
    async fn test_hide_requests_mutation_and_advances() {
        let (dispatcher, sink, mut slideshow, mut speaker) = setup(None);
        dispatcher
            .dispatch(
                Action::HidePhoto,
                "hide this picture",
                &mut slideshow,
                &mut speaker,
            )
            .await;
        assert_eq!(slideshow.position(), 1);
        let events = sink.take();
        assert!(events.iter().any(|e| matches!(
            e,
            CoreEvent::SetHidden { photo_id, hidden: true } if photo_id == "1"
        )));
    }

    #[tokio::test]
    async fn test_stop_listening_returns_followup() {
        let (dispatcher, _sink, mut slideshow, mut speaker) = setup(None);
        let followup = dispatcher
            .dispatch(
                Action::StopListening,
                "stop listening",
                &mut slideshow,
                &mut speaker,
            )
            .await;
        assert_eq!(followup, Followup::StopListening);
    }

    #[tokio::test]
    async fn test_speed_commands_adjust_interval() {
        let (dispatcher, _sink, mut slideshow, mut speaker) = setup(None);
        let start = slideshow.interval_secs();
        dispatcher
            .dispatch(Action::SlowDown, "slower", &mut slideshow, &mut speaker)
            .await;
        assert_eq!(slideshow.interval_secs(), start + 2);
        dispatcher
            .dispatch(Action::SpeedUp, "faster", &mut slideshow, &mut speaker)
            .await;
        assert_eq!(slideshow.interval_secs(), start);
    }
}
