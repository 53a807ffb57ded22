//! Command phrase table and symbolic actions.
//!
//! Maps free-text transcripts to symbolic actions by substring containment.
//! The table is ordered: the first entry with any matching phrase wins, so
//! more specific phrases must come before shorter ones they contain.

use serde::{Deserialize, Serialize};

/// Symbolic commands produced by phrase matching.
///
/// Serialized in SCREAMING_SNAKE_CASE for the shell (e.g. `NEXT_IMAGE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    NextImage,
    PreviousImage,
    Pause,
    Resume,
    ShufflePhotos,
    RestartSlideshow,
    DescribePhoto,
    AddFavorite,
    HidePhoto,
    NightModeOn,
    NightModeOff,
    SpeedUp,
    SlowDown,
    ToggleCaptions,
    Help,
    StopListening,
    AskQuestion,
    /// Reserved: emitted by the emergency keyword check, never by the table.
    EmergencyDetected,
}

/// One row of the phrase table: a primary phrase, its alternatives, and the
/// action they resolve to. Loaded once at startup, never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEntry {
    pub action: Action,
    pub phrase: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl CommandEntry {
    fn new(action: Action, phrase: &str, aliases: &[&str]) -> Self {
        Self {
            action,
            phrase: phrase.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether any of this entry's phrases appears in the transcript.
    fn matches(&self, transcript: &str) -> bool {
        transcript.contains(self.phrase.as_str())
            || self.aliases.iter().any(|a| transcript.contains(a.as_str()))
    }
}

/// The ordered phrase table.
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    /// Build a table, normalizing every phrase to the matcher's expectations:
    /// lower-case and trimmed, the way transcripts arrive. Empty phrases
    /// would match everything via `contains` and are dropped.
    pub fn new(entries: Vec<CommandEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| CommandEntry {
                action: e.action,
                phrase: e.phrase.trim().to_lowercase(),
                aliases: e
                    .aliases
                    .into_iter()
                    .map(|a| a.trim().to_lowercase())
                    .filter(|a| !a.is_empty())
                    .collect(),
            })
            .filter(|e| !e.phrase.is_empty())
            .collect();
        Self { entries }
    }

    /// Match a lower-cased transcript against the table.
    ///
    /// First match by table order wins; there is no scoring beyond substring
    /// presence. A short phrase embedded in a longer, unrelated utterance
    /// will match ("play" inside "display"); known behavior, kept as-is.
    pub fn match_transcript(&self, transcript: &str) -> Option<&CommandEntry> {
        self.entries.iter().find(|e| e.matches(transcript))
    }

    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new(default_entries())
    }
}

/// Built-in phrase table. Phrases are lower-case; matching lower-cases the
/// transcript first.
fn default_entries() -> Vec<CommandEntry> {
    use Action::*;
    vec![
        CommandEntry::new(
            NextImage,
            "next picture",
            &["next photo", "next image", "skip this one", "go forward"],
        ),
        CommandEntry::new(
            PreviousImage,
            "previous picture",
            &["previous photo", "go back", "last picture", "show that again"],
        ),
        CommandEntry::new(
            StopListening,
            "stop listening",
            &["go to sleep", "goodbye sunny"],
        ),
        CommandEntry::new(Pause, "pause", &["stop the slideshow", "hold on", "wait a moment"]),
        CommandEntry::new(Resume, "play", &["resume", "keep going", "continue"]),
        CommandEntry::new(
            ShufflePhotos,
            "shuffle",
            &["mix them up", "random order", "surprise me"],
        ),
        CommandEntry::new(
            RestartSlideshow,
            "start over",
            &["from the beginning", "restart the slideshow"],
        ),
        CommandEntry::new(
            DescribePhoto,
            "describe this picture",
            &["describe this", "what is this", "tell me about this picture", "who is that"],
        ),
        CommandEntry::new(
            AddFavorite,
            "i love this one",
            &["i like this one", "mark as favorite", "favorite"],
        ),
        CommandEntry::new(
            HidePhoto,
            "hide this picture",
            &["hide this one", "don't show this again", "do not show this again"],
        ),
        CommandEntry::new(NightModeOn, "night mode", &["too bright", "make it darker"]),
        CommandEntry::new(NightModeOff, "day mode", &["make it brighter", "normal brightness"]),
        CommandEntry::new(SpeedUp, "faster", &["speed up", "too slow"]),
        CommandEntry::new(SlowDown, "slower", &["slow down", "too fast"]),
        CommandEntry::new(
            ToggleCaptions,
            "captions",
            &["show the names", "hide the names"],
        ),
        CommandEntry::new(Help, "help", &["what can i say", "what can you do"]),
        CommandEntry::new(
            AskQuestion,
            "i have a question",
            &["tell me", "can you tell me"],
        ),
    ]
}

/// Keywords that trigger the emergency path. Checked before everything else,
/// regardless of wake-word state.
pub fn default_emergency_keywords() -> Vec<String> {
    [
        "help me",
        "emergency",
        "call for help",
        "i've fallen",
        "i have fallen",
        "i fell down",
        "chest pain",
        "can't breathe",
        "cannot breathe",
        "call 911",
        "call an ambulance",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_primary_phrase_resolves_to_its_own_action() {
        let table = CommandTable::default();
        for entry in table.entries() {
            let matched = table
                .match_transcript(&entry.phrase)
                .unwrap_or_else(|| panic!("no match for {:?}", entry.phrase));
            assert_eq!(
                matched.action, entry.action,
                "phrase {:?} resolved to {:?}",
                entry.phrase, matched.action
            );
        }
    }

    #[test]
    fn test_first_match_by_table_order() {
        let table = CommandTable::new(vec![
            CommandEntry::new(Action::Pause, "stop", &[]),
            CommandEntry::new(Action::StopListening, "stop listening", &[]),
        ]);
        // Both entries match; the earlier one wins.
        let m = table.match_transcript("stop listening").unwrap();
        assert_eq!(m.action, Action::Pause);
    }

    #[test]
    fn test_substring_false_positive_is_kept() {
        // "play" embedded in an unrelated utterance still matches Resume.
        // Known false-positive source; the behavior is deliberate.
        let table = CommandTable::default();
        let m = table
            .match_transcript("i don't want to play along")
            .unwrap();
        assert_eq!(m.action, Action::Resume);
    }

    #[test]
    fn test_alias_matches() {
        let table = CommandTable::default();
        let m = table.match_transcript("could you mix them up please").unwrap();
        assert_eq!(m.action, Action::ShufflePhotos);
    }

    #[test]
    fn test_entries_normalized_on_construction() {
        // Override tables come from a hand-edited config file; casing and
        // whitespace must not defeat the lower-cased matcher.
        let table = CommandTable::new(vec![
            CommandEntry::new(Action::NextImage, "  Next Picture ", &["Skip It"]),
            CommandEntry::new(Action::Pause, "", &[]),
        ]);
        assert_eq!(table.entries().len(), 1); // empty phrase dropped
        let m = table.match_transcript("next picture please").unwrap();
        assert_eq!(m.action, Action::NextImage);
        let m = table.match_transcript("skip it").unwrap();
        assert_eq!(m.action, Action::NextImage);
        assert!(table.match_transcript("anything at all").is_none());
    }

    #[test]
    fn test_no_match_returns_none() {
        let table = CommandTable::default();
        assert!(table.match_transcript("the weather is nice today").is_none());
    }
}
