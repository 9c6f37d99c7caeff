//! Voice command table and matching
//!
//! Matching is a case-insensitive substring test over a fixed, ordered
//! table. The first entry whose phrase occurs in the transcript wins.

use serde::{Deserialize, Serialize};

/// What a command does when it fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandAction {
    /// Navigate to a route path
    Navigate { path: String },
}

/// A command phrase and its action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub phrase: String,
    pub action: CommandAction,
}

impl CommandEntry {
    pub fn navigate(phrase: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            action: CommandAction::Navigate { path: path.into() },
        }
    }

    /// Text spoken when the command fires
    pub fn confirmation(&self) -> String {
        format!("Navigating to {}", self.phrase)
    }
}

/// Ordered command table; declaration order breaks ties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTable {
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    pub fn new(entries: Vec<CommandEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }
}

impl Default for CommandTable {
    /// The application's page commands
    fn default() -> Self {
        Self::new(vec![
            CommandEntry::navigate("go home", "/"),
            CommandEntry::navigate("pdf to voice", "/pdf-to-voice"),
            CommandEntry::navigate("voice notes", "/voice-notes"),
            CommandEntry::navigate("video captioning", "/video-captioning"),
            CommandEntry::navigate("braille converter", "/braille-converter"),
            CommandEntry::navigate("image analysis", "/image-analysis"),
        ])
    }
}

/// Matches transcripts against a [`CommandTable`]
#[derive(Debug, Clone)]
pub struct CommandRouter {
    table: CommandTable,
    /// Lower-cased phrases, index-aligned with the table
    needles: Vec<String>,
}

impl CommandRouter {
    pub fn new(table: CommandTable) -> Self {
        let needles = table
            .entries()
            .iter()
            .map(|entry| entry.phrase.to_lowercase())
            .collect();
        Self { table, needles }
    }

    /// First entry whose phrase occurs in `transcript`, if any
    pub fn find(&self, transcript: &str) -> Option<&CommandEntry> {
        let haystack = transcript.to_lowercase();
        self.needles
            .iter()
            .position(|needle| haystack.contains(needle.as_str()))
            .map(|i| &self.table.entries()[i])
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_wins() {
        let router = CommandRouter::new(CommandTable::new(vec![
            CommandEntry::navigate("voice notes", "/a"),
            CommandEntry::navigate("notes", "/b"),
        ]));

        let entry = router.find("open my voice notes please").unwrap();
        assert_eq!(entry.action, CommandAction::Navigate { path: "/a".into() });
    }

    #[test]
    fn test_later_entry_when_earlier_absent() {
        let router = CommandRouter::new(CommandTable::new(vec![
            CommandEntry::navigate("voice notes", "/a"),
            CommandEntry::navigate("notes", "/b"),
        ]));

        let entry = router.find("show notes").unwrap();
        assert_eq!(entry.phrase, "notes");
    }

    #[test]
    fn test_case_insensitive() {
        let router = CommandRouter::new(CommandTable::default());
        let entry = router.find("Please GO HOME now").unwrap();
        assert_eq!(entry.action, CommandAction::Navigate { path: "/".into() });
    }

    #[test]
    fn test_substring_without_word_boundaries() {
        let table = CommandTable::new(vec![CommandEntry::navigate("note", "/n")]);
        let router = CommandRouter::new(table);
        assert!(router.find("keynotes").is_some());
    }

    #[test]
    fn test_no_match() {
        let router = CommandRouter::new(CommandTable::default());
        assert!(router.find("what is the weather").is_none());
        assert!(router.find("").is_none());
    }

    #[test]
    fn test_confirmation_text() {
        let entry = CommandEntry::navigate("image analysis", "/image-analysis");
        assert_eq!(entry.confirmation(), "Navigating to image analysis");
    }

    #[test]
    fn test_table_deserializes_from_json() {
        let json = r#"[{"phrase":"help","action":{"type":"navigate","path":"/help"}}]"#;
        let table: CommandTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.entries()[0], CommandEntry::navigate("help", "/help"));
    }
}
