//! Preference module for the user's spoken-language selection
//!
//! The preference is read once when the engine starts, written on explicit
//! user change, and watched for changes made by other contexts.

mod language;
mod storage;
mod store;
mod watcher;

pub use language::{LanguageCode, DEFAULT_LANGUAGE, SUPPORTED_LANGUAGES};
pub use storage::{FileStorage, MemoryStorage, PreferenceChange, PreferenceStorage};
pub use store::{PreferenceStore, LANGUAGE_KEY};
pub use watcher::{PreferenceWatcher, POLL_INTERVAL};
