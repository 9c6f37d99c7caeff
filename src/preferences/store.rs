//! Language preference access on top of a storage backend

use std::sync::Arc;

use tracing::{debug, warn};

use super::language::LanguageCode;
use super::storage::PreferenceStorage;
use crate::error::{ErrorKind, StorageError};

/// Storage key holding the selected spoken language
pub const LANGUAGE_KEY: &str = "preferred_language";

/// Reads and writes the user's spoken-language preference
#[derive(Clone)]
pub struct PreferenceStore {
    storage: Arc<dyn PreferenceStorage>,
}

impl PreferenceStore {
    pub fn new(storage: Arc<dyn PreferenceStorage>) -> Self {
        Self { storage }
    }

    /// The stored language, or the default when missing or unusable
    pub fn language(&self) -> LanguageCode {
        self.load_language().0
    }

    /// The stored language, plus an error when a stored value was unusable
    ///
    /// A missing preference is not an error.
    pub fn load_language(&self) -> (LanguageCode, Option<ErrorKind>) {
        match self.storage.get(LANGUAGE_KEY) {
            Ok(Some(raw)) => match LanguageCode::parse(&raw) {
                Ok(language) => (language, None),
                Err(e) => {
                    warn!(?e, raw, "malformed language preference, using default");
                    (LanguageCode::default(), Some(ErrorKind::PreferenceReadError))
                }
            },
            Ok(None) => (LanguageCode::default(), None),
            Err(e) => {
                warn!(?e, "preference read failed, using default language");
                (LanguageCode::default(), Some(ErrorKind::PreferenceReadError))
            }
        }
    }

    /// Persist a new language selection
    pub fn set_language(&self, language: &LanguageCode) -> Result<(), StorageError> {
        self.storage.set(LANGUAGE_KEY, language.as_str())
    }

    pub fn storage(&self) -> &Arc<dyn PreferenceStorage> {
        &self.storage
    }

    /// Decode a raw stored value, falling back silently on malformed input
    pub fn decode(raw: &str) -> LanguageCode {
        LanguageCode::parse(raw).unwrap_or_else(|e| {
            debug!(?e, raw, "malformed language preference, using default");
            LanguageCode::default()
        })
    }
}
