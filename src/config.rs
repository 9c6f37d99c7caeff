//! Configuration loading and management

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use voicenav::engine::{EngineConfig, DEFAULT_EXCLUDED_ROUTE};
use voicenav::navigation::{CommandTable, PageMessageTable};

/// Host configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// JSON file backing the language preference
    pub preferences_path: PathBuf,

    /// Optional page message overrides
    pub pages_path: PathBuf,

    /// Route the host starts on
    pub initial_route: String,

    /// Route on which listening and unforced speech are suppressed
    pub excluded_route: String,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup("VOICENAV_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = lookup("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("voicenav")
            }
        };

        Ok(Self {
            preferences_path: data_dir.join("preferences.json"),
            pages_path: data_dir.join("pages.json"),
            data_dir,
            initial_route: lookup("VOICENAV_ROUTE").unwrap_or_else(|| "/".to_string()),
            excluded_route: lookup("VOICENAV_EXCLUDED_ROUTE")
                .unwrap_or_else(|| DEFAULT_EXCLUDED_ROUTE.to_string()),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;
        Ok(())
    }

    /// Build the engine configuration, reading page overrides if present
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let page_messages = if self.pages_path.exists() {
            let table = PageMessageTable::load(&self.pages_path)
                .with_context(|| format!("loading {}", self.pages_path.display()))?;
            info!(path = ?self.pages_path, "page messages loaded");
            table
        } else {
            debug!(path = ?self.pages_path, "no page message overrides, using built-in");
            PageMessageTable::builtin()
        };

        Ok(EngineConfig {
            excluded_route: self.excluded_route.clone(),
            initial_route: self.initial_route.clone(),
            commands: CommandTable::default(),
            page_messages,
        })
    }
}
