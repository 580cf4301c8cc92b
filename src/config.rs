//! Configuration file parser for ~/.config/feedstate/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde and logged as likely typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{FilterMode, Settings};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// Every field has a default, so any subset of keys can be given.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. Defaults to `feeds.db` in the config directory.
    pub database_path: Option<PathBuf>,

    /// Include feeds marked hidden in listings and count loads.
    pub show_hidden_feeds: bool,

    /// Initial filter: "all", "unread" or "starred".
    pub default_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            show_hidden_feeds: false,
            default_filter: FilterMode::All.as_str().to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 3] = ["database_path", "show_hidden_feeds", "default_filter"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            filter = %config.default_filter,
            show_hidden = config.show_hidden_feeds,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parsed `default_filter`. Unrecognized values fall back to `all`.
    pub fn filter_mode(&self) -> FilterMode {
        FilterMode::parse_lenient(&self.default_filter)
    }

    /// Initial value for the settings atom.
    pub fn settings(&self) -> Settings {
        Settings {
            show_hidden_feeds: self.show_hidden_feeds,
        }
    }

    /// [`Config::settings`] with command-line flags applied. A flag can only
    /// switch an option on.
    pub fn settings_with_overrides(&self, show_hidden: bool) -> Settings {
        let mut settings = self.settings();
        if show_hidden {
            settings.show_hidden_feeds = true;
        }
        settings
    }
}

// ============================================================================
// Tests
// ============================================================================
