use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::settings::{DEFAULT_MODEL, Genre};
use crate::store::DEFAULT_MAX_RECORDS;

/// Default Gemini REST endpoint
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Quiet period before the active page is saved to history
pub const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 2000;

/// Vision analyzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Fallback key, used when no credential is stored
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Keep successful results for identical image + settings
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: u64,
    /// Cache TTL in seconds (0 = no expiry)
    #[serde(default)]
    pub cache_ttl_seconds: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

const fn default_retry_count() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_timeout_seconds() -> u64 {
    120
}

const fn default_true() -> bool {
    true
}

const fn default_cache_max_entries() -> u64 {
    200
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_seconds: default_timeout_seconds(),
            cache_enabled: true,
            cache_max_entries: default_cache_max_entries(),
            cache_ttl_seconds: 0,
        }
    }
}

/// Durable store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store directory (defaults to ~/.local/share/manhua-editor)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Keep everything in memory; nothing survives the process
    #[serde(default)]
    pub in_memory: bool,
}

/// Auto-save configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveConfig {
    #[serde(default = "default_autosave_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

const fn default_autosave_delay_ms() -> u64 {
    DEFAULT_AUTOSAVE_DELAY_MS
}

const fn default_max_records() -> usize {
    DEFAULT_MAX_RECORDS
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

/// Editing defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default)]
    pub default_genre: Genre,
    #[serde(default = "default_model")]
    pub model: String,
}

const fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            default_genre: Genre::default(),
            model: default_model(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub autosave: AutosaveConfig,

    #[serde(default)]
    pub editor: EditorConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations, then apply `MANHUA_*` environment overrides.
    ///
    /// Sources, later ones winning:
    /// `~/.config/manhua-editor/config.toml`, `./config.toml`, environment
    /// (`MANHUA_ANALYZER__API_BASE`, `MANHUA_AUTOSAVE__DELAY_MS`, ...).
    pub fn load() -> Self {
        match Self::load_layered() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    fn load_layered() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("manhua-editor").join("config.toml");
            tracing::debug!("Looking for config at {}", user_config.display());
            builder = builder.add_source(config::File::from(user_config).required(false));
        }

        builder = builder
            .add_source(config::File::from(PathBuf::from("config.toml")).required(false))
            .add_source(
                config::Environment::with_prefix("MANHUA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| Error::ConfigLoad(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the editor cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.analyzer.api_base.trim().is_empty() {
            return Err(Error::ConfigInvalid {
                field: "analyzer.api_base".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.editor.history_capacity == 0 {
            return Err(Error::ConfigInvalid {
                field: "editor.history_capacity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.autosave.max_records == 0 {
            return Err(Error::ConfigInvalid {
                field: "autosave.max_records".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
