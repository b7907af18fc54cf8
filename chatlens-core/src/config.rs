//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/chatlens/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/chatlens/` (~/.config/chatlens/)
//! - State/Logs: `$XDG_STATE_HOME/chatlens/` (~/.local/state/chatlens/)
//!
//! Every field has a serde default so a missing file still yields a working
//! configuration (minus the log path, which the caller must supply somehow).

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Backing chat log location
    #[serde(default)]
    pub log: LogSourceConfig,

    /// Context selection limits
    #[serde(default)]
    pub context: ContextConfig,

    /// Statistics and keyword analysis configuration
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// External generator configuration
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the backing SQLite chat log lives
#[derive(Debug, Deserialize, Default, Clone)]
pub struct LogSourceConfig {
    /// Path to the SQLite file; the CLI also accepts this as a flag
    pub path: Option<PathBuf>,
}

/// Limits for the context selection modes
#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    /// Row window for the `recent` mode
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// Row window for the `all` mode
    #[serde(default = "default_all_limit")]
    pub all_limit: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
            all_limit: default_all_limit(),
        }
    }
}

fn default_recent_limit() -> usize {
    50
}

fn default_all_limit() -> usize {
    200
}

/// Keyword analysis configuration
///
/// The vocabulary is deliberately a fixed list of short
/// acknowledgment/affirmation tokens rather than general tokenization;
/// extending it is a configuration change, not a code change.
#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Words counted by the statistics engine
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// How many (word, count) pairs statistics carry
    #[serde(default = "default_top_keywords")]
    pub top_keywords: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            top_keywords: default_top_keywords(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    [
        "ok", "okay", "yes", "no", "thanks", "nice", "sure", "lol", "了解",
        "りょ", "はい", "うん", "ありがとう", "おはよう", "おやすみ",
        "お疲れ", "ごめん", "すごい", "草", "笑",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_top_keywords() -> usize {
    10
}

/// External generator (Gemini) configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    /// Model to use
    #[serde(default = "default_generator_model")]
    pub model: String,

    /// API endpoint (optional, defaults to the public Gemini API)
    pub endpoint: Option<String>,

    /// API key (can also use the GEMINI_API_KEY env var)
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,

    /// Upper bound on the transcript portion of the prompt, in characters
    #[serde(default = "default_max_transcript_chars")]
    pub max_transcript_chars: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: default_generator_model(),
            endpoint: None,
            api_key: None,
            timeout_secs: default_generator_timeout(),
            max_transcript_chars: default_max_transcript_chars(),
        }
    }
}

impl GeneratorConfig {
    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
    }

    /// True when the generator can be constructed at all.
    pub fn is_ready(&self) -> bool {
        self.resolve_api_key().is_some()
    }
}

fn default_generator_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_generator_timeout() -> u64 {
    30
}

fn default_max_transcript_chars() -> usize {
    16_000
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log directory override; defaults to the XDG state directory
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.context.recent_limit == 0 {
            return Err(Error::Config(
                "context.recent_limit must be at least 1".to_string(),
            ));
        }
        if self.context.all_limit == 0 {
            return Err(Error::Config(
                "context.all_limit must be at least 1".to_string(),
            ));
        }
        if self.analysis.top_keywords == 0 {
            return Err(Error::Config(
                "analysis.top_keywords must be at least 1".to_string(),
            ));
        }
        if self.generator.timeout_secs == 0 {
            return Err(Error::Config(
                "generator.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.generator.max_transcript_chars == 0 {
            return Err(Error::Config(
                "generator.max_transcript_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/chatlens/config.toml` (~/.config/chatlens/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("chatlens").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/chatlens/` (~/.local/state/chatlens/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("chatlens")
    }
}
