//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/mikochat/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/mikochat/` (~/.config/mikochat/)
//! - Data: `$XDG_DATA_HOME/mikochat/` (~/.local/share/mikochat/)
//! - State/Logs: `$XDG_STATE_HOME/mikochat/` (~/.local/state/mikochat/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

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

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
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
    /// Chat completion capability (optional)
    #[serde(default)]
    pub completion: Option<LlmConfig>,

    /// Realtime-data capability (optional)
    #[serde(default)]
    pub realtime: Option<LlmConfig>,

    /// Image generation capability (optional)
    #[serde(default)]
    pub image: Option<ImageConfig>,

    /// Text-to-speech capability (optional)
    #[serde(default)]
    pub speech: Option<SpeechConfig>,

    /// Conversation behaviour
    #[serde(default)]
    pub chat: ChatConfig,

    /// Durable storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Completion provider configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider type
    pub provider: LlmProvider,
    /// Model to use
    pub model: String,
    /// API endpoint (optional, uses default for provider)
    pub endpoint: Option<String>,
    /// API key (can also use env var)
    pub api_key: Option<String>,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Supported completion providers
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Any OpenAI-compatible chat completions API
    OpenAI,
    Ollama,
}

impl LlmProvider {
    /// Returns the default endpoint for this provider
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "https://api.openai.com",
            LlmProvider::Ollama => "http://localhost:11434",
        }
    }
}

/// Image generation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ImageConfig {
    /// API endpoint (defaults to the OpenAI API)
    pub endpoint: Option<String>,
    /// Model to use
    #[serde(default = "default_image_model")]
    pub model: String,
    /// API key (can also use OPENAI_API_KEY)
    pub api_key: Option<String>,
    /// HTTP request timeout in seconds
    #[serde(default = "default_image_timeout_secs")]
    pub timeout_secs: u64,
}

/// Text-to-speech configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    /// API endpoint (defaults to ElevenLabs)
    pub endpoint: Option<String>,
    /// API key (can also use ELEVENLABS_API_KEY)
    pub api_key: Option<String>,
    /// Voice to synthesize with
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    /// Synthesis model
    #[serde(default = "default_speech_model")]
    pub model_id: String,
    #[serde(default = "default_stability")]
    pub stability: f32,
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Conversation behaviour
#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Name the assistant introduces itself with
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    /// Number of most recent messages sent with each completion request
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Whether thinking mode starts enabled
    #[serde(default)]
    pub thinking_mode: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            history_window: default_history_window(),
            thinking_mode: false,
        }
    }
}

/// Durable storage settings
#[derive(Debug, Deserialize, Default, Clone)]
pub struct StorageConfig {
    /// Maximum total bytes of stored values (unbounded when absent)
    pub max_bytes: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_image_timeout_secs() -> u64 {
    120
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}

fn default_speech_model() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_stability() -> f32 {
    0.5
}

fn default_similarity_boost() -> f32 {
    0.75
}

fn default_assistant_name() -> String {
    "Miko".to_string()
}

fn default_history_window() -> usize {
    crate::history::DEFAULT_WINDOW
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
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
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.chat.history_window == 0 {
            return Err(Error::Config(
                "chat.history_window must be at least 1".to_string(),
            ));
        }
        for (section, llm) in [("completion", &self.completion), ("realtime", &self.realtime)] {
            if let Some(llm) = llm {
                if llm.model.trim().is_empty() {
                    return Err(Error::Config(format!("{section}.model must not be empty")));
                }
            }
        }
        if let Some(speech) = &self.speech {
            if speech.voice_id.trim().is_empty() {
                return Err(Error::Config(
                    "speech.voice_id must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/mikochat/config.toml` (~/.config/mikochat/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("mikochat").join("config.toml")
    }

    /// Returns the data directory path (for the session store)
    ///
    /// `$XDG_DATA_HOME/mikochat/` (~/.local/share/mikochat/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("mikochat")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/mikochat/` (~/.local/state/mikochat/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("mikochat")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/mikochat/data.db` (~/.local/share/mikochat/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }
}
