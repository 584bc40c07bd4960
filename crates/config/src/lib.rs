//! Configuration loading, validation, and management for Parallax.
//!
//! Loads configuration from `~/.parallax/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! ```toml
//! [model]
//! provider = "openai"
//! name = "gpt-4o-mini"
//! temperature = 0.0
//!
//! [agent]
//! max_iterations = 5
//! handle_parsing_errors = true
//!
//! [tools.bocha]
//! count = 5
//!
//! [tools.qweather]
//! unit = "m"
//!
//! [tools.serper]
//! search_type = "news"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parallax/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model backend settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Which OpenAI-compatible endpoint to talk to.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// One of `openai`, `openrouter`, `ollama`, or `custom` (requires `base_url`)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Overrides the provider's default endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub name: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            api_key: None,
            name: default_model(),
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("name", &self.name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Plans allowed per run before giving up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Return the step trace alongside the answer
    #[serde(default)]
    pub return_intermediate_steps: bool,

    /// Feed unparsable model output back to the model instead of failing
    #[serde(default = "default_true")]
    pub handle_parsing_errors: bool,
}

fn default_max_iterations() -> usize {
    5
}
fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            return_intermediate_steps: false,
            handle_parsing_errors: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub bocha: BochaConfig,

    #[serde(default)]
    pub qweather: QWeatherConfig,

    #[serde(default)]
    pub serper: SerperConfig,
}

/// Bocha web search.
#[derive(Clone, Serialize, Deserialize)]
pub struct BochaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Falls back to `BOCHA_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Results per search, capped at 10
    #[serde(default = "default_result_count")]
    pub count: u32,
}

fn default_result_count() -> u32 {
    5
}

impl Default for BochaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            count: default_result_count(),
        }
    }
}

impl std::fmt::Debug for BochaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BochaConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &redact(&self.api_key))
            .field("count", &self.count)
            .finish()
    }
}

/// QWeather forecast and city lookup (both share one key).
#[derive(Clone, Serialize, Deserialize)]
pub struct QWeatherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Falls back to `QWEATHER_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// `m` (metric) or `i` (imperial)
    #[serde(default = "default_unit")]
    pub unit: String,

    /// Response language, e.g. `zh` or `en`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,

    /// Candidate cities per geo lookup, capped at 10
    #[serde(default = "default_result_count")]
    pub geo_number: u32,
}

fn default_unit() -> String {
    "m".into()
}

impl Default for QWeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            unit: default_unit(),
            lang: None,
            geo_number: default_result_count(),
        }
    }
}

impl std::fmt::Debug for QWeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QWeatherConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &redact(&self.api_key))
            .field("unit", &self.unit)
            .field("lang", &self.lang)
            .field("geo_number", &self.geo_number)
            .finish()
    }
}

/// Google search through serper.dev.
#[derive(Clone, Serialize, Deserialize)]
pub struct SerperConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Falls back to `GOOGLE_SERPER_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// `search`, `images` or `news`
    #[serde(default = "default_search_type")]
    pub search_type: String,
}

fn default_search_type() -> String {
    "search".into()
}

impl Default for SerperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            search_type: default_search_type(),
        }
    }
}

impl std::fmt::Debug for SerperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerperConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &redact(&self.api_key))
            .field("search_type", &self.search_type)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parallax/config.toml).
    ///
    /// Environment variables override the file:
    /// - `PARALLAX_API_KEY`, then `OPENAI_API_KEY` (model key, when unset)
    /// - `PARALLAX_MODEL`, `PARALLAX_BASE_URL`
    /// - `BOCHA_API_KEY`, `QWEATHER_API_KEY`, `GOOGLE_SERPER_API_KEY` (tool keys, when unset)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides, reading variables through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.model.api_key.is_none() {
            self.model.api_key = var("PARALLAX_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }
        if let Some(model) = var("PARALLAX_MODEL") {
            self.model.name = model;
        }
        if let Some(base_url) = var("PARALLAX_BASE_URL") {
            self.model.base_url = Some(base_url);
        }
        if self.tools.bocha.api_key.is_none() {
            self.tools.bocha.api_key = var("BOCHA_API_KEY");
        }
        if self.tools.qweather.api_key.is_none() {
            self.tools.qweather.api_key = var("QWEATHER_API_KEY");
        }
        if self.tools.serper.api_key.is_none() {
            self.tools.serper.api_key = var("GOOGLE_SERPER_API_KEY");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parallax")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        match self.model.provider.as_str() {
            "openai" | "openrouter" | "ollama" => {}
            "custom" if self.model.base_url.is_some() => {}
            "custom" => {
                return Err(ConfigError::ValidationError(
                    "model.provider \"custom\" requires model.base_url".into(),
                ));
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown model.provider \"{other}\" (expected openai, openrouter, ollama or custom)"
                )));
            }
        }

        if !matches!(self.tools.qweather.unit.as_str(), "m" | "i") {
            return Err(ConfigError::ValidationError(
                "tools.qweather.unit must be \"m\" or \"i\"".into(),
            ));
        }

        if !matches!(self.tools.serper.search_type.as_str(), "search" | "images" | "news") {
            return Err(ConfigError::ValidationError(
                "tools.serper.search_type must be \"search\", \"images\" or \"news\"".into(),
            ));
        }

        Ok(())
    }

    /// Check if a model API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
