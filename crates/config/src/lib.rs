//! Configuration management for newsdesk
//!
//! Model selection, sampling, retry and audit settings, loaded from
//! `~/.newsdesk/config.json`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{audit_dir, config_path, data_dir, expand_home};

/// Environment variable that overrides the configured API key
pub const API_KEY_ENV: &str = "NEWSDESK_API_KEY";

/// Errors in configuration handling
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("DATA LINK ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("MALFORMED CONFIG: {0}")]
    Json(#[from] serde_json::Error),

    #[error("INVALID SETTING: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Inference provider access
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Model and loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_recursions")]
    pub max_recursions: u32,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            max_recursions: default_max_recursions(),
        }
    }
}

fn default_model() -> String {
    "anthropic/claude-3-haiku".to_string()
}

fn default_system_prompt() -> String {
    "You are an AWS news assistant. You help your users understand what new \
services and features that AWS is launching. Be sure to include dates when \
sharing news."
        .to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_top_p() -> f32 {
    0.999
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_max_recursions() -> u32 {
    50
}

/// Transport retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8000
}

fn default_multiplier() -> f64 {
    2.0
}

/// Audit trail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_dir")]
    pub dir: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dir: default_audit_dir(),
        }
    }
}

fn default_audit_dir() -> String {
    "~/.newsdesk/llm-logs".to_string()
}

/// News tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    #[serde(default = "default_news_api_base")]
    pub api_base: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_base: default_news_api_base(),
            page_size: default_page_size(),
            max_chars: default_max_chars(),
        }
    }
}

fn default_news_api_base() -> String {
    "https://api.aws-news.com".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_max_chars() -> usize {
    50000
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub agent: AgentDefaults,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub news: NewsConfig,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("Reading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("Writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Reject settings the provider would refuse or the loop cannot honour
    pub fn validate(&self) -> Result<()> {
        let agent = &self.agent;
        if agent.model.trim().is_empty() {
            return Err(ConfigError::Invalid("agent.model is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&agent.temperature) {
            return Err(ConfigError::Invalid(format!(
                "agent.temperature {} outside [0, 1]",
                agent.temperature
            )));
        }
        if !(0.0..=1.0).contains(&agent.top_p) {
            return Err(ConfigError::Invalid(format!(
                "agent.top_p {} outside [0, 1]",
                agent.top_p
            )));
        }
        if agent.max_tokens == 0 {
            return Err(ConfigError::Invalid("agent.max_tokens is 0".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts is 0".to_string()));
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.multiplier {} below 1",
                self.retry.multiplier
            )));
        }
        Ok(())
    }

    /// API key, with the environment taking precedence over the file
    pub fn api_key(&self) -> Option<String> {
        self.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    /// API key given an optional override
    pub fn resolve_api_key(&self, override_key: Option<String>) -> Option<String> {
        override_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| Some(self.provider.api_key.clone()).filter(|k| !k.is_empty()))
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn api_base(&self) -> Option<String> {
        self.provider
            .api_base
            .clone()
            .filter(|base| !base.trim().is_empty())
    }

    pub fn model(&self) -> String {
        self.agent.model.clone()
    }

    /// Audit directory with `~` expanded
    pub fn audit_dir(&self) -> PathBuf {
        expand_home(&self.audit.dir)
    }
}

/// Write a default config (unless one exists) and create the audit directory
pub async fn init() -> Result<Config> {
    init_at(&config_path()).await
}

/// [`init`] against an explicit config location
pub async fn init_at(path: &Path) -> Result<Config> {
    if path.exists() {
        warn!("Config already exists at {:?}", path);
    } else {
        Config::default().save_to(path).await?;
        info!("Config written to {:?}", path);
    }

    let config = Config::load_from(path).await?;
    let audit = config.audit_dir();
    paths::ensure_dir(&audit).await?;
    info!("Audit trail ready at {:?}", audit);

    Ok(config)
}
