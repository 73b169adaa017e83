use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Longest getUpdates long poll accepted in configuration.
pub const MAX_POLL_TIMEOUT_SECS: u32 = 50;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub imgflip: ImgflipConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Destination chat for every reply, including error notices.
    pub chat_id: i64,
    /// Override for the Bot API host (e.g. a local Bot API server).
    #[serde(default)]
    pub api_url: Option<String>,
    /// Long-poll timeout passed to getUpdates.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImgflipConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_imgflip_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Fixed location of the last generated meme, overwritten on every request.
    #[serde(default = "default_image_path")]
    pub image_path: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            image_path: default_image_path(),
            log_file: default_log_file(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Delay after the first failed cycle. Zero (the default) retries immediately.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_poll_timeout_secs() -> u32 {
    1
}

fn default_imgflip_base_url() -> String {
    "https://api.imgflip.com".to_string()
}

fn default_image_path() -> PathBuf {
    PathBuf::from("edited_meme.jpg")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("memebot.log")
}

fn default_initial_backoff_ms() -> u64 {
    0
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("telegram.bot_token must not be empty");
        }
        if self.telegram.chat_id == 0 {
            anyhow::bail!("telegram.chat_id must be set");
        }
        if self.telegram.poll_timeout_secs > MAX_POLL_TIMEOUT_SECS {
            anyhow::bail!(
                "telegram.poll_timeout_secs ({}) must be at most {}",
                self.telegram.poll_timeout_secs,
                MAX_POLL_TIMEOUT_SECS
            );
        }
        if self.imgflip.username.trim().is_empty() || self.imgflip.password.is_empty() {
            anyhow::bail!("imgflip.username and imgflip.password must not be empty");
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            anyhow::bail!(
                "retry.max_backoff_ms ({}) is smaller than retry.initial_backoff_ms ({})",
                self.retry.max_backoff_ms,
                self.retry.initial_backoff_ms
            );
        }
        Ok(())
    }
}
