mod backoff;
mod bot;
mod command;
mod config;
mod download;
mod imgflip;
mod platform;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::PollLoop;
use crate::config::Config;
use crate::imgflip::ImgflipClient;
use crate::platform::telegram::TelegramChat;

/// Logs go to stdout and are appended to `log_file`.
fn init_logging(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file: {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,memebot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_logging(&config.output.log_file)?;

    info!("Configuration loaded from: {}", config_path.display());
    info!("  Chat: {}", config.telegram.chat_id);
    info!("  imgflip: {}", config.imgflip.base_url);
    info!("  Image path: {}", config.output.image_path.display());
    info!("  Log file: {}", config.output.log_file.display());

    let chat = TelegramChat::new(&config.telegram)?;
    let memes = ImgflipClient::new(config.imgflip.clone());
    let mut poll_loop = PollLoop::new(
        chat,
        memes,
        config.output.image_path.clone(),
        &config.retry,
    );

    info!("Bot is starting...");
    poll_loop.run().await;

    Ok(())
}
