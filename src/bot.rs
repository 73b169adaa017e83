use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::backoff::Backoff;
use crate::command;
use crate::config::RetryConfig;
use crate::imgflip::{self, MemeService};
use crate::platform::{ChatPlatform, IncomingUpdate};

pub const ERROR_NOTICE: &str =
    "Sorry, an error was encountered. Details will be available in the logs file.";

/// What a single poll cycle ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No new updates; the cursor is unchanged.
    Idle,
    /// The latest update was handled and the cursor moved past it.
    Dispatched { update_id: i64 },
    /// The cycle failed; the cursor was reset and the chat notified.
    Failed,
}

/// Only the newest update in a batch is interpreted.
fn latest_update(updates: &[IncomingUpdate]) -> Option<&IncomingUpdate> {
    updates.iter().max_by_key(|update| update.id)
}

/// Single-threaded poll/dispatch loop. Owns the update cursor and the
/// output image path; nothing else touches either.
pub struct PollLoop<C, M> {
    chat: C,
    memes: M,
    image_path: PathBuf,
    cursor: Option<i64>,
    backoff: Backoff,
}

impl<C: ChatPlatform, M: MemeService> PollLoop<C, M> {
    pub fn new(chat: C, memes: M, image_path: PathBuf, retry: &RetryConfig) -> Self {
        Self {
            chat,
            memes,
            image_path,
            cursor: None,
            backoff: Backoff::from_config(retry),
        }
    }

    pub fn cursor(&self) -> Option<i64> {
        self.cursor
    }

    /// Poll forever. Failures are reported to the chat and followed by a
    /// backoff delay before the next fetch.
    pub async fn run(&mut self) {
        info!("Polling for updates...");
        loop {
            match self.tick().await {
                CycleOutcome::Idle => {}
                CycleOutcome::Dispatched { update_id } => {
                    debug!(
                        "Update {} handled, next offset {:?}",
                        update_id,
                        self.cursor()
                    );
                }
                CycleOutcome::Failed => {
                    let delay = self.backoff.next_delay();
                    if !delay.is_zero() {
                        debug!("Backing off for {:?}", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// One fetch/dispatch cycle, including error recovery.
    pub async fn tick(&mut self) -> CycleOutcome {
        match self.run_cycle().await {
            Ok(outcome) => {
                self.backoff.reset();
                outcome
            }
            Err(e) => {
                self.recover(&e).await;
                CycleOutcome::Failed
            }
        }
    }

    async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let updates = self.chat.fetch_updates(self.cursor).await?;

        let Some(latest) = latest_update(&updates) else {
            return Ok(CycleOutcome::Idle);
        };

        if updates.len() > 1 {
            debug!(
                "Skipping {} older update(s) in favour of update {}",
                updates.len() - 1,
                latest.id
            );
        }

        self.dispatch(latest).await?;

        self.cursor = Some(latest.id + 1);
        Ok(CycleOutcome::Dispatched {
            update_id: latest.id,
        })
    }

    async fn dispatch(&self, update: &IncomingUpdate) -> Result<()> {
        let triggers = command::detect(&update.text);
        if !triggers.any() {
            debug!("Update {} has no command", update.id);
            return Ok(());
        }

        if triggers.meme_list {
            info!("Update {}: sending meme list", update.id);
            let templates = self.memes.list_templates().await?;
            self.chat
                .send_text(&imgflip::format_meme_list(&templates))
                .await?;
        }

        if triggers.make_meme {
            let request = command::parse_caption_request(&update.text).with_context(|| {
                format!("Failed to parse makememe command in update {}", update.id)
            })?;
            info!(
                "Update {}: making meme from template {}",
                update.id, request.template_id
            );

            let meme_url = self.memes.caption(&request).await?;
            self.memes.save_image(&meme_url, &self.image_path).await?;
            self.chat.send_image(&self.image_path).await?;
        }

        Ok(())
    }

    async fn recover(&mut self, err: &anyhow::Error) {
        self.cursor = None;
        error!("Poll cycle failed: {:#}", err);

        if let Err(notify_err) = self.chat.send_text(ERROR_NOTICE).await {
            error!("Unable to send error message to chat: {:#}", notify_err);
        }
    }
}
