use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, Update, UpdateKind};
use tracing::{debug, info};

use crate::config::TelegramConfig;
use crate::platform::{ChatPlatform, IncomingUpdate};

/// Telegram caps a message at 4096 characters; leave some headroom.
const MAX_MESSAGE_LEN: usize = 4000;

/// Slack on top of the long-poll timeout before the HTTP client gives up.
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 10;

fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

fn update_text(update: &Update) -> String {
    match &update.kind {
        UpdateKind::Message(msg) => msg.text().unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

pub struct TelegramChat {
    bot: Bot,
    chat_id: ChatId,
    poll_timeout_secs: u32,
}

/// The client must outlive a full long poll, or idle polls fail as timeouts.
fn request_timeout(poll_timeout_secs: u32) -> Duration {
    Duration::from_secs(u64::from(poll_timeout_secs) + REQUEST_TIMEOUT_MARGIN_SECS)
}

impl TelegramChat {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(request_timeout(config.poll_timeout_secs))
            .build()
            .context("Failed to build Telegram HTTP client")?;

        let mut bot = Bot::with_client(&config.bot_token, client);
        if let Some(api_url) = &config.api_url {
            let url = reqwest::Url::parse(api_url)
                .with_context(|| format!("Invalid telegram.api_url: {}", api_url))?;
            bot = bot.set_api_url(url);
        }

        Ok(Self {
            bot,
            chat_id: ChatId(config.chat_id),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }
}

#[async_trait]
impl ChatPlatform for TelegramChat {
    async fn fetch_updates(&self, offset: Option<i64>) -> Result<Vec<IncomingUpdate>> {
        let mut request = self.bot.get_updates().timeout(self.poll_timeout_secs);
        if let Some(offset) = offset {
            let offset = i32::try_from(offset)
                .with_context(|| format!("Update offset out of range: {}", offset))?;
            request = request.offset(offset);
        }

        let updates = request.await.context("Failed to fetch Telegram updates")?;
        if !updates.is_empty() {
            debug!("Received {} update(s) (offset {:?})", updates.len(), offset);
        }

        Ok(updates
            .iter()
            .map(|update| IncomingUpdate {
                id: i64::from(update.id.0),
                text: update_text(update),
            })
            .collect())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            self.bot
                .send_message(self.chat_id, chunk)
                .await
                .context("Failed to send text to Telegram")?;
        }
        info!("Text sent to chat {} successfully", self.chat_id.0);
        Ok(())
    }

    async fn send_image(&self, path: &Path) -> Result<()> {
        self.bot
            .send_photo(self.chat_id, InputFile::file(path.to_path_buf()))
            .await
            .with_context(|| format!("Failed to send image {} to Telegram", path.display()))?;
        info!("Image sent to chat {} successfully", self.chat_id.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const TOKEN: &str = "123456:TEST";

    fn chat_for(server: &mockito::ServerGuard) -> TelegramChat {
        TelegramChat::new(&TelegramConfig {
            bot_token: TOKEN.to_string(),
            chat_id: 42,
            api_url: Some(server.url()),
            poll_timeout_secs: 1,
        })
        .unwrap()
    }

    fn method_path(method: &str) -> Matcher {
        Matcher::Regex(format!("(?i)^/bot{}/{}$", TOKEN, method))
    }

    const SENT_MESSAGE: &str = r#"{
        "ok": true,
        "result": {
            "message_id": 10,
            "date": 1700000000,
            "chat": {"id": 42, "type": "private", "first_name": "Ann"},
            "from": {"id": 999, "is_bot": true, "first_name": "MemeBot", "username": "memebot"},
            "text": "hello"
        }
    }"#;

    #[test]
    fn test_split_short_message() {
        assert_eq!(split_message("hello", 10), vec!["hello"]);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let chunks = split_message("aaaa\nbbbb\ncccc\n", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc\n"]);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "é".repeat(10);
        let chunks = split_message(&text, 5);
        assert!(chunks.iter().all(|c| c.len() <= 5));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_request_timeout_exceeds_poll_timeout() {
        assert_eq!(request_timeout(1), Duration::from_secs(11));
        assert!(request_timeout(50) > Duration::from_secs(50));
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        let result = TelegramChat::new(&TelegramConfig {
            bot_token: TOKEN.to_string(),
            chat_id: 42,
            api_url: Some("not a url".to_string()),
            poll_timeout_secs: 1,
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_updates_sends_offset_and_reads_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", method_path("getUpdates"))
            .match_body(Matcher::PartialJsonString(
                r#"{"offset": 7, "timeout": 1}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ok": true, "result": [{
                    "update_id": 7,
                    "message": {
                        "message_id": 3,
                        "date": 1700000000,
                        "chat": {"id": 42, "type": "private", "first_name": "Ann"},
                        "from": {"id": 42, "is_bot": false, "first_name": "Ann"},
                        "text": "memelist please"
                    }
                }]}"#,
            )
            .create_async()
            .await;

        let updates = chat_for(&server).fetch_updates(Some(7)).await.unwrap();
        mock.assert_async().await;
        assert_eq!(
            updates,
            vec![IncomingUpdate {
                id: 7,
                text: "memelist please".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_fetch_updates_without_offset() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", method_path("getUpdates"))
            .match_body(Matcher::JsonString(r#"{"timeout": 1}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok": true, "result": []}"#)
            .create_async()
            .await;

        let updates = chat_for(&server).fetch_updates(None).await.unwrap();
        mock.assert_async().await;
        assert!(updates.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_updates_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", method_path("getUpdates"))
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#)
            .create_async()
            .await;

        assert!(chat_for(&server).fetch_updates(None).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_updates_rejects_huge_offset() {
        let server = mockito::Server::new_async().await;
        let result = chat_for(&server).fetch_updates(Some(i64::MAX)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_send_text_targets_configured_chat() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", method_path("sendMessage"))
            .match_body(Matcher::PartialJsonString(
                r#"{"chat_id": 42, "text": "hello"}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SENT_MESSAGE)
            .create_async()
            .await;

        chat_for(&server).send_text("hello").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_text_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", method_path("sendMessage"))
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#,
            )
            .create_async()
            .await;

        assert!(chat_for(&server).send_text("hello").await.is_err());
    }

    #[tokio::test]
    async fn test_send_image_uploads_photo() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", method_path("sendPhoto"))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="chat_id""#.to_string()),
                Matcher::Regex(r#"name="photo""#.to_string()),
                Matcher::Regex("fake jpeg bytes".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SENT_MESSAGE)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited_meme.jpg");
        std::fs::write(&path, "fake jpeg bytes").unwrap();

        chat_for(&server).send_image(&path).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_image_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", method_path("sendPhoto"))
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ok": false, "error_code": 400, "description": "Bad Request: IMAGE_PROCESS_FAILED"}"#,
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited_meme.jpg");
        std::fs::write(&path, "not an image").unwrap();

        assert!(chat_for(&server).send_image(&path).await.is_err());
    }
}
