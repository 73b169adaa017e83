use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ImgflipConfig;
use crate::download;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemeTemplate {
    pub id: String,
    pub name: String,
    pub box_count: u32,
}

/// A template id plus the box texts, in box order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRequest {
    pub template_id: String,
    pub texts: Vec<String>,
}

/// Everything the poll loop needs from the meme provider.
#[async_trait]
pub trait MemeService: Send + Sync {
    async fn list_templates(&self) -> Result<Vec<MemeTemplate>>;

    /// Returns the URL of the captioned image.
    async fn caption(&self, request: &CaptionRequest) -> Result<String>;

    async fn save_image(&self, url: &str, path: &Path) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    success: Option<bool>,
    data: Option<T>,
    #[serde(default)]
    error_message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_data(self, endpoint: &str) -> Result<T> {
        if self.success == Some(false) {
            anyhow::bail!(
                "imgflip {} failed: {}",
                endpoint,
                self.error_message.as_deref().unwrap_or("no error message")
            );
        }
        self.data
            .with_context(|| format!("imgflip {} response has no data", endpoint))
    }
}

#[derive(Debug, Deserialize)]
struct MemesData {
    memes: Vec<MemeTemplate>,
}

#[derive(Debug, Deserialize)]
struct CaptionData {
    url: String,
}

pub struct ImgflipClient {
    client: reqwest::Client,
    config: ImgflipConfig,
}

impl ImgflipClient {
    pub fn new(config: ImgflipConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), name)
    }

    fn caption_form(&self, request: &CaptionRequest) -> Vec<(String, String)> {
        let mut form = vec![
            ("username".to_string(), self.config.username.clone()),
            ("password".to_string(), self.config.password.clone()),
            ("template_id".to_string(), request.template_id.clone()),
        ];
        for (i, text) in request.texts.iter().enumerate() {
            form.push((format!("boxes[{}][text]", i), text.clone()));
        }
        form
    }
}

#[async_trait]
impl MemeService for ImgflipClient {
    async fn list_templates(&self) -> Result<Vec<MemeTemplate>> {
        let url = self.endpoint("get_memes");
        debug!("Fetching meme templates from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request to imgflip")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("imgflip get_memes error ({}): {}", status, error_body);
        }

        let body: ApiResponse<MemesData> = response
            .json()
            .await
            .context("Failed to parse imgflip get_memes response")?;
        let memes = body.into_data("get_memes")?.memes;

        info!("Meme list retrieved successfully ({} templates)", memes.len());
        Ok(memes)
    }

    async fn caption(&self, request: &CaptionRequest) -> Result<String> {
        let url = self.endpoint("caption_image");
        debug!(
            "Captioning template {} with {} box(es)",
            request.template_id,
            request.texts.len()
        );

        let response = self
            .client
            .post(&url)
            .form(&self.caption_form(request))
            .send()
            .await
            .context("Failed to send request to imgflip")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("imgflip caption_image error ({}): {}", status, error_body);
        }

        let body: ApiResponse<CaptionData> = response
            .json()
            .await
            .context("Failed to parse imgflip caption_image response")?;
        let meme_url = body.into_data("caption_image")?.url;

        info!(
            "Meme with text {:?} created successfully: {}",
            request.texts, meme_url
        );
        Ok(meme_url)
    }

    async fn save_image(&self, url: &str, path: &Path) -> Result<()> {
        download::save_to_file(&self.client, url, path).await
    }
}

/// One `name: id, box_count` line per template.
pub fn format_meme_list(templates: &[MemeTemplate]) -> String {
    let mut listing = String::new();
    for meme in templates {
        listing.push_str(&format!("{}: {}, {}\n", meme.name, meme.id, meme.box_count));
    }
    listing
}
