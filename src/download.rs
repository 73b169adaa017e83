use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Streams `url` into `path`, truncating whatever was there before.
pub async fn save_to_file(client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download image: {}", url))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("Image download error ({}): {}", status, url);
    }

    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create image file: {}", path.display()))?;

    let mut written = 0usize;
    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read image body")?
    {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write image file: {}", path.display()))?;
        written += chunk.len();
    }
    file.flush().await?;

    info!(
        "New meme data retrieved successfully ({} bytes) to {}",
        written,
        path.display()
    );
    Ok(())
}
