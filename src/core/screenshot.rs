use crate::clients::WordPressClient;
use crate::config::Settings;
use crate::core::{DirectoryStore, Listing, ScreenshotCapturer, Stage, StageReport, TaskStatus, TaskType};
use crate::domain::model::ListingId;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub const CAPTURE_FAILED: &str = "Failed to capture screenshot";
pub const UPLOAD_FAILED: &str = "Failed to upload to media library";

/// `https://www.smith-jewellers.com.au/x` → `smith-jewellers-homepage.png`
pub fn screenshot_filename(url: &str) -> String {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string());
    let base = host
        .replace("www.", "")
        .split('.')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    format!("{}-homepage.png", base)
}

/// Stage 3: homepage screenshots uploaded to the country's media library.
pub struct ScreenshotStage {
    store: Arc<dyn DirectoryStore>,
    capturer: Arc<dyn ScreenshotCapturer>,
    wordpress: WordPressClient,
    settings: Arc<Settings>,
    output_dir: PathBuf,
    batch_size: usize,
}

impl ScreenshotStage {
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        capturer: Arc<dyn ScreenshotCapturer>,
        wordpress: WordPressClient,
        settings: Arc<Settings>,
    ) -> Self {
        let output_dir = PathBuf::from(&settings.screenshot.output_dir);
        let batch_size = settings.screenshot.batch_size.max(1);
        Self {
            store,
            capturer,
            wordpress,
            settings,
            output_dir,
            batch_size,
        }
    }

    async fn upload(&self, listing: &Listing, file: &std::path::Path) -> Option<String> {
        let site = self.settings.wordpress_site(&listing.country_code)?;
        match self.wordpress.upload_media(site, file).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::error!("Error uploading to WordPress: {}", e);
                None
            }
        }
    }

    async fn process_listing(&self, mut listing: Listing) -> Result<bool> {
        tracing::info!("📸 Processing screenshot for: {}", listing.website_url);

        let task_id = self
            .store
            .insert_task(
                TaskType::CaptureScreenshot,
                serde_json::json!({
                    "listing_id": listing.listing_id,
                    "website_url": listing.website_url,
                    "country": listing.country_code,
                }),
            )
            .await?;
        self.store
            .update_task_status(task_id, TaskStatus::Processing, None)
            .await?;

        let target = self.output_dir.join(screenshot_filename(&listing.website_url));
        let file = match self.capturer.capture(&listing.website_url, &target).await {
            Ok(file) => file,
            Err(e) => {
                tracing::error!("Error taking screenshot of {}: {}", listing.website_url, e);
                self.store
                    .update_task_status(task_id, TaskStatus::Failed, Some(CAPTURE_FAILED.to_string()))
                    .await?;
                return Ok(false);
            }
        };

        let media_url = self.upload(&listing, &file).await;

        // 上傳成功與否都清掉本地檔
        if let Err(e) = tokio::fs::remove_file(&file).await {
            tracing::warn!("Could not remove {}: {}", file.display(), e);
        }

        let Some(media_url) = media_url else {
            self.store
                .update_task_status(task_id, TaskStatus::Failed, Some(UPLOAD_FAILED.to_string()))
                .await?;
            return Ok(false);
        };

        listing.post_images = Some(media_url.clone());
        listing.updated_at = chrono::Utc::now();
        let listing_id = listing.listing_id;
        self.store.update_listing(listing).await?;
        self.store
            .update_task_status(task_id, TaskStatus::Completed, None)
            .await?;
        tracing::info!("Updated listing {} with screenshot: {}", listing_id, media_url);
        Ok(true)
    }
}

#[async_trait]
impl Stage for ScreenshotStage {
    fn name(&self) -> &'static str {
        "screenshot"
    }

    async fn run(&self) -> Result<StageReport> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let limit = self.settings.testing_limit;
        let mut report = StageReport::default();
        let mut failed: Vec<ListingId> = Vec::new();

        loop {
            let size = match limit {
                Some(limit) if report.processed >= limit => break,
                Some(limit) => (limit - report.processed).min(self.batch_size),
                None => self.batch_size,
            };

            let batch = self
                .store
                .listings_needing_screenshot(size, &failed)
                .await?;
            if batch.is_empty() {
                tracing::info!("No more listings need screenshots");
                break;
            }

            for listing in batch {
                let listing_id = listing.listing_id;
                let ok = self.process_listing(listing).await?;
                if !ok {
                    failed.push(listing_id);
                }
                report.record(ok);
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screenshot_filename() {
        assert_eq!(
            screenshot_filename("https://www.Smith-Jewellers.com.au/about"),
            "smith-jewellers-homepage.png"
        );
        assert_eq!(
            screenshot_filename("http://goldco.example:8080"),
            "goldco-homepage.png"
        );
    }
}
