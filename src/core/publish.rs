use crate::clients::wordpress::{GeoDirectoryPlace, PLACES_PATH};
use crate::clients::WordPressClient;
use crate::config::Settings;
use crate::core::{DirectoryStore, Listing, Stage, StageReport, TaskStatus, TaskType};
use crate::domain::model::SubmissionStatus;
use crate::utils::error::Result;
use crate::utils::logger::log_progress;
use async_trait::async_trait;
use std::sync::Arc;

pub const CONFIG_NOT_FOUND: &str = "WordPress configuration not found";

/// Stage 4: creates GeoDirectory places for listings with finished copy.
pub struct PublishStage {
    store: Arc<dyn DirectoryStore>,
    wordpress: WordPressClient,
    settings: Arc<Settings>,
}

impl PublishStage {
    pub fn new(store: Arc<dyn DirectoryStore>, wordpress: WordPressClient, settings: Arc<Settings>) -> Self {
        Self {
            store,
            wordpress,
            settings,
        }
    }

    async fn process_listing(&self, mut listing: Listing) -> Result<bool> {
        let task_id = self
            .store
            .insert_task(
                TaskType::CreateWpPost,
                serde_json::json!({
                    "listing_id": listing.listing_id,
                    "country": listing.country_code,
                }),
            )
            .await?;
        self.store
            .update_task_status(task_id, TaskStatus::Processing, None)
            .await?;

        let Some(site) = self.settings.wordpress_site(&listing.country_code) else {
            self.store
                .update_task_status(task_id, TaskStatus::Failed, Some(CONFIG_NOT_FOUND.to_string()))
                .await?;
            tracing::warn!(
                "Failed to create WordPress post for listing {}",
                listing.listing_id
            );
            return Ok(false);
        };

        let submission_id = self
            .store
            .insert_submission(listing.listing_id, &site.endpoint(PLACES_PATH))
            .await?;

        let place = GeoDirectoryPlace::from(&listing);
        match self.wordpress.create_place(site, &place).await {
            Ok(created) => {
                listing.wp_post_id = Some(created.id);
                listing.updated_at = chrono::Utc::now();
                let listing_id = listing.listing_id;
                self.store.update_listing(listing).await?;
                self.store
                    .update_submission_status(
                        submission_id,
                        SubmissionStatus::Submitted,
                        Some(created.response),
                        None,
                    )
                    .await?;
                self.store
                    .update_task_status(task_id, TaskStatus::Completed, None)
                    .await?;
                tracing::info!(
                    "Created WordPress post {} for listing {}",
                    created.id,
                    listing_id
                );
                Ok(true)
            }
            Err(e) => {
                let message = format!("Error creating GeoDirectory post: {}", e);
                tracing::error!("{}", message);
                self.store
                    .update_submission_status(
                        submission_id,
                        SubmissionStatus::Failed,
                        None,
                        Some(e.to_string()),
                    )
                    .await?;
                self.store
                    .update_task_status(task_id, TaskStatus::Failed, Some(message))
                    .await?;
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl Stage for PublishStage {
    fn name(&self) -> &'static str {
        "publish"
    }

    async fn run(&self) -> Result<StageReport> {
        let mut limit = self.settings.publish.batch_size.max(1);
        if let Some(testing) = self.settings.testing_limit {
            limit = limit.min(testing);
        }

        let listings = self.store.listings_ready_to_publish(limit).await?;
        let total = listings.len();
        let mut report = StageReport::default();

        for (idx, listing) in listings.into_iter().enumerate() {
            log_progress(idx + 1, total, "Creating WordPress posts");
            let ok = self.process_listing(listing).await?;
            report.record(ok);
        }

        Ok(report)
    }
}
