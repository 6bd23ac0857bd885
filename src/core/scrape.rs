use crate::clients::PlacesClient;
use crate::core::{DirectoryStore, Postcode, Stage, StageReport, TaskStatus, TaskType};
use crate::domain::model::{PostcodeId, ScrapeStatus};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Stage 1: searches Google Places around every due cluster center.
pub struct ScrapeStage {
    store: Arc<dyn DirectoryStore>,
    places: PlacesClient,
    keywords: Vec<String>,
    request_delay: Duration,
    rescrape_after: chrono::Duration,
    limit: Option<usize>,
}

impl ScrapeStage {
    pub fn new(store: Arc<dyn DirectoryStore>, places: PlacesClient, keywords: Vec<String>) -> Self {
        Self {
            store,
            places,
            keywords,
            request_delay: Duration::from_secs(2),
            rescrape_after: chrono::Duration::days(7),
            limit: None,
        }
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_rescrape_after_days(mut self, days: i64) -> Self {
        self.rescrape_after = chrono::Duration::days(days);
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    async fn pause(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }

    /// Searches every keyword around the center. Keyword and place failures
    /// are logged and skipped; only store errors propagate.
    async fn search_cluster(&self, center: &Postcode, lat: f64, lng: f64) -> Result<usize> {
        let mut saved = 0;

        for keyword in &self.keywords {
            let results = match self.places.nearby_search(lat, lng, keyword).await {
                Ok(results) => results,
                Err(e) => {
                    tracing::error!("Error searching places with keyword {}: {}", keyword, e);
                    continue;
                }
            };
            tracing::debug!("'{}' returned {} places", keyword, results.len());

            for summary in results {
                match self.places.place_details(&summary.place_id).await {
                    Ok(Some(details)) => {
                        let record = details.into_place_record(Some(center.id));
                        self.store.upsert_place(record).await?;
                        saved += 1;
                    }
                    Ok(None) => {
                        tracing::warn!("No details returned for place {}", summary.name);
                    }
                    Err(e) => {
                        tracing::error!("Error processing place {}: {}", summary.name, e);
                    }
                }
                self.pause().await;
            }
        }

        Ok(saved)
    }

    async fn process_cluster(&self, center: &Postcode) -> Result<usize> {
        let Some((lat, lng)) = center.coordinates() else {
            return Ok(0);
        };

        tracing::info!(
            "📍 Processing cluster centered on {} ({}) covering {} postcodes",
            center.postcode,
            center.city,
            center.cluster_postcodes.len()
        );

        let task_id = self
            .store
            .insert_task(
                TaskType::ScrapeArea,
                serde_json::json!({
                    "center_postcode_id": center.id,
                    "postcode": center.postcode,
                    "locality": center.city,
                    "latitude": lat,
                    "longitude": lng,
                    "covered_postcodes": center.cluster_postcodes,
                }),
            )
            .await?;
        self.store
            .update_task_status(task_id, TaskStatus::Processing, None)
            .await?;

        match self.search_cluster(center, lat, lng).await {
            Ok(saved) => {
                self.store
                    .mark_scraped(
                        center.id,
                        &center.cluster_postcodes,
                        ScrapeStatus::Completed,
                        None,
                    )
                    .await?;
                self.store
                    .update_task_status(task_id, TaskStatus::Completed, None)
                    .await?;
                tracing::info!(
                    "Found {} places in cluster. Updated {} postcodes.",
                    saved,
                    center.cluster_postcodes.len()
                );
                Ok(saved)
            }
            Err(e) => {
                let message = format!("Error processing postcode {}: {}", center.id, e);
                tracing::error!("{}", message);
                self.store
                    .update_task_status(task_id, TaskStatus::Failed, Some(message.clone()))
                    .await?;
                self.store
                    .mark_scraped(
                        center.id,
                        &center.cluster_postcodes,
                        ScrapeStatus::Failed,
                        Some(message),
                    )
                    .await?;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Stage for ScrapeStage {
    fn name(&self) -> &'static str {
        "scrape"
    }

    async fn run(&self) -> Result<StageReport> {
        let cutoff = Utc::now() - self.rescrape_after;
        let mut report = StageReport::default();
        let mut places_saved = 0;
        let mut attempted: HashSet<PostcodeId> = HashSet::new();

        // 每輪重新查詢：前一個群集已涵蓋的中心會被跳過
        loop {
            if self.limit.is_some_and(|limit| report.processed >= limit) {
                break;
            }
            let Some(center) = self.store.clusters_due(cutoff, Some(1)).await?.pop() else {
                tracing::info!("No more areas to process");
                break;
            };
            if !attempted.insert(center.id) {
                tracing::error!(
                    "Cluster {} is still due after processing, stopping",
                    center.postcode
                );
                break;
            }

            match self.process_cluster(&center).await {
                Ok(saved) => {
                    places_saved += saved;
                    report.record(true);
                }
                Err(_) => report.record(false),
            }
            self.pause().await;
        }

        tracing::info!(
            "🔎 Scrape finished: {} clusters, {} places saved",
            report.processed,
            places_saved
        );
        Ok(report)
    }
}
