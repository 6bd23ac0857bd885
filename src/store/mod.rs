//! JSON snapshot backed implementation of [`DirectoryStore`].
//!
//! All tables live in memory behind one async `RwLock`. Every mutation
//! rewrites the snapshot through the [`Storage`] port, so a crash loses at
//! most the write in flight.

use crate::core::{DirectoryStore, Storage};
use crate::domain::model::{
    Listing, ListingId, NewPostcode, PlaceRecord, Postcode, PostcodeId, ScrapeStatus, Submission,
    SubmissionId, SubmissionStatus, Task, TaskId, TaskStatus, TaskType,
};
use crate::utils::error::{DataError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_SNAPSHOT_FILE: &str = "directory.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Sequences {
    postcode: i64,
    listing: i64,
    task: i64,
    submission: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    sequences: Sequences,
    #[serde(default)]
    postcodes: Vec<Postcode>,
    #[serde(default)]
    listings: Vec<Listing>,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    submissions: Vec<Submission>,
}

pub struct JsonStore<S: Storage> {
    storage: S,
    path: String,
    state: RwLock<Snapshot>,
}

impl<S: Storage> JsonStore<S> {
    /// Loads the snapshot at `path` or starts empty when it does not exist yet.
    pub async fn open(storage: S, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let snapshot = if storage.exists(&path).await {
            let bytes = storage.read_file(&path).await?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
            tracing::debug!(
                "Loaded snapshot {}: {} postcodes, {} listings, {} tasks",
                path,
                snapshot.postcodes.len(),
                snapshot.listings.len(),
                snapshot.tasks.len()
            );
            snapshot
        } else {
            tracing::info!("📂 No snapshot at {}, starting with an empty store", path);
            Snapshot::default()
        };

        Ok(Self {
            storage,
            path,
            state: RwLock::new(snapshot),
        })
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let data = serde_json::to_vec_pretty(snapshot)?;
        self.storage.write_file(&self.path, &data).await
    }

    /// Applies `change` to a copy of the tables and swaps it in only after
    /// the snapshot was written. A failed change or write leaves memory untouched.
    async fn mutate<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Snapshot) -> Result<T> + Send,
        T: Send,
    {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let value = change(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(value)
    }
}

#[async_trait]
impl<S: Storage> DirectoryStore for JsonStore<S> {
    async fn import_postcodes(&self, rows: Vec<NewPostcode>) -> Result<usize> {
        self.mutate(|state| {
            let now = Utc::now();
            let mut imported = 0;

            for row in rows {
                let key_postcode = row.postcode.trim().to_string();
                let key_country = row.country.trim().to_string();
                if let Some(existing) = state.postcodes.iter_mut().find(|p| {
                    p.postcode == key_postcode && p.country.eq_ignore_ascii_case(&key_country)
                }) {
                    existing.city = row.city;
                    existing.region = row.region;
                    existing.latitude = row.latitude;
                    existing.longitude = row.longitude;
                    existing.last_updated = now;
                } else {
                    let id = next_id(&mut state.sequences.postcode);
                    state.postcodes.push(Postcode {
                        id,
                        postcode: key_postcode,
                        city: row.city,
                        region: row.region,
                        country: key_country,
                        latitude: row.latitude,
                        longitude: row.longitude,
                        is_cluster_center: false,
                        cluster_id: None,
                        cluster_postcodes: Vec::new(),
                        last_scraped: None,
                        last_updated: now,
                        scrape_status: ScrapeStatus::Pending,
                        error_message: None,
                    });
                }
                imported += 1;
            }
            Ok(imported)
        })
        .await
    }

    async fn postcodes(&self) -> Result<Vec<Postcode>> {
        Ok(self.state.read().await.postcodes.clone())
    }

    async fn replace_postcodes(&self, postcodes: Vec<Postcode>) -> Result<()> {
        self.mutate(|state| {
            state.postcodes = postcodes;
            Ok(())
        })
        .await
    }

    async fn clusters_due(
        &self,
        scraped_before: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<Postcode>> {
        let state = self.state.read().await;
        let mut due: Vec<Postcode> = state
            .postcodes
            .iter()
            .filter(|p| p.is_cluster_center && p.coordinates().is_some())
            .filter(|p| p.last_scraped.map_or(true, |ts| ts < scraped_before))
            .cloned()
            .collect();

        // NULLS FIRST，再依時間由舊到新
        due.sort_by(|a, b| a.last_scraped.cmp(&b.last_scraped).then(a.id.cmp(&b.id)));
        if let Some(limit) = limit {
            due.truncate(limit);
        }
        Ok(due)
    }

    async fn mark_scraped(
        &self,
        center_id: PostcodeId,
        covered: &[PostcodeId],
        status: ScrapeStatus,
        error: Option<String>,
    ) -> Result<()> {
        self.mutate(|state| {
            let now = Utc::now();
            let mut found_center = false;

            for postcode in state.postcodes.iter_mut() {
                if postcode.id == center_id || covered.contains(&postcode.id) {
                    postcode.last_scraped = Some(now);
                    postcode.last_updated = now;
                }
                if postcode.id == center_id {
                    postcode.scrape_status = status;
                    postcode.error_message = error.clone();
                    found_center = true;
                }
            }

            if !found_center {
                return Err(DataError::not_found("postcode", center_id));
            }
            Ok(())
        })
        .await
    }

    async fn upsert_place(&self, place: PlaceRecord) -> Result<ListingId> {
        self.mutate(|state| {
            let now = Utc::now();

            if let Some(existing) = state
                .listings
                .iter_mut()
                .find(|l| l.google_place_id == place.google_place_id)
            {
                existing.name = place.name.clone();
                existing.address = place.address;
                existing.latitude = place.latitude;
                existing.longitude = place.longitude;
                existing.website_url = place.website_url;
                existing.phone = place.phone;
                existing.post_title = place.name;
                existing.street = place.street;
                existing.city = place.city;
                existing.region = place.region;
                existing.country = place.country;
                existing.country_code = place.country_code;
                existing.zip = place.zip;
                existing.post_category = place.post_category;
                existing.default_category = place.default_category;
                existing.updated_at = now;
                return Ok(existing.listing_id);
            }

            let listing_id = next_id(&mut state.sequences.listing);
            state.listings.push(Listing {
                listing_id,
                google_place_id: place.google_place_id,
                post_title: place.name.clone(),
                name: place.name,
                address: place.address,
                post_content: None,
                post_status: None,
                post_type: "gd_place".to_string(),
                post_category: place.post_category,
                default_category: place.default_category,
                street: place.street,
                city: place.city,
                region: place.region,
                country: place.country,
                country_code: place.country_code,
                zip: place.zip,
                latitude: place.latitude,
                longitude: place.longitude,
                phone: place.phone,
                email: None,
                facebook: None,
                instagram: None,
                business_hours: None,
                website_url: place.website_url,
                about_page_text: None,
                blurb: None,
                what_makes_us_different: None,
                post_images: None,
                postcode_id: place.postcode_id,
                wp_post_id: None,
                created_at: now,
                updated_at: now,
            });
            Ok(listing_id)
        })
        .await
    }

    async fn listing(&self, id: ListingId) -> Result<Listing> {
        self.state
            .read()
            .await
            .listings
            .iter()
            .find(|l| l.listing_id == id)
            .cloned()
            .ok_or_else(|| DataError::not_found("listing", id))
    }

    async fn listings(&self) -> Result<Vec<Listing>> {
        Ok(self.state.read().await.listings.clone())
    }

    async fn update_listing(&self, mut listing: Listing) -> Result<()> {
        self.mutate(|state| {
            let slot = state
                .listings
                .iter_mut()
                .find(|l| l.listing_id == listing.listing_id)
                .ok_or_else(|| DataError::not_found("listing", listing.listing_id))?;
            listing.updated_at = Utc::now();
            *slot = listing;
            Ok(())
        })
        .await
    }

    async fn listings_needing_enrichment(
        &self,
        limit: usize,
        exclude: &[ListingId],
    ) -> Result<Vec<Listing>> {
        let state = self.state.read().await;
        Ok(state
            .listings
            .iter()
            .filter(|l| l.needs_enrichment() && !exclude.contains(&l.listing_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn listings_needing_screenshot(
        &self,
        limit: usize,
        exclude: &[ListingId],
    ) -> Result<Vec<Listing>> {
        let state = self.state.read().await;
        Ok(state
            .listings
            .iter()
            .filter(|l| l.needs_screenshot() && !exclude.contains(&l.listing_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn listings_ready_to_publish(&self, limit: usize) -> Result<Vec<Listing>> {
        let state = self.state.read().await;
        Ok(state
            .listings
            .iter()
            .filter(|l| l.ready_to_publish())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_task(&self, task_type: TaskType, payload: serde_json::Value) -> Result<TaskId> {
        let task_id = self
            .mutate(|state| {
                let task_id = next_id(&mut state.sequences.task);
                state.tasks.push(Task::new(task_id, task_type, payload));
                Ok(task_id)
            })
            .await?;
        tracing::debug!("Queued {} task {}", task_type, task_id);
        Ok(task_id)
    }

    async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<()> {
        self.mutate(|state| {
            let task = state
                .tasks
                .iter_mut()
                .find(|t| t.task_id == id)
                .ok_or_else(|| DataError::not_found("task", id))?;
            task.transition(status, error);
            Ok(())
        })
        .await
    }

    async fn task(&self, id: TaskId) -> Result<Task> {
        self.state
            .read()
            .await
            .tasks
            .iter()
            .find(|t| t.task_id == id)
            .cloned()
            .ok_or_else(|| DataError::not_found("task", id))
    }

    async fn tasks(&self) -> Result<Vec<Task>> {
        Ok(self.state.read().await.tasks.clone())
    }

    async fn insert_submission(
        &self,
        listing_id: ListingId,
        submission_url: &str,
    ) -> Result<SubmissionId> {
        self.mutate(|state| {
            let submission_id = next_id(&mut state.sequences.submission);
            let now = Utc::now();
            state.submissions.push(Submission {
                submission_id,
                listing_id,
                submission_url: submission_url.to_string(),
                api_response: None,
                submission_status: SubmissionStatus::Pending,
                attempts: 0,
                submitted_at: now,
                updated_at: now,
                error_message: None,
            });
            Ok(submission_id)
        })
        .await
    }

    async fn update_submission_status(
        &self,
        id: SubmissionId,
        status: SubmissionStatus,
        api_response: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<()> {
        self.mutate(|state| {
            let submission = state
                .submissions
                .iter_mut()
                .find(|s| s.submission_id == id)
                .ok_or_else(|| DataError::not_found("submission", id))?;
            submission.submission_status = status;
            submission.api_response = api_response;
            submission.error_message = error;
            submission.attempts += 1;
            submission.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    async fn submissions(&self) -> Result<Vec<Submission>> {
        Ok(self.state.read().await.submissions.clone())
    }
}

/// Keeps files in memory; used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().await.get(path).cloned()
    }
}

impl Storage for MemoryStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned().ok_or_else(|| {
            DataError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path),
            ))
        })
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.lock().await;
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        self.files.lock().await.contains_key(path)
    }
}

/// Convenience for tests and dry runs.
pub async fn memory_store() -> Result<JsonStore<MemoryStorage>> {
    JsonStore::open(MemoryStorage::new(), DEFAULT_SNAPSHOT_FILE).await
}
