use crate::domain::model::{
    Listing, ListingId, NewPostcode, PlaceRecord, Postcode, PostcodeId, ScrapeStatus, StageReport,
    Submission, SubmissionId, SubmissionStatus, Task, TaskId, TaskStatus, TaskType,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// Persistence for postcodes, listings and the task / submission audit tables.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn import_postcodes(&self, rows: Vec<NewPostcode>) -> Result<usize>;
    async fn postcodes(&self) -> Result<Vec<Postcode>>;
    /// Replaces every postcode row in one write.
    async fn replace_postcodes(&self, postcodes: Vec<Postcode>) -> Result<()>;
    /// Cluster centers never scraped or scraped before the cutoff, oldest first.
    async fn clusters_due(
        &self,
        scraped_before: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<Postcode>>;
    async fn mark_scraped(
        &self,
        center_id: PostcodeId,
        covered: &[PostcodeId],
        status: ScrapeStatus,
        error: Option<String>,
    ) -> Result<()>;

    async fn upsert_place(&self, place: PlaceRecord) -> Result<ListingId>;
    async fn listing(&self, id: ListingId) -> Result<Listing>;
    async fn listings(&self) -> Result<Vec<Listing>>;
    async fn update_listing(&self, listing: Listing) -> Result<()>;
    async fn listings_needing_enrichment(
        &self,
        limit: usize,
        exclude: &[ListingId],
    ) -> Result<Vec<Listing>>;
    async fn listings_needing_screenshot(
        &self,
        limit: usize,
        exclude: &[ListingId],
    ) -> Result<Vec<Listing>>;
    async fn listings_ready_to_publish(&self, limit: usize) -> Result<Vec<Listing>>;

    async fn insert_task(&self, task_type: TaskType, payload: serde_json::Value) -> Result<TaskId>;
    async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<()>;
    async fn task(&self, id: TaskId) -> Result<Task>;
    async fn tasks(&self) -> Result<Vec<Task>>;

    async fn insert_submission(
        &self,
        listing_id: ListingId,
        submission_url: &str,
    ) -> Result<SubmissionId>;
    async fn update_submission_status(
        &self,
        id: SubmissionId,
        status: SubmissionStatus,
        api_response: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<()>;
    async fn submissions(&self) -> Result<Vec<Submission>>;
}

/// One step of the directory pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self) -> Result<StageReport>;
}

/// Renders a website to an image file.
#[async_trait]
pub trait ScreenshotCapturer: Send + Sync {
    async fn capture(&self, url: &str, output: &Path) -> Result<PathBuf>;
}
