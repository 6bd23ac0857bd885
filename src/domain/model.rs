use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type PostcodeId = i64;
pub type ListingId = i64;
pub type TaskId = i64;
pub type SubmissionId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Postcode {
    pub id: PostcodeId,
    pub postcode: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_cluster_center: bool,
    pub cluster_id: Option<i64>,
    #[serde(default)]
    pub cluster_postcodes: Vec<PostcodeId>,
    pub last_scraped: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub scrape_status: ScrapeStatus,
    pub error_message: Option<String>,
}

impl Postcode {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Import row for a postcode, keyed by `(postcode, country)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPostcode {
    pub postcode: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A GeoDirectory place record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub listing_id: ListingId,
    pub google_place_id: String,
    pub name: String,
    pub address: String,
    pub post_title: String,
    pub post_content: Option<String>,
    pub post_status: Option<String>,
    pub post_type: String,
    pub post_category: Option<String>,
    pub default_category: Option<u32>,
    pub street: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub country_code: String,
    pub zip: String,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: String,
    pub email: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub business_hours: Option<String>,
    pub website_url: String,
    pub about_page_text: Option<String>,
    pub blurb: Option<String>,
    pub what_makes_us_different: Option<String>,
    pub post_images: Option<String>,
    pub postcode_id: Option<PostcodeId>,
    pub wp_post_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn has_website(&self) -> bool {
        !self.website_url.trim().is_empty()
    }

    pub fn needs_enrichment(&self) -> bool {
        self.has_website() && (self.post_content.is_none() || self.what_makes_us_different.is_none())
    }

    pub fn needs_screenshot(&self) -> bool {
        self.has_website() && self.post_images.is_none()
    }

    pub fn ready_to_publish(&self) -> bool {
        self.wp_post_id.is_none() && self.post_content.is_some()
    }

    /// Category ids parsed from the `",93,99,"` storage form.
    pub fn category_ids(&self) -> Vec<u32> {
        self.post_category
            .as_deref()
            .unwrap_or_default()
            .trim_matches(',')
            .split(',')
            .filter_map(|id| id.trim().parse().ok())
            .collect()
    }
}

/// Fields written when a Google place is saved. Upserted by `google_place_id`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceRecord {
    pub google_place_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub postcode_id: Option<PostcodeId>,
    pub website_url: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub country_code: String,
    pub zip: String,
    pub post_category: Option<String>,
    pub default_category: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ScrapeArea,
    ProcessWebsite,
    CaptureScreenshot,
    CreateWpPost,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ScrapeArea => "scrape_area",
            Self::ProcessWebsite => "process_website",
            Self::CaptureScreenshot => "capture_screenshot",
            Self::CreateWpPost => "create_wp_post",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub attempts: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(task_id: TaskId, task_type: TaskType, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            task_type,
            payload,
            status: TaskStatus::Queued,
            attempts: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn transition(&mut self, status: TaskStatus, error_message: Option<String>) {
        let now = Utc::now();
        if status == TaskStatus::Processing {
            self.attempts += 1;
            self.started_at = Some(now);
        }
        if status.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = status;
        self.error_message = error_message;
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Submitted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: SubmissionId,
    pub listing_id: ListingId,
    pub submission_url: String,
    pub api_response: Option<serde_json::Value>,
    pub submission_status: SubmissionStatus,
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

/// Outcome of one stage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StageReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl StageReport {
    pub fn record(&mut self, success: bool) {
        self.processed += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}
