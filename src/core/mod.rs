pub mod cluster;
pub mod directory;
pub mod enrich;
pub mod etl;
pub mod import;
pub mod publish;
pub mod scrape;
pub mod screenshot;

pub use crate::domain::model::{Listing, Postcode, StageReport, TaskStatus, TaskType};
pub use crate::domain::ports::{DirectoryStore, ScreenshotCapturer, Stage, Storage};
pub use crate::utils::error::Result;
