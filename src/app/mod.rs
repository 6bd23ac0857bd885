//! Wires settings, the store and the HTTP clients into runnable stages.

use crate::clients::{
    build_http_client, ChromeCapturer, OpenAiClient, PlacesClient, WebsiteClient, WordPressClient,
};
use crate::config::cli::LocalStorage;
use crate::config::Settings;
use crate::core::directory::DirectoryBuilder;
use crate::core::enrich::EnrichStage;
use crate::core::etl::EtlEngine;
use crate::core::publish::PublishStage;
use crate::core::scrape::ScrapeStage;
use crate::core::screenshot::ScreenshotStage;
use crate::core::{DirectoryStore, ScreenshotCapturer};
use crate::store::JsonStore;
use crate::utils::error::{DataError, Result};
use std::sync::Arc;
use std::time::Duration;

const API_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Services {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn DirectoryStore>,
    capturer: Arc<dyn ScreenshotCapturer>,
}

impl Services {
    /// Opens the JSON snapshot under `data_dir`.
    pub async fn open(settings: Settings) -> Result<Self> {
        let storage = LocalStorage::new(&settings.data_dir);
        let store = JsonStore::open(storage, settings.snapshot_file.clone()).await?;
        Ok(Self::with_store(settings, Arc::new(store)))
    }

    pub fn with_store(settings: Settings, store: Arc<dyn DirectoryStore>) -> Self {
        let capturer = Arc::new(ChromeCapturer::new(
            settings.screenshot.chrome_bin.clone(),
            settings.screenshot.window_width,
            settings.screenshot.window_height,
            Duration::from_millis(settings.screenshot.settle_ms),
        ));
        Self {
            settings: Arc::new(settings),
            store,
            capturer,
        }
    }

    pub fn with_capturer(mut self, capturer: Arc<dyn ScreenshotCapturer>) -> Self {
        self.capturer = capturer;
        self
    }

    pub fn scrape_stage(&self) -> Result<ScrapeStage> {
        let places = &self.settings.places;
        let api_key = places
            .api_key
            .clone()
            .ok_or_else(|| DataError::MissingConfigError {
                field: "GOOGLE_PLACES_API_KEY".to_string(),
            })?;

        let client = PlacesClient::new(
            build_http_client(API_TIMEOUT, None)?,
            places.base_url.clone(),
            api_key,
            places.search_radius_meters,
            self.settings.retry_policy(3),
        );
        Ok(ScrapeStage::new(self.store.clone(), client, places.keywords.clone())
            .with_request_delay(self.settings.request_delay())
            .with_rescrape_after_days(places.rescrape_after_days)
            .with_limit(self.settings.testing_limit))
    }

    pub fn enrich_stage(&self) -> Result<EnrichStage> {
        let enrich = &self.settings.enrich;
        let website = WebsiteClient::new(
            build_http_client(
                Duration::from_secs(enrich.request_timeout_secs),
                Some(enrich.user_agent.as_str()),
            )?,
            self.settings.retry_policy(3),
        );
        let openai = OpenAiClient::new(
            build_http_client(API_TIMEOUT, None)?,
            enrich.openai_base_url.clone(),
            enrich.openai_api_key.clone(),
            enrich.model.clone(),
            self.settings.retry_policy(2),
        );
        if enrich.openai_api_key.is_none() {
            tracing::warn!("⚠️  CHATGPT_API_KEY is not set, content generation will fail");
        }

        Ok(EnrichStage::new(self.store.clone(), website, openai)
            .with_batch_size(enrich.batch_size)
            .with_limit(self.settings.testing_limit))
    }

    pub fn screenshot_stage(&self) -> Result<ScreenshotStage> {
        let wordpress = WordPressClient::new(build_http_client(UPLOAD_TIMEOUT, None)?);
        Ok(ScreenshotStage::new(
            self.store.clone(),
            self.capturer.clone(),
            wordpress,
            self.settings.clone(),
        ))
    }

    pub fn publish_stage(&self) -> Result<PublishStage> {
        let wordpress = WordPressClient::new(build_http_client(UPLOAD_TIMEOUT, None)?);
        Ok(PublishStage::new(
            self.store.clone(),
            wordpress,
            self.settings.clone(),
        ))
    }

    /// Stages 1-4 in order.
    pub fn pipeline(&self, monitor: bool) -> Result<EtlEngine> {
        Ok(EtlEngine::new_with_monitoring(monitor)
            .with_stage(self.scrape_stage()?)
            .with_stage(self.enrich_stage()?)
            .with_stage(self.screenshot_stage()?)
            .with_stage(self.publish_stage()?))
    }

    pub fn directory_builder(&self) -> Result<DirectoryBuilder> {
        let directory = &self.settings.directory;
        let client = build_http_client(Duration::from_secs(directory.image_timeout_secs), None)?;
        Ok(
            DirectoryBuilder::new(&directory.input_dir, &directory.output_dir, client)
                .with_max_image_kb(directory.max_image_kb),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scrape_requires_places_key() {
        let store = crate::store::memory_store().await.unwrap();
        let services = Services::with_store(Settings::default(), Arc::new(store));

        let err = match services.scrape_stage() {
            Err(e) => e,
            Ok(_) => panic!("expected missing key error"),
        };
        assert!(matches!(err, DataError::MissingConfigError { .. }));
        assert!(services.pipeline(false).is_err());
    }

    #[tokio::test]
    async fn test_pipeline_stage_order() {
        let store = crate::store::memory_store().await.unwrap();
        let mut settings = Settings::default();
        settings.places.api_key = Some("k".to_string());
        let services = Services::with_store(settings, Arc::new(store));

        let engine = services.pipeline(false).unwrap();
        assert_eq!(
            engine.stage_names(),
            vec!["scrape", "enrich", "screenshot", "publish"]
        );
    }

    #[tokio::test]
    async fn test_open_uses_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.data_dir = dir.path().display().to_string();

        let services = Services::open(settings).await.unwrap();
        services
            .store
            .import_postcodes(vec![crate::domain::model::NewPostcode {
                postcode: "2000".to_string(),
                city: "Sydney".to_string(),
                region: "NSW".to_string(),
                country: "AU".to_string(),
                latitude: None,
                longitude: None,
            }])
            .await
            .unwrap();

        assert!(dir.path().join(crate::store::DEFAULT_SNAPSHOT_FILE).exists());
    }
}
