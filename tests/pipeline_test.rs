use async_trait::async_trait;
use diamond_data::config::WordPressSite;
use diamond_data::core::cluster::generate_clusters;
use diamond_data::core::{DirectoryStore, ScreenshotCapturer, Stage};
use diamond_data::core::enrich::{GENERATION_FAILED, NO_CONTENT};
use diamond_data::core::screenshot::{CAPTURE_FAILED, UPLOAD_FAILED};
use diamond_data::domain::model::{
    NewPostcode, ScrapeStatus, SubmissionStatus, Task, TaskStatus, TaskType,
};
use diamond_data::store::memory_store;
use diamond_data::{DataError, Result, Services, Settings};
use httpmock::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Writes a placeholder image instead of launching a browser.
struct FakeCapturer;

#[async_trait]
impl ScreenshotCapturer for FakeCapturer {
    async fn capture(&self, _url: &str, output: &Path) -> Result<PathBuf> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, b"\x89PNG fake").await?;
        Ok(output.to_path_buf())
    }
}

/// Chrome that never manages to load the page.
struct BrokenCapturer;

#[async_trait]
impl ScreenshotCapturer for BrokenCapturer {
    async fn capture(&self, url: &str, _output: &Path) -> Result<PathBuf> {
        Err(DataError::ScreenshotError {
            message: format!("timed out loading {}", url),
        })
    }
}

fn test_settings(server: &MockServer, screenshots: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.retry.min_delay_secs = 0;
    settings.retry.max_delay_secs = 0;
    settings.places.base_url = server.url("/place");
    settings.places.api_key = Some("places-key".to_string());
    settings.places.keywords = vec!["jeweller".to_string()];
    settings.places.request_delay_ms = 0;
    settings.enrich.openai_base_url = server.url("/v1");
    settings.enrich.openai_api_key = Some("sk-test".to_string());
    settings.screenshot.output_dir = screenshots.path().display().to_string();
    settings
}

fn with_wordpress(mut settings: Settings, server: &MockServer) -> Settings {
    settings.wordpress.insert(
        "AU".to_string(),
        WordPressSite {
            username: "editor".to_string(),
            password: "secret".to_string(),
            site: server.base_url(),
        },
    );
    settings
}

async fn seeded_store() -> Arc<dyn DirectoryStore> {
    let store = memory_store().await.unwrap();
    store
        .import_postcodes(vec![NewPostcode {
            postcode: "2000".to_string(),
            city: "Sydney".to_string(),
            region: "NSW".to_string(),
            country: "AU".to_string(),
            latitude: Some(-33.8688),
            longitude: Some(151.2093),
        }])
        .await
        .unwrap();
    generate_clusters(&store, 5.0).await.unwrap();
    Arc::new(store)
}

fn mock_places(server: &MockServer, website: &str) {
    server.mock(|when, then| {
        when.method(GET)
            .path("/place/nearbysearch/json")
            .query_param("keyword", "jeweller")
            .query_param("radius", "5000");
        then.status(200).json_body(serde_json::json!({
            "status": "OK",
            "results": [{"place_id": "ChIJsmith", "name": "Smith Jewellers"}]
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/place/details/json")
            .query_param("place_id", "ChIJsmith");
        then.status(200).json_body(serde_json::json!({
            "status": "OK",
            "result": {
                "place_id": "ChIJsmith",
                "name": "Smith Jewellers",
                "formatted_address": "12 George St, Sydney NSW 2000, Australia",
                "geometry": {"location": {"lat": -33.8690, "lng": 151.2090}},
                "website": website,
                "formatted_phone_number": "(02) 9000 0000",
                "types": ["jewelry_store", "store"],
                "address_components": [
                    {"long_name": "12", "short_name": "12", "types": ["street_number"]},
                    {"long_name": "George Street", "short_name": "George St", "types": ["route"]},
                    {"long_name": "Sydney", "short_name": "Sydney", "types": ["locality"]},
                    {"long_name": "New South Wales", "short_name": "NSW", "types": ["administrative_area_level_1"]},
                    {"long_name": "Australia", "short_name": "AU", "types": ["country"]},
                    {"long_name": "2000", "short_name": "2000", "types": ["postal_code"]}
                ]
            }
        }));
    });
}

fn mock_website_and_openai(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/shop");
        then.status(200).body(
            r#"<html><nav><a href="/">Home</a><a href="/about">About Us</a></nav>
               <main><p>Buy rings</p></main></html>"#,
        );
    });
    server.mock(|when, then| {
        when.method(GET).path("/about");
        then.status(200).body(
            r#"<html><main><h1>Our story</h1><p>Family jewellers since 1952, hand making rings in Sydney.</p>
               <script>track()</script></main></html>"#,
        );
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("100-word description")
            .body_contains("Family jewellers since 1952");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"content": "Smith Jewellers has crafted rings since 1952."}}]
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("what makes this jeweler unique");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"content": "Every ring is made by hand on site."}}]
        }));
    });
}

#[tokio::test]
async fn test_full_pipeline_publishes_listing() {
    let server = MockServer::start();
    let screenshots = TempDir::new().unwrap();
    mock_places(&server, &server.url("/shop"));
    mock_website_and_openai(&server);

    let media = server.mock(|when, then| {
        when.method(POST)
            .path("/wp-json/wp/v2/media")
            .header_exists("content-disposition");
        then.status(201).json_body(serde_json::json!({
            "id": 77,
            "source_url": "https://cdn.example.com/127-homepage.png"
        }));
    });
    let places = server.mock(|when, then| {
        when.method(POST)
            .path("/wp-json/geodir/v2/places")
            .json_body_partial(
                r#"{
                    "title": "Smith Jewellers",
                    "content": "Smith Jewellers has crafted rings since 1952.",
                    "status": "publish",
                    "default_category": 99,
                    "post_category": [99],
                    "street": "12 George Street",
                    "featured_media": "https://cdn.example.com/127-homepage.png"
                }"#,
            );
        then.status(201).json_body(serde_json::json!({"id": 501}));
    });

    let store = seeded_store().await;
    let settings = with_wordpress(test_settings(&server, &screenshots), &server);
    let services =
        Services::with_store(settings, store.clone()).with_capturer(Arc::new(FakeCapturer));

    let reports = services.pipeline(false).unwrap().run().await.unwrap();
    let names: Vec<&str> = reports.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["scrape", "enrich", "screenshot", "publish"]);
    assert!(reports.iter().all(|(_, r)| r.failed == 0 && r.succeeded == 1));

    media.assert();
    places.assert();

    let listing = store.listing(1).await.unwrap();
    assert_eq!(listing.wp_post_id, Some(501));
    assert_eq!(listing.country_code, "AU");
    assert_eq!(
        listing.about_page_text.as_deref(),
        Some("Smith Jewellers has crafted rings since 1952.\n\nWhat Makes Us Different:\nEvery ring is made by hand on site.")
    );
    assert_eq!(listing.blurb, listing.post_content);

    let tasks = store.tasks().await.unwrap();
    let types: Vec<TaskType> = tasks.iter().map(|t| t.task_type).collect();
    assert_eq!(
        types,
        vec![
            TaskType::ScrapeArea,
            TaskType::ProcessWebsite,
            TaskType::CaptureScreenshot,
            TaskType::CreateWpPost
        ]
    );
    assert!(tasks
        .iter()
        .all(|t| t.status == TaskStatus::Completed && t.attempts == 1 && t.completed_at.is_some()));

    let submissions = store.submissions().await.unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].submission_status, SubmissionStatus::Submitted);
    assert_eq!(submissions[0].api_response, Some(serde_json::json!({"id": 501})));

    // 本地截圖上傳後應刪除
    let mut entries = tokio::fs::read_dir(screenshots.path()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());

    let postcodes = store.postcodes().await.unwrap();
    assert!(postcodes[0].last_scraped.is_some());
    assert_eq!(postcodes[0].scrape_status, ScrapeStatus::Completed);
}

#[tokio::test]
async fn test_unreachable_website_fails_task_once() {
    let server = MockServer::start();
    let screenshots = TempDir::new().unwrap();
    mock_places(&server, &server.url("/broken"));
    let broken = server.mock(|when, then| {
        when.method(GET).path("/broken");
        then.status(503);
    });

    let store = seeded_store().await;
    let services = Services::with_store(test_settings(&server, &screenshots), store.clone());

    services.scrape_stage().unwrap().run().await.unwrap();
    let report = services.enrich_stage().unwrap().run().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    // 3 次嘗試後放棄，同一輪不再重排
    broken.assert_hits(3);

    let tasks = store.tasks().await.unwrap();
    let enrich_task = tasks
        .iter()
        .find(|t| t.task_type == TaskType::ProcessWebsite)
        .unwrap();
    assert_eq!(enrich_task.status, TaskStatus::Failed);
    assert_eq!(
        enrich_task.error_message.as_deref(),
        Some("Failed to fetch website content")
    );
    assert!(store.listing(1).await.unwrap().post_content.is_none());
}

#[tokio::test]
async fn test_publish_without_wordpress_config() {
    let server = MockServer::start();
    let screenshots = TempDir::new().unwrap();
    mock_places(&server, &server.url("/shop"));

    let store = seeded_store().await;
    let services = Services::with_store(test_settings(&server, &screenshots), store.clone());
    services.scrape_stage().unwrap().run().await.unwrap();

    let mut listing = store.listing(1).await.unwrap();
    listing.post_content = Some("Fine jewellery.".to_string());
    store.update_listing(listing).await.unwrap();

    let report = services.publish_stage().unwrap().run().await.unwrap();
    assert_eq!(report.failed, 1);

    let task = store
        .tasks()
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.task_type == TaskType::CreateWpPost)
        .unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(
        task.error_message.as_deref(),
        Some("WordPress configuration not found")
    );
    assert!(store.submissions().await.unwrap().is_empty());
    assert!(store.listing(1).await.unwrap().wp_post_id.is_none());
}

#[tokio::test]
async fn test_publish_rejected_by_wordpress() {
    let server = MockServer::start();
    let screenshots = TempDir::new().unwrap();
    mock_places(&server, &server.url("/shop"));
    server.mock(|when, then| {
        when.method(POST).path("/wp-json/geodir/v2/places");
        then.status(400).body(r#"{"code":"rest_invalid_param"}"#);
    });

    let store = seeded_store().await;
    let settings = with_wordpress(test_settings(&server, &screenshots), &server);
    let services = Services::with_store(settings, store.clone());
    services.scrape_stage().unwrap().run().await.unwrap();

    let mut listing = store.listing(1).await.unwrap();
    listing.post_content = Some("Fine jewellery.".to_string());
    store.update_listing(listing).await.unwrap();

    let report = services.publish_stage().unwrap().run().await.unwrap();
    assert_eq!(report.failed, 1);

    let submissions = store.submissions().await.unwrap();
    assert_eq!(submissions[0].submission_status, SubmissionStatus::Failed);
    assert_eq!(submissions[0].attempts, 1);
    assert!(submissions[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("rest_invalid_param"));

    let task = store
        .tasks()
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.task_type == TaskType::CreateWpPost)
        .unwrap();
    assert!(task
        .error_message
        .unwrap()
        .starts_with("Error creating GeoDirectory post:"));
}

async fn single_task(store: &Arc<dyn DirectoryStore>, task_type: TaskType) -> Task {
    let mut tasks: Vec<Task> = store
        .tasks()
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.task_type == task_type)
        .collect();
    assert_eq!(tasks.len(), 1);
    tasks.remove(0)
}

#[tokio::test]
async fn test_website_without_text_is_reported() {
    let server = MockServer::start();
    let screenshots = TempDir::new().unwrap();
    mock_places(&server, &server.url("/empty"));
    server.mock(|when, then| {
        when.method(GET).path("/empty");
        then.status(200)
            .body("<html><body><script>render()</script></body></html>");
    });
    let openai = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"content": "unused"}}]
        }));
    });

    let store = seeded_store().await;
    let services = Services::with_store(test_settings(&server, &screenshots), store.clone());
    services.scrape_stage().unwrap().run().await.unwrap();
    let report = services.enrich_stage().unwrap().run().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    openai.assert_hits(0);

    let task = single_task(&store, TaskType::ProcessWebsite).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some(NO_CONTENT));
    assert!(store.listing(1).await.unwrap().post_content.is_none());
}

#[tokio::test]
async fn test_rejected_completion_fails_generation() {
    let server = MockServer::start();
    let screenshots = TempDir::new().unwrap();
    mock_places(&server, &server.url("/shop"));
    server.mock(|when, then| {
        when.method(GET).path("/shop");
        then.status(200)
            .body("<html><main><p>Engagement rings made in Sydney.</p></main></html>");
    });
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(400)
            .json_body(serde_json::json!({"error": {"message": "invalid model"}}));
    });

    let store = seeded_store().await;
    let services = Services::with_store(test_settings(&server, &screenshots), store.clone());
    services.scrape_stage().unwrap().run().await.unwrap();
    let report = services.enrich_stage().unwrap().run().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);

    let task = single_task(&store, TaskType::ProcessWebsite).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some(GENERATION_FAILED));

    let listing = store.listing(1).await.unwrap();
    assert!(listing.post_content.is_none());
    assert!(listing.what_makes_us_different.is_none());
}

#[tokio::test]
async fn test_capture_failure_is_recorded() {
    let server = MockServer::start();
    let screenshots = TempDir::new().unwrap();
    mock_places(&server, &server.url("/shop"));
    let media = server.mock(|when, then| {
        when.method(POST).path("/wp-json/wp/v2/media");
        then.status(201).json_body(serde_json::json!({"id": 1, "source_url": "x"}));
    });

    let store = seeded_store().await;
    let settings = with_wordpress(test_settings(&server, &screenshots), &server);
    let services =
        Services::with_store(settings, store.clone()).with_capturer(Arc::new(BrokenCapturer));
    services.scrape_stage().unwrap().run().await.unwrap();
    let report = services.screenshot_stage().unwrap().run().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    media.assert_hits(0);

    let task = single_task(&store, TaskType::CaptureScreenshot).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some(CAPTURE_FAILED));
    assert!(store.listing(1).await.unwrap().post_images.is_none());
}

#[tokio::test]
async fn test_upload_failure_removes_local_screenshot() {
    let server = MockServer::start();
    let screenshots = TempDir::new().unwrap();
    mock_places(&server, &server.url("/shop"));

    // 沒有 AU 的 WordPress 設定，上傳必然失敗
    let store = seeded_store().await;
    let services = Services::with_store(test_settings(&server, &screenshots), store.clone())
        .with_capturer(Arc::new(FakeCapturer));
    services.scrape_stage().unwrap().run().await.unwrap();
    let report = services.screenshot_stage().unwrap().run().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);

    let task = single_task(&store, TaskType::CaptureScreenshot).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some(UPLOAD_FAILED));
    assert!(store.listing(1).await.unwrap().post_images.is_none());

    let mut entries = tokio::fs::read_dir(screenshots.path()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
}
