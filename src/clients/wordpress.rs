use crate::clients::ensure_success;
use crate::config::WordPressSite;
use crate::domain::model::Listing;
use crate::utils::error::{DataError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

const SERVICE: &str = "WordPress";
pub const MEDIA_PATH: &str = "/wp-json/wp/v2/media";
pub const PLACES_PATH: &str = "/wp-json/geodir/v2/places";

/// Body of `POST /wp-json/geodir/v2/places`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoDirectoryPlace {
    pub title: String,
    pub content: String,
    pub status: &'static str,
    pub default_category: Option<u32>,
    pub street: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub zip: String,
    pub latitude: f64,
    pub longitude: f64,
    pub phone: String,
    pub email: Option<String>,
    pub website: String,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub timing: Option<String>,
    pub what_makes_us_different: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_category: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_media: Option<String>,
}

impl From<&Listing> for GeoDirectoryPlace {
    fn from(listing: &Listing) -> Self {
        let categories = listing.category_ids();
        Self {
            title: listing.post_title.clone(),
            content: listing.post_content.clone().unwrap_or_default(),
            status: "publish",
            default_category: listing.default_category,
            street: listing.street.clone(),
            city: listing.city.clone(),
            region: listing.region.clone(),
            country: listing.country.clone(),
            zip: listing.zip.clone(),
            latitude: listing.latitude,
            longitude: listing.longitude,
            phone: listing.phone.clone(),
            email: listing.email.clone(),
            website: listing.website_url.clone(),
            facebook: listing.facebook.clone(),
            instagram: listing.instagram.clone(),
            timing: listing.business_hours.clone(),
            what_makes_us_different: listing.what_makes_us_different.clone(),
            post_category: (!categories.is_empty()).then_some(categories),
            featured_media: listing.post_images.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    source_url: Option<String>,
}

/// Result of a created place: the WordPress post id and the raw response.
#[derive(Debug, Clone)]
pub struct CreatedPlace {
    pub id: i64,
    pub response: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct WordPressClient {
    client: Client,
}

impl WordPressClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Uploads an image to the media library and returns its public URL.
    pub async fn upload_media(&self, site: &WordPressSite, file: &Path) -> Result<String> {
        let filename = file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| DataError::validation(format!("Invalid media path: {}", file.display())))?
            .to_string();
        let mime = match file.extension().and_then(|ext| ext.to_str()) {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            _ => "image/png",
        };
        let bytes = tokio::fs::read(file).await?;

        let response = self
            .client
            .post(site.endpoint(MEDIA_PATH))
            .basic_auth(&site.username, Some(&site.password))
            .header(
                reqwest::header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            )
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(bytes)
            .send()
            .await?;
        let media: MediaResponse = ensure_success(SERVICE, response).await?.json().await?;

        match media.source_url {
            Some(url) => {
                tracing::info!("📤 Uploaded {} to {}", filename, site.site);
                Ok(url)
            }
            None => Err(DataError::external(
                SERVICE,
                format!("No source URL in media response for {}", filename),
            )),
        }
    }

    pub async fn create_place(
        &self,
        site: &WordPressSite,
        place: &GeoDirectoryPlace,
    ) -> Result<CreatedPlace> {
        let response = self
            .client
            .post(site.endpoint(PLACES_PATH))
            .basic_auth(&site.username, Some(&site.password))
            .json(place)
            .send()
            .await?;
        let body: serde_json::Value = ensure_success(SERVICE, response).await?.json().await?;

        let id = body
            .get("id")
            .and_then(|id| id.as_i64())
            .ok_or_else(|| DataError::external(SERVICE, "response did not include a post id"))?;
        Ok(CreatedPlace { id, response: body })
    }
}
