use crate::clients::ensure_success;
use crate::domain::category;
use crate::domain::model::{PlaceRecord, PostcodeId};
use crate::utils::error::{DataError, Result};
use crate::utils::retry::{retry, RetryPolicy};
use reqwest::Client;
use serde::Deserialize;

const SERVICE: &str = "Google Places";
const DETAIL_FIELDS: &str =
    "place_id,name,formatted_address,geometry,website,formatted_phone_number,types,address_components";

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceSummary {
    pub place_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceDetails {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub formatted_address: String,
    #[serde(default)]
    pub geometry: Geometry,
    pub website: Option<String>,
    pub formatted_phone_number: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
}

impl PlaceDetails {
    fn component(&self, kind: &str) -> Option<&AddressComponent> {
        self.address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == kind))
    }

    fn long_name(&self, kind: &str) -> String {
        self.component(kind)
            .map(|c| c.long_name.clone())
            .unwrap_or_default()
    }

    pub fn into_place_record(self, postcode_id: Option<PostcodeId>) -> PlaceRecord {
        let street = format!(
            "{} {}",
            self.long_name("street_number"),
            self.long_name("route")
        )
        .trim()
        .to_string();
        let country_code = self
            .component("country")
            .map(|c| c.short_name.clone())
            .unwrap_or_default();
        let mapped = category::category_for_types(&self.types);

        PlaceRecord {
            street,
            city: self.long_name("locality"),
            region: self.long_name("administrative_area_level_1"),
            country: self.long_name("country"),
            zip: self.long_name("postal_code"),
            country_code,
            post_category: mapped.map(|c| category::format_post_category(&[c.id])),
            default_category: mapped.map(|c| c.id),
            google_place_id: self.place_id,
            name: self.name,
            address: self.formatted_address,
            latitude: self.geometry.location.lat,
            longitude: self.geometry.location.lng,
            postcode_id,
            website_url: self.website.unwrap_or_default(),
            phone: self.formatted_phone_number.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    #[serde(default)]
    results: Vec<PlaceSummary>,
    status: String,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    result: Option<PlaceDetails>,
    status: String,
    error_message: Option<String>,
}

// Places 以 200 回應錯誤，需檢查 status 欄位
fn check_status(status: &str, error_message: Option<String>) -> Result<()> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => Err(DataError::transient(
            SERVICE,
            error_message.unwrap_or_else(|| status.to_string()),
        )),
        other => Err(DataError::external(
            SERVICE,
            format!("{}: {}", other, error_message.unwrap_or_default()),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct PlacesClient {
    client: Client,
    base_url: String,
    api_key: String,
    radius_meters: u32,
    retry_policy: RetryPolicy,
}

impl PlacesClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        radius_meters: u32,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            radius_meters,
            retry_policy,
        }
    }

    pub async fn nearby_search(
        &self,
        latitude: f64,
        longitude: f64,
        keyword: &str,
    ) -> Result<Vec<PlaceSummary>> {
        let url = format!("{}/nearbysearch/json", self.base_url);
        let location = format!("{},{}", latitude, longitude);
        let radius = self.radius_meters.to_string();
        let (url, location, radius) = (&url, &location, &radius);

        retry(&self.retry_policy, "nearby search", || async move {
            tracing::debug!("Nearby search '{}' at {}", keyword, location);
            let response = self
                .client
                .get(url)
                .query(&[
                    ("location", location.as_str()),
                    ("radius", radius.as_str()),
                    ("keyword", keyword),
                    ("key", self.api_key.as_str()),
                ])
                .send()
                .await?;
            let body: NearbyResponse = ensure_success(SERVICE, response).await?.json().await?;
            check_status(&body.status, body.error_message)?;
            Ok(body.results)
        })
        .await
    }

    pub async fn place_details(&self, place_id: &str) -> Result<Option<PlaceDetails>> {
        let url = format!("{}/details/json", self.base_url);
        let url = &url;

        retry(&self.retry_policy, "place details", || async move {
            let response = self
                .client
                .get(url)
                .query(&[
                    ("place_id", place_id),
                    ("fields", DETAIL_FIELDS),
                    ("key", self.api_key.as_str()),
                ])
                .send()
                .await?;
            let body: DetailsResponse = ensure_success(SERVICE, response).await?.json().await?;
            check_status(&body.status, body.error_message)?;
            Ok(body.result)
        })
        .await
    }
}
