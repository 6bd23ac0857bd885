//! HTTP clients for the services the pipeline talks to.

pub mod chrome;
pub mod openai;
pub mod places;
pub mod website;
pub mod wordpress;

pub use chrome::ChromeCapturer;
pub use openai::OpenAiClient;
pub use places::PlacesClient;
pub use website::WebsiteClient;
pub use wordpress::WordPressClient;

use crate::utils::error::{DataError, Result, RETRYABLE_STATUS_CODES};
use std::time::Duration;

pub fn build_http_client(timeout: Duration, user_agent: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent);
    }
    Ok(builder.build()?)
}

/// Turns non-2xx responses into errors carrying the response body.
pub(crate) async fn ensure_success(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // 保留狀態碼，讓重試邏輯判斷
    if RETRYABLE_STATUS_CODES.contains(&status.as_u16()) {
        return match response.error_for_status() {
            Err(e) => Err(DataError::HttpError(e)),
            Ok(_) => Err(DataError::transient(service, status.to_string())),
        };
    }

    let body = response.text().await.unwrap_or_default();
    Err(DataError::external(
        service,
        format!("{} {}", status, body.chars().take(300).collect::<String>()),
    ))
}
