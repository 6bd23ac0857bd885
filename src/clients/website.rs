use crate::clients::ensure_success;
use crate::utils::error::Result;
use crate::utils::retry::{retry, RetryPolicy};
use reqwest::Client;

/// Fetches jeweller websites with a browser user agent.
#[derive(Debug, Clone)]
pub struct WebsiteClient {
    client: Client,
    retry_policy: RetryPolicy,
}

impl WebsiteClient {
    pub fn new(client: Client, retry_policy: RetryPolicy) -> Self {
        Self {
            client,
            retry_policy,
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<String> {
        retry(&self.retry_policy, "website fetch", || async move {
            let response = self.client.get(url).send().await?;
            let response = ensure_success("Website", response).await?;
            Ok(response.text().await?)
        })
        .await
    }

    /// Like [`fetch`](Self::fetch) but logs and swallows failures.
    pub async fn try_fetch(&self, url: &str) -> Option<String> {
        match self.fetch(url).await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::error!("Error fetching website {}: {}", url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_fetch_sends_user_agent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/")
                .header("user-agent", "diamond-test-agent");
            then.status(200).body("<html><main>Hello</main></html>");
        });

        let http = crate::clients::build_http_client(
            std::time::Duration::from_secs(5),
            Some("diamond-test-agent"),
        )
        .unwrap();
        let client = WebsiteClient::new(http, RetryPolicy::immediate(3));

        let body = client.fetch(&server.url("/")).await.unwrap();
        mock.assert();
        assert!(body.contains("Hello"));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/gone");
            then.status(404);
        });

        let client = WebsiteClient::new(Client::new(), RetryPolicy::immediate(3));
        assert!(client.try_fetch(&server.url("/gone")).await.is_none());
        mock.assert_hits(1);
    }
}
