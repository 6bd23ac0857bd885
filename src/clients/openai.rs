use crate::clients::ensure_success;
use crate::utils::error::{DataError, Result};
use crate::utils::retry::{retry, RetryPolicy};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "OpenAI";
const SYSTEM_PROMPT: &str =
    "You are a professional content writer specializing in jewelry store descriptions.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion client used to write listing copy.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    retry_policy: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            retry_policy,
        }
    }

    pub async fn generate_blurb(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DataError::MissingConfigError {
                field: "CHATGPT_API_KEY".to_string(),
            })?;

        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Create a concise, engaging 2-3 sentence description for a jewelry store based on this information: {}",
                        prompt
                    ),
                },
            ],
            max_tokens: 150,
            temperature: 0.7,
        };
        let (url, request) = (&url, &request);

        retry(&self.retry_policy, "chat completion", || async move {
            let response = self
                .client
                .post(url)
                .bearer_auth(api_key)
                .json(request)
                .send()
                .await?;
            let body: ChatResponse = ensure_success(SERVICE, response).await?.json().await?;

            body.choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .map(|content| content.trim().to_string())
                .filter(|content| !content.is_empty())
                .ok_or_else(|| DataError::external(SERVICE, "response contained no content"))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_generate_blurb() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test")
                .json_body_partial(r#"{"model": "gpt-3.5-turbo", "max_tokens": 150}"#);
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  A family jeweller.  "}}]
            }));
        });

        let client = OpenAiClient::new(
            Client::new(),
            server.url("/v1"),
            Some("sk-test".to_string()),
            "gpt-3.5-turbo",
            RetryPolicy::immediate(2),
        );

        let blurb = client.generate_blurb("Family jewellers since 1952").await.unwrap();
        mock.assert();
        assert_eq!(blurb, "A family jeweller.");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = OpenAiClient::new(
            Client::new(),
            "http://127.0.0.1:9",
            None,
            "gpt-3.5-turbo",
            RetryPolicy::immediate(2),
        );
        let err = client.generate_blurb("anything").await.unwrap_err();
        assert!(matches!(err, DataError::MissingConfigError { .. }));
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(serde_json::json!({"choices": []}));
        });

        let client = OpenAiClient::new(
            Client::new(),
            server.url("/v1"),
            Some("sk-test".to_string()),
            "gpt-3.5-turbo",
            RetryPolicy::immediate(2),
        );
        assert!(client.generate_blurb("anything").await.is_err());
    }
}
