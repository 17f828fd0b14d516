//! Chat-completion client for OpenAI-compatible providers.
//!
//! Requests always ask for a JSON object response. Transient failures
//! (429, 5xx, connection errors) are retried with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::error::{AiError, ApiErrorResponse};
use crate::config::{AiConfig, AiProvider};

/// Delays before each retry.
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_secs(2),
];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Sampling settings for one request.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// AI provider client.
#[derive(Clone)]
pub struct AiClient {
    inner: Arc<AiClientInner>,
}

struct AiClientInner {
    client: reqwest::Client,
    provider: AiProvider,
    model: String,
}

impl AiClient {
    /// Create a client for the configured provider.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|e| AiError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(AiClientInner {
                client,
                provider: config.provider,
                model: config.model.clone(),
            }),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// Ask for a JSON object and parse it.
    ///
    /// # Errors
    ///
    /// Returns the last error after retries are exhausted, or
    /// `AiError::Parse` if the answer is not a JSON object.
    #[instrument(skip(self, system, prompt), fields(model = %self.inner.model))]
    pub async fn complete_json(
        &self,
        system: &str,
        prompt: &str,
        sampling: Sampling,
    ) -> Result<serde_json::Value, AiError> {
        let request = ChatRequest {
            model: &self.inner.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        };

        let mut attempt = 0;
        let content = loop {
            match self.send(&request).await {
                Ok(content) => break content,
                Err(e) if e.is_retryable() && attempt < RETRY_DELAYS.len() => {
                    let delay = RETRY_DELAYS.get(attempt).copied().unwrap_or_default();
                    tracing::warn!(attempt = attempt + 1, error = %e, ?delay, "AI request failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        parse_json_object(&content)
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<String, AiError> {
        let response = self
            .inner
            .client
            .post(self.inner.provider.endpoint())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::handle_error_status(status, response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(format!("Failed to parse response: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::Parse("response had no content".to_owned()))
    }

    async fn handle_error_status(status: StatusCode, response: reqwest::Response) -> AiError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return AiError::RateLimited(retry_after);
        }
        if status == StatusCode::UNAUTHORIZED {
            return AiError::Unauthorized("Invalid API key".to_owned());
        }

        match response.text().await {
            Ok(body) => {
                let message = serde_json::from_str::<ApiErrorResponse>(&body)
                    .map_or(body, |e| e.error.describe());
                AiError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
            Err(e) => AiError::Http(e),
        }
    }
}

/// Parse model output as a JSON object, tolerating a fenced code block.
fn parse_json_object(content: &str) -> Result<serde_json::Value, AiError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);

    let value: serde_json::Value = serde_json::from_str(unfenced.trim())
        .map_err(|e| AiError::Parse(format!("model returned invalid JSON: {e}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(AiError::Parse("model returned JSON that is not an object".to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_object() {
        let v = parse_json_object(r#"{"title": "Fuel additives"}"#).unwrap();
        assert_eq!(v["title"], "Fuel additives");
    }

    #[test]
    fn test_parse_fenced_object() {
        let v = parse_json_object("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(matches!(parse_json_object("[1,2]"), Err(AiError::Parse(_))));
        assert!(matches!(parse_json_object("not json"), Err(AiError::Parse(_))));
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: 0.5,
            max_tokens: 100,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 100);
    }

    #[test]
    fn test_retry_schedule() {
        assert_eq!(RETRY_DELAYS[0], Duration::from_millis(500));
        assert_eq!(RETRY_DELAYS[2], Duration::from_secs(2));
    }
}
