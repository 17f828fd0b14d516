//! Error types for the chat-completion client.

use thiserror::Error;

/// Errors that can occur when calling the AI provider.
#[derive(Debug, Error)]
pub enum AiError {
    /// No provider key in the environment.
    #[error("AI provider is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The model answered with something that is not the JSON we asked for.
    #[error("parse error: {0}")]
    Parse(String),
}

impl AiError {
    /// Transient failures worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::NotConfigured | Self::Unauthorized(_) | Self::Parse(_) => false,
        }
    }
}

/// Error body shared by OpenAI-compatible APIs.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

impl ApiErrorDetail {
    /// Message prefixed with the provider's error type, when it sent one.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.error_type.as_deref().filter(|t| !t.is_empty()) {
            Some(kind) => format!("{kind}: {}", self.message),
            None => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_error_display() {
        assert_eq!(
            AiError::RateLimited(30).to_string(),
            "rate limited, retry after 30 seconds"
        );
        let err = AiError::Api {
            status: 400,
            message: "model not found".to_owned(),
        };
        assert_eq!(err.to_string(), "API error (400): model not found");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AiError::RateLimited(1).is_retryable());
        assert!(
            AiError::Api {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !AiError::Api {
                status: 400,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!AiError::Parse("x".into()).is_retryable());
        assert!(!AiError::Unauthorized("x".into()).is_retryable());
    }

    #[test]
    fn test_api_error_deserialization() {
        let json = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        let response: ApiErrorResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.error.message, "Incorrect API key provided");
        assert_eq!(response.error.error_type.as_deref(), Some("invalid_request_error"));
        assert_eq!(
            response.error.describe(),
            "invalid_request_error: Incorrect API key provided"
        );
    }

    #[test]
    fn test_describe_without_type() {
        let json = r#"{"error": {"message": "Insufficient balance"}}"#;
        let response: ApiErrorResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.error.describe(), "Insufficient balance");
    }
}
