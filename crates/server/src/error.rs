//! Unified error handling and the JSON response envelope.
//!
//! Every endpoint answers with `{ "success": bool, "data": ..., "message": ... }`.
//! Handlers return [`ApiResult`]; failures convert into [`AppError`], which
//! picks the status code and hides internal details from clients.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::ai::{AiError, SeoError};
use crate::services::auth::AuthError;
use crate::services::barcode::BarcodeError;
use crate::services::documents::DocumentError;
use crate::services::email::EmailError;
use crate::services::order_flow::OrderFlowError;
use crate::services::pricing::PricingError;
use crate::services::sms::SmsError;
use crate::services::storage::StorageError;
use crate::services::vehicle::VehicleError;

/// Success/failure envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    /// A success envelope carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Result type for JSON handlers.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Pricing(#[from] PricingError),

    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),

    #[error("{0}")]
    Barcode(#[from] BarcodeError),

    #[error("AI provider error: {0}")]
    Ai(#[from] AiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("SMS error: {0}")]
    Sms(#[from] SmsError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

const fn pricing_status(err: &PricingError) -> StatusCode {
    match err {
        PricingError::Repository(e) | PricingError::Vehicle(VehicleError::Repository(e)) => {
            repository_status(e)
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(e) => repository_status(e),
            Self::Auth(e) => match e {
                AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::AccountDisabled => StatusCode::FORBIDDEN,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::Repository(e) => repository_status(e),
                AuthError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Pricing(e) => pricing_status(e),
            Self::Barcode(e) => match e {
                BarcodeError::Exhausted => StatusCode::CONFLICT,
                BarcodeError::ProductNotFound => StatusCode::NOT_FOUND,
                BarcodeError::Repository(e) => repository_status(e),
            },
            Self::OrderFlow(e) => match e {
                OrderFlowError::OrderNotFound => StatusCode::NOT_FOUND,
                OrderFlowError::InvalidTransition { .. }
                | OrderFlowError::StatusChanged
                | OrderFlowError::InsufficientStock { .. } => StatusCode::CONFLICT,
                OrderFlowError::Pricing(e) => pricing_status(e),
                OrderFlowError::Repository(e) => repository_status(e),
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Ai(AiError::NotConfigured)
            | Self::Storage(StorageError::NotConfigured)
            | Self::Email(EmailError::NotConfigured(_))
            | Self::Sms(SmsError::Disabled | SmsError::NotConfigured)
            | Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(StorageError::UnsupportedFileType(_) | StorageError::InvalidKey(_))
            | Self::Sms(SmsError::InvalidPhone(_))
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Storage(StorageError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Email(EmailError::Template(_) | EmailError::Repository(_))
            | Self::Sms(SmsError::Repository(_))
            | Self::Storage(StorageError::Repository(_))
            | Self::Document(DocumentError::Template(_) | DocumentError::Repository(_))
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Ai(_) | Self::Storage(_) | Self::Email(_) | Self::Sms(_) | Self::Document(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    /// Client-facing message.
    fn public_message(&self, status: StatusCode) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_owned(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_owned(),
            _ if status == StatusCode::BAD_GATEWAY => "External service error".to_owned(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.public_message(status);
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl From<SeoError> for AppError {
    fn from(err: SeoError) -> Self {
        match err {
            SeoError::Ai(e) => Self::Ai(e),
            SeoError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<VehicleError> for AppError {
    fn from(err: VehicleError) -> Self {
        Self::Pricing(PricingError::Vehicle(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(RepositoryError::Database(err))
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

/// Set the Sentry user context.
pub fn set_sentry_user(user_id: i32, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 42".to_owned());
        assert_eq!(err.to_string(), "Not found: order 42");

        let err = AppError::BadRequest("price must not be negative".to_owned());
        assert_eq!(err.to_string(), "Bad request: price must not be negative");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(get_status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AppError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            get_status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("dup".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Ai(AiError::NotConfigured)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::OrderFlow(OrderFlowError::StatusChanged)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_error_envelope_hides_internal_details() {
        let response = AppError::Internal("connection reset by peer".into()).into_response();
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Internal server error");
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn test_conflict_message_is_passed_through() {
        let response =
            AppError::Database(RepositoryError::Conflict("sku already exists".into())).into_response();
        let json = body_json(response).await;
        assert_eq!(json["message"], "sku already exists");
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = ApiResponse::with_message(vec![1, 2], "loaded").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert_eq!(json["message"], "loaded");
    }
}
