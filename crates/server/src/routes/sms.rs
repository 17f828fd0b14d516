//! SMS gateway settings, template categories and templates.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use momtazchem_core::{SmsCategoryId, SmsTemplateId};

use crate::db::SmsRepository;
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::RequireAdminAuth;
use crate::models::messaging::{
    SmsCategoryInput, SmsSettings, SmsSettingsInput, SmsTemplate, SmsTemplateCategory,
    SmsTemplateInput,
};
use crate::services::placeholders;
use crate::state::AppState;

const MAX_TEST_MESSAGE_CHARS: usize = 480;

/// Build the SMS router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/sms/settings", get(settings).put(save_settings))
        .route(
            "/api/admin/sms/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/api/admin/sms/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route(
            "/api/admin/sms/templates",
            get(list_templates).post(create_template),
        )
        .route(
            "/api/admin/sms/templates/{id}",
            put(update_template).delete(delete_template),
        )
        .route("/api/admin/sms/test", post(send_test))
}

/// Settings plus whether the gateway secrets are present.
#[derive(Debug, Serialize)]
pub struct SmsSettingsView {
    #[serde(flatten)]
    pub settings: SmsSettings,
    pub credentials_configured: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateQuery {
    pub category_id: Option<SmsCategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct TestRequest {
    pub phone: String,
    pub message: String,
}

impl TestRequest {
    fn validate(self) -> Result<Self, String> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err("message is required".to_owned());
        }
        if message.chars().count() > MAX_TEST_MESSAGE_CHARS {
            return Err(format!("message is limited to {MAX_TEST_MESSAGE_CHARS} characters"));
        }
        Ok(Self {
            phone: self.phone.trim().to_owned(),
            message: message.to_owned(),
        })
    }
}

fn with_detected_variables(mut input: SmsTemplateInput) -> SmsTemplateInput {
    if input.variables.is_empty() {
        input.variables = placeholders::extract(&input.content);
    }
    input
}

/// GET /api/admin/sms/settings
async fn settings(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
) -> ApiResult<SmsSettingsView> {
    let settings = SmsRepository::new(state.pool()).settings().await?;
    Ok(ApiResponse::ok(SmsSettingsView {
        settings,
        credentials_configured: state.sms().has_credentials(),
    }))
}

/// PUT /api/admin/sms/settings
#[instrument(skip(admin, state, input), fields(admin_id = %admin.id))]
async fn save_settings(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Json(input): Json<SmsSettingsInput>,
) -> ApiResult<SmsSettingsView> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let settings = SmsRepository::new(state.pool())
        .update_settings(&input)
        .await?;
    tracing::info!(
        enabled = settings.is_enabled,
        provider = %settings.provider,
        "SMS settings saved"
    );
    Ok(ApiResponse::with_message(
        SmsSettingsView {
            settings,
            credentials_configured: state.sms().has_credentials(),
        },
        "SMS settings saved",
    ))
}

/// GET /api/admin/sms/categories
async fn list_categories(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<SmsTemplateCategory>> {
    let categories = SmsRepository::new(state.pool()).categories().await?;
    Ok(ApiResponse::ok(categories))
}

/// POST /api/admin/sms/categories
async fn create_category(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(input): Json<SmsCategoryInput>,
) -> ApiResult<SmsTemplateCategory> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let category = SmsRepository::new(state.pool())
        .create_category(&input)
        .await?;
    Ok(ApiResponse::with_message(category, "Category created"))
}

/// PUT /api/admin/sms/categories/{id}
async fn update_category(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<SmsCategoryId>,
    Json(input): Json<SmsCategoryInput>,
) -> ApiResult<SmsTemplateCategory> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let category = SmsRepository::new(state.pool())
        .update_category(id, &input)
        .await?;
    Ok(ApiResponse::ok(category))
}

/// DELETE /api/admin/sms/categories/{id}
async fn delete_category(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<SmsCategoryId>,
) -> ApiResult<()> {
    SmsRepository::new(state.pool()).delete_category(id).await?;
    Ok(ApiResponse::message("Category deleted"))
}

/// GET /api/admin/sms/templates
async fn list_templates(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> ApiResult<Vec<SmsTemplate>> {
    let templates = SmsRepository::new(state.pool())
        .templates(query.category_id)
        .await?;
    Ok(ApiResponse::ok(templates))
}

/// POST /api/admin/sms/templates
#[instrument(skip(state, input), fields(category_id = %input.category_id))]
async fn create_template(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(input): Json<SmsTemplateInput>,
) -> ApiResult<SmsTemplate> {
    let input = with_detected_variables(input.validate().map_err(AppError::BadRequest)?);
    let template = SmsRepository::new(state.pool())
        .create_template(&input)
        .await?;
    Ok(ApiResponse::with_message(template, "Template created"))
}

/// PUT /api/admin/sms/templates/{id}
async fn update_template(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<SmsTemplateId>,
    Json(input): Json<SmsTemplateInput>,
) -> ApiResult<SmsTemplate> {
    let input = with_detected_variables(input.validate().map_err(AppError::BadRequest)?);
    let template = SmsRepository::new(state.pool())
        .update_template(id, &input)
        .await?;
    Ok(ApiResponse::ok(template))
}

/// DELETE /api/admin/sms/templates/{id}
async fn delete_template(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<SmsTemplateId>,
) -> ApiResult<()> {
    SmsRepository::new(state.pool()).delete_template(id).await?;
    Ok(ApiResponse::message("Template deleted"))
}

/// POST /api/admin/sms/test
#[instrument(skip(admin, state, req), fields(admin_id = %admin.id))]
async fn send_test(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Json(req): Json<TestRequest>,
) -> ApiResult<()> {
    let req = req.validate().map_err(AppError::BadRequest)?;
    state
        .sms()
        .send(state.pool(), &req.phone, &req.message, None)
        .await?;
    Ok(ApiResponse::message("Test SMS sent"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_request_trims_and_limits() {
        let ok = TestRequest {
            phone: " 07501234567 ".into(),
            message: "  hello ".into(),
        }
        .validate();
        assert!(matches!(ok, Ok(ref r) if r.phone == "07501234567" && r.message == "hello"));

        let blank = TestRequest {
            phone: "07501234567".into(),
            message: "   ".into(),
        };
        assert!(blank.validate().is_err());

        let long = TestRequest {
            phone: "07501234567".into(),
            message: "x".repeat(MAX_TEST_MESSAGE_CHARS + 1),
        };
        assert!(long.validate().is_err());
    }
}
