//! SEO settings and AI-assisted copy.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use serde::Deserialize;
use tracing::instrument;

use momtazchem_core::{Language, ProductId, SeoSettingId};

use crate::db::SeoRepository;
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::RequireAdminAuth;
use crate::models::content::{SeoSetting, SeoSettingInput};
use crate::services::ai::seo::{
    KeywordRequest, KeywordSuggestions, ProductCopy, SeoRequest, SeoResult, SkuSuggestion,
};
use crate::services::ai::{AiClient, AiError, SeoService};
use crate::state::AppState;

/// Build the SEO router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/seo/settings",
            get(list_settings).post(create_setting),
        )
        .route(
            "/api/admin/seo/settings/{id}",
            put(update_setting).delete(delete_setting),
        )
        .route("/api/admin/seo/ai-generate", post(ai_generate))
        .route("/api/admin/seo/keywords", post(keywords))
        .route("/api/admin/ai/product-description", post(product_description))
        .route("/api/admin/ai/sku", post(suggest_sku))
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsQuery {
    pub language: Option<Language>,
}

#[derive(Debug, Deserialize)]
pub struct ProductCopyRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Deserialize)]
pub struct SkuRequest {
    pub product_id: ProductId,
}

fn ai_client(state: &AppState) -> Result<&AiClient, AppError> {
    state.ai().ok_or(AppError::Ai(AiError::NotConfigured))
}

/// GET /api/admin/seo/settings
async fn list_settings(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> ApiResult<Vec<SeoSetting>> {
    let settings = SeoRepository::new(state.pool())
        .list(query.language.map(Language::code))
        .await?;
    Ok(ApiResponse::ok(settings))
}

/// POST /api/admin/seo/settings
async fn create_setting(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(input): Json<SeoSettingInput>,
) -> ApiResult<SeoSetting> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let setting = SeoRepository::new(state.pool()).create(&input).await?;
    Ok(ApiResponse::with_message(setting, "SEO setting created"))
}

/// PUT /api/admin/seo/settings/{id}
async fn update_setting(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<SeoSettingId>,
    Json(input): Json<SeoSettingInput>,
) -> ApiResult<SeoSetting> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let setting = SeoRepository::new(state.pool()).update(id, &input).await?;
    Ok(ApiResponse::ok(setting))
}

/// DELETE /api/admin/seo/settings/{id}
async fn delete_setting(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<SeoSettingId>,
) -> ApiResult<()> {
    SeoRepository::new(state.pool()).delete(id).await?;
    Ok(ApiResponse::message("SEO setting deleted"))
}

/// POST /api/admin/seo/ai-generate
#[instrument(skip(state, req), fields(page_type = %req.page_type))]
async fn ai_generate(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(req): Json<SeoRequest>,
) -> ApiResult<SeoResult> {
    if req.page_type.trim().is_empty() {
        return Err(AppError::BadRequest("page_type is required".to_owned()));
    }
    let client = ai_client(&state)?;
    let result = SeoService::new(state.pool(), client).generate(&req).await?;
    Ok(ApiResponse::ok(result))
}

/// POST /api/admin/seo/keywords
#[instrument(skip(state, req))]
async fn keywords(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(req): Json<KeywordRequest>,
) -> ApiResult<KeywordSuggestions> {
    if req.seed_keywords.iter().all(|k| k.trim().is_empty()) {
        return Err(AppError::BadRequest("seed_keywords is required".to_owned()));
    }
    let client = ai_client(&state)?;
    let suggestions = SeoService::new(state.pool(), client).keywords(&req).await?;
    Ok(ApiResponse::ok(suggestions))
}

/// POST /api/admin/ai/product-description
#[instrument(skip(state, req), fields(product_id = %req.product_id))]
async fn product_description(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(req): Json<ProductCopyRequest>,
) -> ApiResult<ProductCopy> {
    let client = ai_client(&state)?;
    let copy = SeoService::new(state.pool(), client)
        .product_description(req.product_id, req.language)
        .await?;
    Ok(ApiResponse::ok(copy))
}

/// POST /api/admin/ai/sku
#[instrument(skip(state, req), fields(product_id = %req.product_id))]
async fn suggest_sku(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
    Json(req): Json<SkuRequest>,
) -> ApiResult<SkuSuggestion> {
    let client = ai_client(&state)?;
    let suggestion = SeoService::new(state.pool(), client)
        .suggest_sku(req.product_id)
        .await?;
    Ok(ApiResponse::ok(suggestion))
}
