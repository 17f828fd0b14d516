//! Footer content per language.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use momtazchem_core::Language;

use crate::db::FooterRepository;
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::RequireAdminAuth;
use crate::models::content::{FooterSettings, FooterSettingsInput};
use crate::state::AppState;

/// Build the footer router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/footer-settings", get(public_footer))
        .route("/api/admin/footer-settings", get(list_footers))
        .route("/api/admin/footer-settings/{language}", put(save_footer))
}

#[derive(Debug, Default, Deserialize)]
pub struct FooterQuery {
    pub language: Option<String>,
}

/// Unknown or missing codes read as English.
fn requested_language(raw: Option<&str>) -> Language {
    raw.and_then(|code| code.trim().to_ascii_lowercase().parse().ok())
        .unwrap_or_default()
}

/// GET /api/footer-settings?language=
async fn public_footer(
    State(state): State<AppState>,
    Query(query): Query<FooterQuery>,
) -> ApiResult<Option<FooterSettings>> {
    let language = requested_language(query.language.as_deref());
    let footer = state.cache().footer(state.pool(), language).await?;
    Ok(ApiResponse::ok(footer))
}

/// GET /api/admin/footer-settings
async fn list_footers(
    RequireAdminAuth(_): RequireAdminAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<FooterSettings>> {
    let footers = FooterRepository::new(state.pool()).list_all().await?;
    Ok(ApiResponse::ok(footers))
}

/// PUT /api/admin/footer-settings/{language}
#[instrument(skip(admin, state, input), fields(admin_id = %admin.id))]
async fn save_footer(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(language): Path<Language>,
    Json(input): Json<FooterSettingsInput>,
) -> ApiResult<FooterSettings> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let footer = FooterRepository::new(state.pool())
        .upsert(language, &input)
        .await?;
    state.cache().invalidate_footer(language).await;
    tracing::info!(language = %language, "Footer saved");
    Ok(ApiResponse::with_message(footer, "Footer saved"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_language_defaults_to_english() {
        assert_eq!(requested_language(Some("AR")), Language::Ar);
        assert_eq!(requested_language(Some("ku")), Language::Ku);
        assert_eq!(requested_language(Some("fr")), Language::En);
        assert_eq!(requested_language(None), Language::En);
    }
}
