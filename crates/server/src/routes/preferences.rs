//! Per-admin back-office preferences.

use axum::{Json, Router, extract::State, routing::get};

use crate::db::settings::{get_user_setting_as, set_user_setting_as};
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::RequireAdminSession;
use crate::models::content::{REFRESH_SETTINGS_KEY, RefreshPreferences};
use crate::state::AppState;

/// Build the preferences router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/admin/preferences/refresh",
        get(refresh).put(save_refresh),
    )
}

/// GET /api/admin/preferences/refresh
///
/// Admins who never saved preferences get the defaults.
async fn refresh(
    RequireAdminSession(admin): RequireAdminSession,
    State(state): State<AppState>,
) -> ApiResult<RefreshPreferences> {
    let prefs = get_user_setting_as::<RefreshPreferences>(state.pool(), admin.id, REFRESH_SETTINGS_KEY)
        .await?
        .unwrap_or_default();
    Ok(ApiResponse::ok(prefs))
}

/// PUT /api/admin/preferences/refresh
async fn save_refresh(
    RequireAdminSession(admin): RequireAdminSession,
    State(state): State<AppState>,
    Json(prefs): Json<RefreshPreferences>,
) -> ApiResult<RefreshPreferences> {
    prefs.validate().map_err(AppError::BadRequest)?;
    set_user_setting_as(state.pool(), admin.id, REFRESH_SETTINGS_KEY, &prefs).await?;
    Ok(ApiResponse::with_message(prefs, "Preferences saved"))
}
