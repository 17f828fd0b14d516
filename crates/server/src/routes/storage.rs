//! S3 settings and admin image uploads.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
};
use serde::Serialize;
use tracing::instrument;

use crate::db::StorageSettingsRepository;
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::{RequireAdminAuth, RequireSuperAdmin};
use crate::models::content::{S3Settings, S3SettingsInput};
use crate::services::storage::{FileKind, MAX_UPLOAD_BYTES, StoredObject};
use crate::state::AppState;

const MULTIPART_SLACK: usize = 64 * 1024;
const DEFAULT_IMAGE_FOLDER: &str = "images";

/// Build the storage router.
pub fn router() -> Router<AppState> {
    let uploads = Router::new()
        .route("/api/admin/upload/image", post(upload_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_SLACK));

    Router::new()
        .route(
            "/api/admin/aws-s3-settings",
            get(settings).put(save_settings),
        )
        .route("/api/admin/aws-s3-settings/test", post(test_connection))
        .merge(uploads)
}

#[derive(Debug, Serialize)]
pub struct S3SettingsView {
    #[serde(flatten)]
    pub settings: S3Settings,
    pub credentials_configured: bool,
}

/// Allowed sub-folders for image uploads.
fn image_folder(raw: Option<&str>) -> Result<&'static str, AppError> {
    match raw.map(str::trim).filter(|f| !f.is_empty()) {
        None => Ok(DEFAULT_IMAGE_FOLDER),
        Some("images") => Ok("images"),
        Some("products") => Ok("products"),
        Some("content") => Ok("content"),
        Some(other) => Err(AppError::BadRequest(format!("unknown upload folder: {other}"))),
    }
}

/// GET /api/admin/aws-s3-settings
async fn settings(
    RequireSuperAdmin(_): RequireSuperAdmin,
    State(state): State<AppState>,
) -> ApiResult<S3SettingsView> {
    let settings = StorageSettingsRepository::new(state.pool()).get().await?;
    Ok(ApiResponse::ok(S3SettingsView {
        settings,
        credentials_configured: state.storage().has_credentials(),
    }))
}

/// PUT /api/admin/aws-s3-settings
#[instrument(skip(admin, state, input), fields(admin_id = %admin.id))]
async fn save_settings(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Json(input): Json<S3SettingsInput>,
) -> ApiResult<S3SettingsView> {
    let input = input.validate().map_err(AppError::BadRequest)?;
    let settings = StorageSettingsRepository::new(state.pool())
        .update(&input)
        .await?;
    tracing::info!(bucket = %settings.bucket_name, active = settings.is_active, "S3 settings saved");
    Ok(ApiResponse::with_message(
        S3SettingsView {
            settings,
            credentials_configured: state.storage().has_credentials(),
        },
        "Storage settings saved",
    ))
}

/// POST /api/admin/aws-s3-settings/test
async fn test_connection(
    RequireSuperAdmin(_): RequireSuperAdmin,
    State(state): State<AppState>,
) -> ApiResult<()> {
    state.storage().test_connection(state.pool()).await?;
    Ok(ApiResponse::message("Bucket reachable"))
}

/// POST /api/admin/upload/image
///
/// Multipart fields: `file`, optional `folder`.
#[instrument(skip(admin, state, multipart), fields(admin_id = %admin.id))]
async fn upload_image(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<StoredObject> {
    let mut bytes = None;
    let mut folder = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid upload: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid upload: {e}")))?;
                bytes = Some(data.to_vec());
            }
            Some("folder") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid folder: {e}")))?;
                folder = Some(text);
            }
            _ => {}
        }
    }
    let bytes = bytes.ok_or_else(|| AppError::BadRequest("file is required".to_owned()))?;
    let folder = image_folder(folder.as_deref())?;

    let stored = state
        .storage()
        .upload(state.pool(), folder, bytes, FileKind::IMAGES)
        .await?;
    tracing::info!(key = %stored.key, size = stored.size, "Image uploaded");
    Ok(ApiResponse::with_message(stored, "Image uploaded"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_folder_allow_list() {
        assert!(matches!(image_folder(None), Ok("images")));
        assert!(matches!(image_folder(Some(" products ")), Ok("products")));
        assert!(image_folder(Some("../receipts")).is_err());
        assert!(image_folder(Some("receipts")).is_err());
    }
}
