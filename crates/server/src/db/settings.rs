//! Settings database operations.
//!
//! Per-admin settings stored as JSONB. Global rows (NULL admin) share the
//! table but are not used by the API yet.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use momtazchem_core::AdminUserId;

use super::RepositoryError;

/// Get an admin-specific setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn get_user_setting(
    pool: &PgPool,
    admin_id: AdminUserId,
    key: &str,
) -> Result<Option<JsonValue>, RepositoryError> {
    let value = sqlx::query_scalar::<_, JsonValue>(
        "SELECT value FROM settings WHERE key = $1 AND admin_user_id = $2",
    )
    .bind(key)
    .bind(admin_id)
    .fetch_optional(pool)
    .await?;

    Ok(value)
}

/// Set an admin-specific setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn set_user_setting(
    pool: &PgPool,
    admin_id: AdminUserId,
    key: &str,
    value: &JsonValue,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO settings (key, value, admin_user_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (key, admin_user_id) DO UPDATE SET value = $2, updated_at = NOW()
        ",
    )
    .bind(key)
    .bind(value)
    .bind(admin_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Typed read of an admin-specific setting.
///
/// # Errors
///
/// Returns `DataCorruption` if the stored JSON no longer matches `T`.
pub async fn get_user_setting_as<T: DeserializeOwned>(
    pool: &PgPool,
    admin_id: AdminUserId,
    key: &str,
) -> Result<Option<T>, RepositoryError> {
    get_user_setting(pool, admin_id, key)
        .await?
        .map(|value| {
            serde_json::from_value(value).map_err(|e| {
                RepositoryError::DataCorruption(format!("setting {key} has invalid shape: {e}"))
            })
        })
        .transpose()
}

/// Typed write of an admin-specific setting.
///
/// # Errors
///
/// Returns an error if serialization or the query fails.
pub async fn set_user_setting_as<T: Serialize>(
    pool: &PgPool,
    admin_id: AdminUserId,
    key: &str,
    value: &T,
) -> Result<(), RepositoryError> {
    let json = serde_json::to_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("cannot serialize {key}: {e}")))?;
    set_user_setting(pool, admin_id, key, &json).await
}
