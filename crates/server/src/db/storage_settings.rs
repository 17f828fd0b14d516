//! AWS S3 settings repository (single row, id = 1).

use sqlx::PgPool;

use super::RepositoryError;
use crate::models::content::{S3Settings, S3SettingsInput};

const S3_COLUMNS: &str =
    "region, bucket_name, endpoint, public_url, path_prefix, is_active, test_status, last_tested, updated_at";

/// Repository for the storage configuration.
pub struct StorageSettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StorageSettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Current settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the seeded row is missing.
    pub async fn get(&self) -> Result<S3Settings, RepositoryError> {
        sqlx::query_as::<_, S3Settings>(&format!(
            "SELECT {S3_COLUMNS} FROM aws_s3_settings WHERE id = 1"
        ))
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Replace the settings. A change invalidates the last test result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn update(&self, input: &S3SettingsInput) -> Result<S3Settings, RepositoryError> {
        let row = sqlx::query_as::<_, S3Settings>(&format!(
            r"
            INSERT INTO aws_s3_settings (id, region, bucket_name, endpoint, public_url, path_prefix, is_active)
            VALUES (1, $1, $2, $3, $4, COALESCE($5, 'uploads'), $6)
            ON CONFLICT (id) DO UPDATE SET
                region = EXCLUDED.region,
                bucket_name = EXCLUDED.bucket_name,
                endpoint = EXCLUDED.endpoint,
                public_url = EXCLUDED.public_url,
                path_prefix = EXCLUDED.path_prefix,
                is_active = EXCLUDED.is_active,
                test_status = 'untested',
                updated_at = NOW()
            RETURNING {S3_COLUMNS}
            "
        ))
        .bind(&input.region)
        .bind(&input.bucket_name)
        .bind(input.endpoint.as_deref())
        .bind(input.public_url.as_deref())
        .bind(input.path_prefix.as_deref())
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// Store the outcome of a connection test.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn record_test(&self, success: bool) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE aws_s3_settings SET test_status = $1, last_tested = NOW() WHERE id = 1",
        )
        .bind(if success { "success" } else { "failed" })
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
