//! SEO settings repository.

use sqlx::PgPool;

use momtazchem_core::SeoSettingId;

use super::{RepositoryError, require_affected};
use crate::models::content::{SeoSetting, SeoSettingInput};

const SEO_COLUMNS: &str = r"
    id, page_type, page_identifier, language, title, description, keywords, og_title,
    og_description, og_image, canonical_url, robots, is_active, created_at, updated_at
";

const DUPLICATE: &str = "SEO settings already exist for this page and language";

/// Repository for per-page SEO metadata.
pub struct SeoRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SeoRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All settings, optionally for one language.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, language: Option<&str>) -> Result<Vec<SeoSetting>, RepositoryError> {
        let rows = sqlx::query_as::<_, SeoSetting>(&format!(
            r"
            SELECT {SEO_COLUMNS} FROM seo_settings
            WHERE ($1::TEXT IS NULL OR language = $1)
            ORDER BY page_type, page_identifier NULLS FIRST, language
            "
        ))
        .bind(language)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create a setting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the page/language pair exists.
    pub async fn create(&self, input: &SeoSettingInput) -> Result<SeoSetting, RepositoryError> {
        let row = sqlx::query_as::<_, SeoSetting>(&format!(
            r"
            INSERT INTO seo_settings (
                page_type, page_identifier, language, title, description, keywords, og_title,
                og_description, og_image, canonical_url, robots, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, COALESCE($11, 'index,follow'), $12)
            RETURNING {SEO_COLUMNS}
            "
        ))
        .bind(&input.page_type)
        .bind(input.page_identifier.as_deref())
        .bind(input.language.code())
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.keywords)
        .bind(input.og_title.as_deref())
        .bind(input.og_description.as_deref())
        .bind(input.og_image.as_deref())
        .bind(input.canonical_url.as_deref())
        .bind(input.robots.as_deref())
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, DUPLICATE))?;

        Ok(row)
    }

    /// Replace a setting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the setting does not exist.
    pub async fn update(
        &self,
        id: SeoSettingId,
        input: &SeoSettingInput,
    ) -> Result<SeoSetting, RepositoryError> {
        sqlx::query_as::<_, SeoSetting>(&format!(
            r"
            UPDATE seo_settings SET
                page_type = $2, page_identifier = $3, language = $4, title = $5,
                description = $6, keywords = $7, og_title = $8, og_description = $9,
                og_image = $10, canonical_url = $11, robots = COALESCE($12, robots),
                is_active = $13, updated_at = NOW()
            WHERE id = $1
            RETURNING {SEO_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.page_type)
        .bind(input.page_identifier.as_deref())
        .bind(input.language.code())
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.keywords)
        .bind(input.og_title.as_deref())
        .bind(input.og_description.as_deref())
        .bind(input.og_image.as_deref())
        .bind(input.canonical_url.as_deref())
        .bind(input.robots.as_deref())
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, DUPLICATE))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a setting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the setting does not exist.
    pub async fn delete(&self, id: SeoSettingId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM seo_settings WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }
}
