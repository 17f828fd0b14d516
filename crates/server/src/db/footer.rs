//! Footer settings repository, one row per language.

use sqlx::PgPool;
use sqlx::types::Json;

use momtazchem_core::Language;

use super::RepositoryError;
use crate::models::content::{FooterSettings, FooterSettingsInput};

const FOOTER_COLUMNS: &str = r"
    id, language, company_name, company_description, company_address, company_phone,
    company_email, company_website, facebook_url, instagram_url, twitter_url, linkedin_url,
    youtube_url, whatsapp_url, telegram_url, product_links, company_links, support_links,
    legal_links, copyright_text, show_social_media, show_company_info, show_links,
    is_active, updated_at
";

/// Repository for footer content.
pub struct FooterRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FooterRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active footer for a language.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_for(&self, language: Language) -> Result<Option<FooterSettings>, RepositoryError> {
        let row = sqlx::query_as::<_, FooterSettings>(&format!(
            "SELECT {FOOTER_COLUMNS} FROM footer_settings WHERE language = $1 AND is_active"
        ))
        .bind(language.code())
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Every language's footer, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<FooterSettings>, RepositoryError> {
        let rows = sqlx::query_as::<_, FooterSettings>(&format!(
            "SELECT {FOOTER_COLUMNS} FROM footer_settings ORDER BY language"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert or replace the footer for a language.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn upsert(
        &self,
        language: Language,
        input: &FooterSettingsInput,
    ) -> Result<FooterSettings, RepositoryError> {
        let row = sqlx::query_as::<_, FooterSettings>(&format!(
            r"
            INSERT INTO footer_settings (
                language, company_name, company_description, company_address, company_phone,
                company_email, company_website, facebook_url, instagram_url, twitter_url,
                linkedin_url, youtube_url, whatsapp_url, telegram_url, product_links,
                company_links, support_links, legal_links, copyright_text, show_social_media,
                show_company_info, show_links, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23)
            ON CONFLICT (language) DO UPDATE SET
                company_name = EXCLUDED.company_name,
                company_description = EXCLUDED.company_description,
                company_address = EXCLUDED.company_address,
                company_phone = EXCLUDED.company_phone,
                company_email = EXCLUDED.company_email,
                company_website = EXCLUDED.company_website,
                facebook_url = EXCLUDED.facebook_url,
                instagram_url = EXCLUDED.instagram_url,
                twitter_url = EXCLUDED.twitter_url,
                linkedin_url = EXCLUDED.linkedin_url,
                youtube_url = EXCLUDED.youtube_url,
                whatsapp_url = EXCLUDED.whatsapp_url,
                telegram_url = EXCLUDED.telegram_url,
                product_links = EXCLUDED.product_links,
                company_links = EXCLUDED.company_links,
                support_links = EXCLUDED.support_links,
                legal_links = EXCLUDED.legal_links,
                copyright_text = EXCLUDED.copyright_text,
                show_social_media = EXCLUDED.show_social_media,
                show_company_info = EXCLUDED.show_company_info,
                show_links = EXCLUDED.show_links,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING {FOOTER_COLUMNS}
            "
        ))
        .bind(language.code())
        .bind(&input.company_name)
        .bind(input.company_description.as_deref())
        .bind(input.company_address.as_deref())
        .bind(input.company_phone.as_deref())
        .bind(input.company_email.as_deref())
        .bind(input.company_website.as_deref())
        .bind(input.facebook_url.as_deref())
        .bind(input.instagram_url.as_deref())
        .bind(input.twitter_url.as_deref())
        .bind(input.linkedin_url.as_deref())
        .bind(input.youtube_url.as_deref())
        .bind(input.whatsapp_url.as_deref())
        .bind(input.telegram_url.as_deref())
        .bind(Json(&input.product_links))
        .bind(Json(&input.company_links))
        .bind(Json(&input.support_links))
        .bind(Json(&input.legal_links))
        .bind(input.copyright_text.as_deref())
        .bind(input.show_social_media)
        .bind(input.show_company_info)
        .bind(input.show_links)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }
}
