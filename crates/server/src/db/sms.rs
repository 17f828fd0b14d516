//! SMS settings, template categories, templates and send logs.

use sqlx::PgPool;

use momtazchem_core::{SmsCategoryId, SmsTemplateId};

use super::{RepositoryError, require_affected};
use crate::models::messaging::{
    SmsCategoryInput, SmsSettings, SmsSettingsInput, SmsTemplate, SmsTemplateCategory,
    SmsTemplateInput,
};

const SETTINGS_COLUMNS: &str = r"
    is_enabled, provider, sender_number, api_endpoint, code_length, code_expiry_minutes,
    max_attempts, updated_at
";

const CATEGORY_COLUMNS: &str = "id, name, description, is_active, created_at";

const TEMPLATE_COLUMNS: &str = r"
    id, category_id, template_number, name, content, variables, system_usage,
    is_default, is_active, usage_count, created_at, updated_at
";

/// Repository for SMS configuration.
pub struct SmsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SmsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The singleton settings row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn settings(&self) -> Result<SmsSettings, RepositoryError> {
        sqlx::query_as::<_, SmsSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM sms_settings WHERE id = 1"
        ))
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Replace the settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn update_settings(
        &self,
        input: &SmsSettingsInput,
    ) -> Result<SmsSettings, RepositoryError> {
        let row = sqlx::query_as::<_, SmsSettings>(&format!(
            r"
            INSERT INTO sms_settings (
                id, is_enabled, provider, sender_number, api_endpoint, code_length,
                code_expiry_minutes, max_attempts
            )
            VALUES (1, $1, $2, $3, $4, $5, $6, COALESCE($7, 3))
            ON CONFLICT (id) DO UPDATE SET
                is_enabled = EXCLUDED.is_enabled,
                provider = EXCLUDED.provider,
                sender_number = EXCLUDED.sender_number,
                api_endpoint = EXCLUDED.api_endpoint,
                code_length = EXCLUDED.code_length,
                code_expiry_minutes = EXCLUDED.code_expiry_minutes,
                max_attempts = COALESCE($7, sms_settings.max_attempts),
                updated_at = NOW()
            RETURNING {SETTINGS_COLUMNS}
            "
        ))
        .bind(input.is_enabled)
        .bind(input.provider.as_str())
        .bind(input.sender_number.as_deref())
        .bind(input.api_endpoint.as_deref())
        .bind(input.code_length)
        .bind(input.code_expiry_minutes)
        .bind(input.max_attempts)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// All categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<SmsTemplateCategory>, RepositoryError> {
        let rows = sqlx::query_as::<_, SmsTemplateCategory>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM sms_template_categories ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name exists.
    pub async fn create_category(
        &self,
        input: &SmsCategoryInput,
    ) -> Result<SmsTemplateCategory, RepositoryError> {
        let row = sqlx::query_as::<_, SmsTemplateCategory>(&format!(
            r"
            INSERT INTO sms_template_categories (name, description, is_active)
            VALUES ($1, $2, $3)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "category name already exists"))?;

        Ok(row)
    }

    /// Replace a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn update_category(
        &self,
        id: SmsCategoryId,
        input: &SmsCategoryInput,
    ) -> Result<SmsTemplateCategory, RepositoryError> {
        sqlx::query_as::<_, SmsTemplateCategory>(&format!(
            r"
            UPDATE sms_template_categories SET name = $2, description = $3, is_active = $4
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "category name already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a category and its templates.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete_category(&self, id: SmsCategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM sms_template_categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }

    // =========================================================================
    // Templates
    // =========================================================================

    /// Templates, optionally for one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn templates(
        &self,
        category_id: Option<SmsCategoryId>,
    ) -> Result<Vec<SmsTemplate>, RepositoryError> {
        let rows = sqlx::query_as::<_, SmsTemplate>(&format!(
            r"
            SELECT {TEMPLATE_COLUMNS} FROM sms_templates
            WHERE ($1::INTEGER IS NULL OR category_id = $1)
            ORDER BY category_id, template_number
            "
        ))
        .bind(category_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create a template numbered after the category's last one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn create_template(
        &self,
        input: &SmsTemplateInput,
    ) -> Result<SmsTemplate, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Serialises numbering within the category.
        sqlx::query_scalar::<_, i32>("SELECT id FROM sms_template_categories WHERE id = $1 FOR UPDATE")
            .bind(input.category_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if input.is_default {
            clear_defaults(&mut tx, input.category_id, None).await?;
        }

        let row = sqlx::query_as::<_, SmsTemplate>(&format!(
            r"
            INSERT INTO sms_templates (
                category_id, template_number, name, content, variables, system_usage,
                is_default, is_active
            )
            SELECT $1, COALESCE(MAX(template_number), 0) + 1, $2, $3, $4, $5, $6, $7
            FROM sms_templates WHERE category_id = $1
            RETURNING {TEMPLATE_COLUMNS}
            "
        ))
        .bind(input.category_id)
        .bind(&input.name)
        .bind(&input.content)
        .bind(&input.variables)
        .bind(input.system_usage.as_deref())
        .bind(input.is_default)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Replace a template. Moving categories keeps the number when free.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the template does not exist.
    pub async fn update_template(
        &self,
        id: SmsTemplateId,
        input: &SmsTemplateInput,
    ) -> Result<SmsTemplate, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_defaults(&mut tx, input.category_id, Some(id)).await?;
        }

        let row = sqlx::query_as::<_, SmsTemplate>(&format!(
            r"
            UPDATE sms_templates SET
                category_id = $2, name = $3, content = $4, variables = $5,
                system_usage = $6, is_default = $7, is_active = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {TEMPLATE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.category_id)
        .bind(&input.name)
        .bind(&input.content)
        .bind(&input.variables)
        .bind(input.system_usage.as_deref())
        .bind(input.is_default)
        .bind(input.is_active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "template number already used in that category"))?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(row)
    }

    /// Delete a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the template does not exist.
    pub async fn delete_template(&self, id: SmsTemplateId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM sms_templates WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }

    /// Active template for a system usage such as `delivery_code`,
    /// defaults first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn template_for_usage(
        &self,
        usage: &str,
    ) -> Result<Option<SmsTemplate>, RepositoryError> {
        let row = sqlx::query_as::<_, SmsTemplate>(&format!(
            r"
            SELECT {TEMPLATE_COLUMNS} FROM sms_templates
            WHERE system_usage = $1 AND is_active
            ORDER BY is_default DESC, template_number
            LIMIT 1
            "
        ))
        .bind(usage)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Record a send attempt and bump the template's usage count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn log_send(
        &self,
        phone: &str,
        message: &str,
        provider: &str,
        template_id: Option<SmsTemplateId>,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO sms_logs (phone, message, provider, status, error_message, template_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(phone)
        .bind(message)
        .bind(provider)
        .bind(if error.is_some() { "failed" } else { "sent" })
        .bind(error)
        .bind(template_id)
        .execute(self.pool)
        .await?;

        if let (Some(id), None) = (template_id, error) {
            sqlx::query("UPDATE sms_templates SET usage_count = usage_count + 1 WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;
        }
        Ok(())
    }
}

async fn clear_defaults(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    category_id: SmsCategoryId,
    except: Option<SmsTemplateId>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE sms_templates SET is_default = FALSE
        WHERE category_id = $1 AND is_default AND ($2::INTEGER IS NULL OR id <> $2)
        ",
    )
    .bind(category_id)
    .bind(except)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
