//! Email categories, SMTP settings, recipients, templates and send logs.

use sqlx::PgPool;

use momtazchem_core::{AdminUserId, EmailCategoryId, EmailTemplateId, Language};

use super::{RepositoryError, require_affected};
use crate::models::messaging::{
    EmailCategory, EmailCategoryDetail, EmailCategoryInput, EmailRecipient, EmailRecipientInput,
    EmailTemplate, EmailTemplateInput, SmtpCredentials, SmtpSettingsInput, SmtpSettingsView,
};

const CATEGORY_COLUMNS: &str = "id, category_key, category_name, description, is_active, created_at";

const SMTP_VIEW_COLUMNS: &str = r"
    id, category_id, host, port, secure, username, from_name, from_email, is_active,
    test_status, last_tested
";

const RECIPIENT_COLUMNS: &str =
    "id, category_id, email, name, recipient_type, is_primary, is_active";

const TEMPLATE_COLUMNS: &str = r"
    id, template_key, name, category, subject, body_html, body_text, variables, language,
    is_default, is_active, usage_count, last_used_at, created_at, updated_at
";

/// Outcome of one send attempt, for `email_logs`.
#[derive(Debug, Clone)]
pub struct EmailLogEntry<'e> {
    pub category_id: Option<EmailCategoryId>,
    pub template_id: Option<EmailTemplateId>,
    pub to_email: &'e str,
    pub subject: &'e str,
    pub error: Option<&'e str>,
}

/// Repository for email configuration.
pub struct EmailSettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EmailSettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Every category with its SMTP settings and recipients.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_categories(&self) -> Result<Vec<EmailCategoryDetail>, RepositoryError> {
        let categories = sqlx::query_as::<_, EmailCategory>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM email_categories ORDER BY category_key"
        ))
        .fetch_all(self.pool)
        .await?;

        let smtp = sqlx::query_as::<_, SmtpSettingsView>(&format!(
            "SELECT {SMTP_VIEW_COLUMNS} FROM smtp_settings"
        ))
        .fetch_all(self.pool)
        .await?;

        let recipients = sqlx::query_as::<_, EmailRecipient>(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM email_recipients ORDER BY is_primary DESC, email"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(categories
            .into_iter()
            .map(|category| EmailCategoryDetail {
                smtp: smtp.iter().find(|s| s.category_id == category.id).cloned(),
                recipients: recipients
                    .iter()
                    .filter(|r| r.category_id == category.id)
                    .cloned()
                    .collect(),
                category,
            })
            .collect())
    }

    /// Category by key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn category_by_key(&self, key: &str) -> Result<Option<EmailCategory>, RepositoryError> {
        let row = sqlx::query_as::<_, EmailCategory>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM email_categories WHERE category_key = $1"
        ))
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the key exists.
    pub async fn create_category(
        &self,
        input: &EmailCategoryInput,
    ) -> Result<EmailCategory, RepositoryError> {
        let row = sqlx::query_as::<_, EmailCategory>(&format!(
            r"
            INSERT INTO email_categories (category_key, category_name, description)
            VALUES ($1, $2, $3)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(&input.category_key)
        .bind(&input.category_name)
        .bind(input.description.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "category key already exists"))?;

        Ok(row)
    }

    /// Insert any missing categories. Returns how many were created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn ensure_categories(
        &self,
        defaults: &[(&str, &str, &str)],
    ) -> Result<u64, RepositoryError> {
        let mut created = 0;
        for (key, name, description) in defaults {
            let result = sqlx::query(
                r"
                INSERT INTO email_categories (category_key, category_name, description)
                VALUES ($1, $2, $3)
                ON CONFLICT (category_key) DO NOTHING
                ",
            )
            .bind(key)
            .bind(name)
            .bind(description)
            .execute(self.pool)
            .await?;
            created += result.rows_affected();
        }
        Ok(created)
    }

    // =========================================================================
    // SMTP
    // =========================================================================

    /// Whether a category already has SMTP settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_smtp(&self, category_id: EmailCategoryId) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM smtp_settings WHERE category_id = $1)",
        )
        .bind(category_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Create or replace a category's SMTP settings. A missing password
    /// keeps the stored one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn upsert_smtp(
        &self,
        category_id: EmailCategoryId,
        input: &SmtpSettingsInput,
    ) -> Result<SmtpSettingsView, RepositoryError> {
        sqlx::query_as::<_, SmtpSettingsView>(&format!(
            r"
            INSERT INTO smtp_settings (
                category_id, host, port, secure, username, password, from_name, from_email, is_active
            )
            SELECT c.id, $2, $3, $4, $5,
                   COALESCE($6, (SELECT password FROM smtp_settings WHERE category_id = $1)),
                   $7, $8, $9
            FROM email_categories c WHERE c.id = $1
            ON CONFLICT (category_id) DO UPDATE SET
                host = EXCLUDED.host,
                port = EXCLUDED.port,
                secure = EXCLUDED.secure,
                username = EXCLUDED.username,
                password = EXCLUDED.password,
                from_name = EXCLUDED.from_name,
                from_email = EXCLUDED.from_email,
                is_active = EXCLUDED.is_active,
                test_status = 'untested',
                updated_at = NOW()
            RETURNING {SMTP_VIEW_COLUMNS}
            "
        ))
        .bind(category_id)
        .bind(&input.host)
        .bind(input.port)
        .bind(input.secure)
        .bind(&input.username)
        .bind(input.password.as_deref())
        .bind(&input.from_name)
        .bind(&input.from_email)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Active SMTP credentials of a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn smtp_credentials(
        &self,
        category_id: EmailCategoryId,
    ) -> Result<Option<SmtpCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, SmtpCredentials>(
            r"
            SELECT host, port, secure, username, password, from_name, from_email
            FROM smtp_settings WHERE category_id = $1 AND is_active
            ",
        )
        .bind(category_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Store the result of an SMTP connection test.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category has no SMTP settings.
    pub async fn record_smtp_test(
        &self,
        category_id: EmailCategoryId,
        success: bool,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE smtp_settings SET test_status = $2, last_tested = NOW() WHERE category_id = $1",
        )
        .bind(category_id)
        .bind(if success { "success" } else { "failed" })
        .execute(self.pool)
        .await?;

        require_affected(result.rows_affected())
    }

    // =========================================================================
    // Recipients
    // =========================================================================

    /// Replace a category's recipient list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn replace_recipients(
        &self,
        category_id: EmailCategoryId,
        recipients: &[EmailRecipientInput],
    ) -> Result<Vec<EmailRecipient>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM email_recipients WHERE category_id = $1")
            .bind(category_id)
            .execute(&mut *tx)
            .await?;

        let mut saved = Vec::with_capacity(recipients.len());
        for r in recipients {
            let row = sqlx::query_as::<_, EmailRecipient>(&format!(
                r"
                INSERT INTO email_recipients (category_id, email, name, recipient_type, is_primary, is_active)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {RECIPIENT_COLUMNS}
                "
            ))
            .bind(category_id)
            .bind(&r.email)
            .bind(r.name.as_deref())
            .bind(r.recipient_type.as_str())
            .bind(r.is_primary)
            .bind(r.is_active)
            .fetch_one(&mut *tx)
            .await?;
            saved.push(row);
        }

        tx.commit().await?;
        Ok(saved)
    }

    /// Active recipients of a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recipients(
        &self,
        category_id: EmailCategoryId,
    ) -> Result<Vec<EmailRecipient>, RepositoryError> {
        let rows = sqlx::query_as::<_, EmailRecipient>(&format!(
            r"
            SELECT {RECIPIENT_COLUMNS} FROM email_recipients
            WHERE category_id = $1 AND is_active
            ORDER BY is_primary DESC, email
            "
        ))
        .bind(category_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Templates
    // =========================================================================

    /// Templates, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_templates(
        &self,
        category: Option<&str>,
        language: Option<Language>,
    ) -> Result<Vec<EmailTemplate>, RepositoryError> {
        let rows = sqlx::query_as::<_, EmailTemplate>(&format!(
            r"
            SELECT {TEMPLATE_COLUMNS} FROM email_templates
            WHERE ($1::TEXT IS NULL OR category = $1) AND ($2::TEXT IS NULL OR language = $2)
            ORDER BY category, template_key, language
            "
        ))
        .bind(category)
        .bind(language.map(Language::code))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Template by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_template(&self, id: EmailTemplateId) -> Result<Option<EmailTemplate>, RepositoryError> {
        let row = sqlx::query_as::<_, EmailTemplate>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM email_templates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Active template by key, preferring `language` and falling back to English.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_template(
        &self,
        template_key: &str,
        language: Language,
    ) -> Result<Option<EmailTemplate>, RepositoryError> {
        let row = sqlx::query_as::<_, EmailTemplate>(&format!(
            r"
            SELECT {TEMPLATE_COLUMNS} FROM email_templates
            WHERE template_key = $1 AND is_active AND language IN ($2, 'en')
            ORDER BY (language = $2) DESC
            LIMIT 1
            "
        ))
        .bind(template_key)
        .bind(language.code())
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Create a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the key/language pair exists.
    pub async fn create_template(
        &self,
        input: &EmailTemplateInput,
        created_by: AdminUserId,
    ) -> Result<EmailTemplate, RepositoryError> {
        let row = sqlx::query_as::<_, EmailTemplate>(&format!(
            r"
            INSERT INTO email_templates (
                template_key, name, category, subject, body_html, body_text, variables,
                language, is_active, created_by
            )
            VALUES ($1, $2, COALESCE($3, 'general'), $4, $5, $6, $7, $8, $9, $10)
            RETURNING {TEMPLATE_COLUMNS}
            "
        ))
        .bind(&input.template_key)
        .bind(&input.name)
        .bind(input.category.as_deref())
        .bind(&input.subject)
        .bind(&input.body_html)
        .bind(input.body_text.as_deref())
        .bind(&input.variables)
        .bind(input.language.code())
        .bind(input.is_active)
        .bind(created_by)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "template key already exists for this language"))?;

        Ok(row)
    }

    /// Replace a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the template does not exist.
    pub async fn update_template(
        &self,
        id: EmailTemplateId,
        input: &EmailTemplateInput,
    ) -> Result<EmailTemplate, RepositoryError> {
        sqlx::query_as::<_, EmailTemplate>(&format!(
            r"
            UPDATE email_templates SET
                template_key = $2, name = $3, category = COALESCE($4, category), subject = $5,
                body_html = $6, body_text = $7, variables = $8, language = $9,
                is_active = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING {TEMPLATE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.template_key)
        .bind(&input.name)
        .bind(input.category.as_deref())
        .bind(&input.subject)
        .bind(&input.body_html)
        .bind(input.body_text.as_deref())
        .bind(&input.variables)
        .bind(input.language.code())
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "template key already exists for this language"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the template does not exist.
    pub async fn delete_template(&self, id: EmailTemplateId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM email_templates WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }

    /// Make a template the default of its category and language.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the template does not exist.
    pub async fn set_default_template(
        &self,
        id: EmailTemplateId,
    ) -> Result<EmailTemplate, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            UPDATE email_templates SET is_default = FALSE
            WHERE is_default
              AND (category, language) = (SELECT category, language FROM email_templates WHERE id = $1)
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, EmailTemplate>(&format!(
            r"
            UPDATE email_templates SET is_default = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {TEMPLATE_COLUMNS}
            "
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(row)
    }

    /// Bump usage statistics after a send.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn record_template_use(&self, id: EmailTemplateId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE email_templates SET usage_count = usage_count + 1, last_used_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Append to the send log.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn log_send(&self, entry: &EmailLogEntry<'_>) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO email_logs (category_id, template_id, to_email, subject, status, error_message)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(entry.category_id)
        .bind(entry.template_id)
        .bind(entry.to_email)
        .bind(entry.subject)
        .bind(if entry.error.is_some() { "failed" } else { "sent" })
        .bind(entry.error)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
