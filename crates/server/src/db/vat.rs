//! VAT settings repository.

use sqlx::PgPool;

use momtazchem_core::AdminUserId;

use super::RepositoryError;
use crate::models::logistics::{VatSettings, VatSettingsInput};

const VAT_COLUMNS: &str = r"
    id, vat_rate, vat_enabled, exempt_categories, exempt_product_ids, default_region,
    vat_included_in_price, vat_display_name, vat_number, shipping_taxable,
    minimum_taxable_amount, is_active, effective_date, notes, updated_by, updated_at
";

/// Repository for the active VAT configuration.
pub struct VatRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VatRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The active settings row, if one was ever saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active(&self) -> Result<Option<VatSettings>, RepositoryError> {
        let row = sqlx::query_as::<_, VatSettings>(&format!(
            "SELECT {VAT_COLUMNS} FROM vat_settings WHERE is_active ORDER BY updated_at DESC LIMIT 1"
        ))
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Overwrite the active row, creating it on first save.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn upsert(
        &self,
        input: &VatSettingsInput,
        updated_by: AdminUserId,
    ) -> Result<VatSettings, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM vat_settings WHERE is_active ORDER BY updated_at DESC LIMIT 1 FOR UPDATE",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let sql = if existing.is_some() {
            format!(
                r"
                UPDATE vat_settings SET
                    vat_rate = $2, vat_enabled = $3, exempt_categories = $4,
                    exempt_product_ids = $5, default_region = COALESCE($6, default_region),
                    vat_included_in_price = $7, vat_display_name = COALESCE($8, vat_display_name),
                    vat_number = $9, shipping_taxable = $10, minimum_taxable_amount = $11,
                    effective_date = COALESCE($12, effective_date), notes = $13,
                    updated_by = $14, updated_at = NOW()
                WHERE id = $1
                RETURNING {VAT_COLUMNS}
                "
            )
        } else {
            format!(
                r"
                INSERT INTO vat_settings (
                    vat_rate, vat_enabled, exempt_categories, exempt_product_ids, default_region,
                    vat_included_in_price, vat_display_name, vat_number, shipping_taxable,
                    minimum_taxable_amount, effective_date, notes, updated_by
                )
                SELECT $2, $3, $4, $5, COALESCE($6, 'Iraq'), $7, COALESCE($8, 'VAT'), $9, $10,
                       $11, COALESCE($12, CURRENT_DATE), $13, $14
                WHERE $1::INTEGER IS NULL
                RETURNING {VAT_COLUMNS}
                "
            )
        };

        let row = sqlx::query_as::<_, VatSettings>(&sql)
            .bind(existing)
            .bind(input.vat_rate)
            .bind(input.vat_enabled)
            .bind(&input.exempt_categories)
            .bind(&input.exempt_product_ids)
            .bind(input.default_region.as_deref())
            .bind(input.vat_included_in_price)
            .bind(input.vat_display_name.as_deref())
            .bind(input.vat_number.as_deref())
            .bind(input.shipping_taxable)
            .bind(input.minimum_taxable_amount)
            .bind(input.effective_date)
            .bind(input.notes.as_deref())
            .bind(updated_by)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }
}
