//! Catalogue repository: products, barcodes and scan logging.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use momtazchem_core::ProductId;
use momtazchem_core::barcode::{COMPANY_CODE, COUNTRY_PREFIX};

use super::{RepositoryError, like_pattern, require_affected};
use crate::models::product::BarcodeOwner;
use crate::models::{PageParams, Product, ProductInput, QuantityDiscount};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    category: String,
    description: Option<String>,
    price: Decimal,
    price_unit: String,
    sku: String,
    barcode: Option<String>,
    stock_quantity: i32,
    gross_weight_kg: Decimal,
    is_flammable: bool,
    quantity_discounts: Json<Vec<QuantityDiscount>>,
    tax_class: String,
    is_active: bool,
    visible_in_shop: bool,
    show_when_out_of_stock: bool,
    meta_title: Option<String>,
    meta_description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category: row.category,
            description: row.description,
            price: row.price,
            price_unit: row.price_unit,
            sku: row.sku,
            barcode: row.barcode,
            stock_quantity: row.stock_quantity,
            gross_weight_kg: row.gross_weight_kg,
            is_flammable: row.is_flammable,
            quantity_discounts: row.quantity_discounts.0,
            tax_class: row.tax_class,
            is_active: row.is_active,
            visible_in_shop: row.visible_in_shop,
            show_when_out_of_stock: row.show_when_out_of_stock,
            meta_title: row.meta_title,
            meta_description: row.meta_description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = r"
    id, name, category, description, price, price_unit, sku, barcode, stock_quantity,
    gross_weight_kg, is_flammable, quantity_discounts, tax_class, is_active,
    visible_in_shop, show_when_out_of_stock, meta_title, meta_description,
    created_at, updated_at
";

/// Storefront visibility rule.
const LISTED: &str =
    "is_active AND visible_in_shop AND (stock_quantity > 0 OR show_when_out_of_stock)";

/// Storefront filter: optional category, optional name/description/sku search.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter<'s> {
    pub category: Option<&'s str>,
    pub search: Option<&'s str>,
    pub listed_only: bool,
}

/// Repository for catalogue operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Filtered page of products plus the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter<'_>,
        page: PageParams,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let category = filter.category.filter(|c| !c.trim().is_empty());
        let pattern = filter
            .search
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);
        let listed = if filter.listed_only { LISTED } else { "TRUE" };
        let where_clause = format!(
            r"
            {listed}
            AND ($1::TEXT IS NULL OR category = $1)
            AND ($2::TEXT IS NULL OR name ILIKE $2 OR description ILIKE $2 OR sku ILIKE $2)
            "
        );

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM shop_products WHERE {where_clause}"
        ))
        .bind(category)
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM shop_products
            WHERE {where_clause}
            ORDER BY name
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(category)
        .bind(pattern.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Get a product by ID regardless of visibility.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop_products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Load several products at once. Missing IDs are simply absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop_products WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Distinct categories of listed products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query_scalar::<_, String>(&format!(
            "SELECT DISTINCT category FROM shop_products WHERE {LISTED} ORDER BY category"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Listed products of a category, for AI prompts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sample_for_category(
        &self,
        category: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM shop_products
            WHERE {LISTED} AND ($1::TEXT IS NULL OR category = $1)
            ORDER BY updated_at DESC
            LIMIT $2
            "
        ))
        .bind(category)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a product from validated input.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU or barcode is taken.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop_products (
                name, category, description, price, price_unit, sku, barcode,
                stock_quantity, gross_weight_kg, is_flammable, quantity_discounts,
                tax_class, is_active, visible_in_shop, show_when_out_of_stock,
                meta_title, meta_description
            )
            VALUES ($1, $2, $3, $4, COALESCE($5, 'unit'), $6, $7, $8, $9, $10, $11,
                    COALESCE($12, 'standard'), $13, $14, $15, $16, $17)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(&input.category)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.price_unit.as_deref())
        .bind(&input.sku)
        .bind(input.barcode.as_deref())
        .bind(input.stock_quantity)
        .bind(input.gross_weight_kg)
        .bind(input.is_flammable)
        .bind(Json(&input.quantity_discounts))
        .bind(input.tax_class.as_deref())
        .bind(input.is_active)
        .bind(input.visible_in_shop)
        .bind(input.show_when_out_of_stock)
        .bind(input.meta_title.as_deref())
        .bind(input.meta_description.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "sku or barcode already exists"))?;

        Ok(row.into())
    }

    /// Replace a product from validated input.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist, or
    /// `Conflict` if the SKU or barcode is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop_products SET
                name = $2, category = $3, description = $4, price = $5,
                price_unit = COALESCE($6, price_unit), sku = $7, barcode = $8,
                stock_quantity = $9, gross_weight_kg = $10, is_flammable = $11,
                quantity_discounts = $12, tax_class = COALESCE($13, tax_class),
                is_active = $14, visible_in_shop = $15, show_when_out_of_stock = $16,
                meta_title = $17, meta_description = $18, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.category)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.price_unit.as_deref())
        .bind(&input.sku)
        .bind(input.barcode.as_deref())
        .bind(input.stock_quantity)
        .bind(input.gross_weight_kg)
        .bind(input.is_flammable)
        .bind(Json(&input.quantity_discounts))
        .bind(input.tax_class.as_deref())
        .bind(input.is_active)
        .bind(input.visible_in_shop)
        .bind(input.show_when_out_of_stock)
        .bind(input.meta_title.as_deref())
        .bind(input.meta_description.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "sku or barcode already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a product. Order lines keep their snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop_products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }

    // =========================================================================
    // Barcodes
    // =========================================================================

    /// Product holding `barcode`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop_products WHERE barcode = $1"
        ))
        .bind(barcode)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Another product already using `barcode`, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn barcode_owner(
        &self,
        barcode: &str,
        exclude: Option<ProductId>,
    ) -> Result<Option<BarcodeOwner>, RepositoryError> {
        let owner = sqlx::query_as::<_, BarcodeOwner>(
            r"
            SELECT id, name, sku FROM shop_products
            WHERE barcode = $1 AND ($2::INTEGER IS NULL OR id <> $2)
            ",
        )
        .bind(barcode)
        .bind(exclude)
        .fetch_optional(self.pool)
        .await?;

        Ok(owner)
    }

    /// Barcodes already issued under our GS1 company prefix.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn company_barcodes(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT barcode FROM shop_products WHERE barcode LIKE $1",
        )
        .bind(format!("{COUNTRY_PREFIX}{COMPANY_CODE}%"))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Store a barcode on a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist, or
    /// `Conflict` if another product holds the barcode.
    pub async fn set_barcode(
        &self,
        id: ProductId,
        barcode: &str,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop_products SET barcode = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(barcode)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "barcode already assigned to another product"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Record a hardware or manual scan.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn log_scan(
        &self,
        barcode: &str,
        product_id: Option<ProductId>,
        scan_type: &str,
        scanner_id: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO barcode_scan_log (barcode, product_id, scan_type, scanner_id)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(barcode)
        .bind(product_id)
        .bind(scan_type)
        .bind(scanner_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
