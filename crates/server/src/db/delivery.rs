//! Delivery methods, shipping rates and vehicle templates.

use sqlx::PgPool;

use momtazchem_core::{DeliveryMethodId, ShippingRateId, VehicleTemplateId};

use super::{RepositoryError, require_affected};
use crate::models::logistics::{
    DeliveryMethod, DeliveryMethodInput, ShippingRate, ShippingRateInput, VehicleTemplate,
    VehicleTemplateInput,
};

const METHOD_COLUMNS: &str = r"
    id, value, label, icon, color, base_cost, cost_per_kg, minimum_order,
    free_shipping_threshold, estimated_days, max_distance_km, available_areas, is_active,
    sort_order, description, created_at, updated_at
";

const RATE_COLUMNS: &str = r"
    id, delivery_method, province_name, city_name, min_weight_kg, max_weight_kg, base_price,
    price_per_kg, free_shipping_threshold, estimated_days, is_active, description, created_at
";

const VEHICLE_COLUMNS: &str = r"
    id, name, vehicle_type, max_weight_kg, base_price, price_per_km, supports_hazardous,
    estimated_hours, is_active, created_at, updated_at
";

// =============================================================================
// Delivery methods
// =============================================================================

/// Repository for checkout delivery methods.
pub struct DeliveryMethodRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DeliveryMethodRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Methods sorted for display.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, active_only: bool) -> Result<Vec<DeliveryMethod>, RepositoryError> {
        let rows = sqlx::query_as::<_, DeliveryMethod>(&format!(
            r"
            SELECT {METHOD_COLUMNS} FROM delivery_methods
            WHERE (is_active OR NOT $1)
            ORDER BY sort_order, label
            "
        ))
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create a method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the value slug exists.
    pub async fn create(&self, input: &DeliveryMethodInput) -> Result<DeliveryMethod, RepositoryError> {
        let row = sqlx::query_as::<_, DeliveryMethod>(&format!(
            r"
            INSERT INTO delivery_methods (
                value, label, icon, color, base_cost, cost_per_kg, minimum_order,
                free_shipping_threshold, estimated_days, max_distance_km, available_areas,
                is_active, sort_order, description
            )
            VALUES ($1, $2, COALESCE($3, 'truck'), COALESCE($4, 'blue'), $5, $6, $7, $8,
                    COALESCE($9, 3), $10, $11, $12, $13, $14)
            RETURNING {METHOD_COLUMNS}
            "
        ))
        .bind(&input.value)
        .bind(&input.label)
        .bind(input.icon.as_deref())
        .bind(input.color.as_deref())
        .bind(input.base_cost)
        .bind(input.cost_per_kg)
        .bind(input.minimum_order)
        .bind(input.free_shipping_threshold)
        .bind(input.estimated_days)
        .bind(input.max_distance_km)
        .bind(&input.available_areas)
        .bind(input.is_active)
        .bind(input.sort_order)
        .bind(input.description.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "delivery method value already exists"))?;

        Ok(row)
    }

    /// Replace a method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the method does not exist.
    pub async fn update(
        &self,
        id: DeliveryMethodId,
        input: &DeliveryMethodInput,
    ) -> Result<DeliveryMethod, RepositoryError> {
        sqlx::query_as::<_, DeliveryMethod>(&format!(
            r"
            UPDATE delivery_methods SET
                value = $2, label = $3, icon = COALESCE($4, icon), color = COALESCE($5, color),
                base_cost = $6, cost_per_kg = $7, minimum_order = $8,
                free_shipping_threshold = $9, estimated_days = COALESCE($10, estimated_days),
                max_distance_km = $11, available_areas = $12, is_active = $13,
                sort_order = $14, description = $15, updated_at = NOW()
            WHERE id = $1
            RETURNING {METHOD_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.value)
        .bind(&input.label)
        .bind(input.icon.as_deref())
        .bind(input.color.as_deref())
        .bind(input.base_cost)
        .bind(input.cost_per_kg)
        .bind(input.minimum_order)
        .bind(input.free_shipping_threshold)
        .bind(input.estimated_days)
        .bind(input.max_distance_km)
        .bind(&input.available_areas)
        .bind(input.is_active)
        .bind(input.sort_order)
        .bind(input.description.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "delivery method value already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the method does not exist.
    pub async fn delete(&self, id: DeliveryMethodId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM delivery_methods WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }
}

// =============================================================================
// Shipping rates
// =============================================================================

/// Repository for regional shipping rates.
pub struct ShippingRateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingRateRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Rates, optionally for one delivery method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, delivery_method: Option<&str>) -> Result<Vec<ShippingRate>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShippingRate>(&format!(
            r"
            SELECT {RATE_COLUMNS} FROM shipping_rates
            WHERE ($1::TEXT IS NULL OR delivery_method = $1)
            ORDER BY delivery_method, province_name NULLS FIRST, city_name NULLS FIRST, min_weight_kg
            "
        ))
        .bind(delivery_method)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create a rate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &ShippingRateInput) -> Result<ShippingRate, RepositoryError> {
        let row = sqlx::query_as::<_, ShippingRate>(&format!(
            r"
            INSERT INTO shipping_rates (
                delivery_method, province_name, city_name, min_weight_kg, max_weight_kg,
                base_price, price_per_kg, free_shipping_threshold, estimated_days,
                is_active, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {RATE_COLUMNS}
            "
        ))
        .bind(&input.delivery_method)
        .bind(input.province_name.as_deref())
        .bind(input.city_name.as_deref())
        .bind(input.min_weight_kg)
        .bind(input.max_weight_kg)
        .bind(input.base_price)
        .bind(input.price_per_kg)
        .bind(input.free_shipping_threshold)
        .bind(input.estimated_days)
        .bind(input.is_active)
        .bind(input.description.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// Replace a rate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rate does not exist.
    pub async fn update(
        &self,
        id: ShippingRateId,
        input: &ShippingRateInput,
    ) -> Result<ShippingRate, RepositoryError> {
        sqlx::query_as::<_, ShippingRate>(&format!(
            r"
            UPDATE shipping_rates SET
                delivery_method = $2, province_name = $3, city_name = $4, min_weight_kg = $5,
                max_weight_kg = $6, base_price = $7, price_per_kg = $8,
                free_shipping_threshold = $9, estimated_days = $10, is_active = $11,
                description = $12
            WHERE id = $1
            RETURNING {RATE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.delivery_method)
        .bind(input.province_name.as_deref())
        .bind(input.city_name.as_deref())
        .bind(input.min_weight_kg)
        .bind(input.max_weight_kg)
        .bind(input.base_price)
        .bind(input.price_per_kg)
        .bind(input.free_shipping_threshold)
        .bind(input.estimated_days)
        .bind(input.is_active)
        .bind(input.description.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a rate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rate does not exist.
    pub async fn delete(&self, id: ShippingRateId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shipping_rates WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }
}

// =============================================================================
// Vehicle templates
// =============================================================================

/// Repository for the vehicle fleet catalogue.
pub struct VehicleTemplateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VehicleTemplateRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Templates, lightest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, active_only: bool) -> Result<Vec<VehicleTemplate>, RepositoryError> {
        let rows = sqlx::query_as::<_, VehicleTemplate>(&format!(
            r"
            SELECT {VEHICLE_COLUMNS} FROM vehicle_templates
            WHERE (is_active OR NOT $1)
            ORDER BY max_weight_kg, name
            "
        ))
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &VehicleTemplateInput) -> Result<VehicleTemplate, RepositoryError> {
        let row = sqlx::query_as::<_, VehicleTemplate>(&format!(
            r"
            INSERT INTO vehicle_templates (
                name, vehicle_type, max_weight_kg, base_price, price_per_km,
                supports_hazardous, estimated_hours, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {VEHICLE_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(&input.vehicle_type)
        .bind(input.max_weight_kg)
        .bind(input.base_price)
        .bind(input.price_per_km)
        .bind(input.supports_hazardous)
        .bind(input.estimated_hours.as_deref())
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// Replace a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the template does not exist.
    pub async fn update(
        &self,
        id: VehicleTemplateId,
        input: &VehicleTemplateInput,
    ) -> Result<VehicleTemplate, RepositoryError> {
        sqlx::query_as::<_, VehicleTemplate>(&format!(
            r"
            UPDATE vehicle_templates SET
                name = $2, vehicle_type = $3, max_weight_kg = $4, base_price = $5,
                price_per_km = $6, supports_hazardous = $7, estimated_hours = $8,
                is_active = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {VEHICLE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.vehicle_type)
        .bind(input.max_weight_kg)
        .bind(input.base_price)
        .bind(input.price_per_km)
        .bind(input.supports_hazardous)
        .bind(input.estimated_hours.as_deref())
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the template does not exist.
    pub async fn delete(&self, id: VehicleTemplateId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM vehicle_templates WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }
}
