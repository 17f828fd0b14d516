//! Database operations for the Momtazchem `PostgreSQL` database.
//!
//! # Tables
//!
//! - `admin_users`, `department_assignments` - back-office accounts
//! - `customers`, `customer_activities` - storefront accounts and CRM log
//! - `shop_products`, `barcode_scan_log` - catalogue
//! - `customer_orders`, `order_items`, `order_number_counters` - orders
//! - `order_management`, `order_status_history`, `payment_receipts`,
//!   `delivery_codes` - department workflow
//! - `vat_settings`, `delivery_methods`, `shipping_rates`, `vehicle_templates`
//! - `iraqi_provinces`, `iraqi_cities`, `international_*` - geography
//! - `email_*`, `smtp_settings`, `sms_*` - messaging configuration
//! - `footer_settings`, `seo_settings`, `aws_s3_settings`, `settings`
//! - `tower_sessions.session` - session store
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! mc-cli migrate
//! ```

pub mod admin_users;
pub mod customers;
pub mod delivery;
pub mod email_settings;
pub mod footer;
pub mod geography;
pub mod order_management;
pub mod orders;
pub mod products;
pub mod reports;
pub mod seo;
pub mod settings;
pub mod sms;
pub mod storage_settings;
pub mod vat;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use admin_users::AdminUserRepository;
pub use customers::CustomerRepository;
pub use delivery::{DeliveryMethodRepository, ShippingRateRepository, VehicleTemplateRepository};
pub use email_settings::EmailSettingsRepository;
pub use footer::FooterRepository;
pub use geography::GeographyRepository;
pub use order_management::OrderManagementRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reports::ReportRepository;
pub use seo::SeoRepository;
pub use sms::SmsRepository;
pub use storage_settings::StorageSettingsRepository;
pub use vat::VatRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique violations to `Conflict`, everything else to `Database`.
    pub(crate) fn unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Error for a `DELETE`/`UPDATE` that touched no rows.
pub(crate) const fn require_affected(rows: u64) -> Result<(), RepositoryError> {
    if rows == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Escape `%` and `_` and wrap in wildcards for `ILIKE`.
pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" acid "), "%acid%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_require_affected() {
        assert!(matches!(require_affected(0), Err(RepositoryError::NotFound)));
        assert!(require_affected(1).is_ok());
    }
}
