//! HTTP route handlers.
//!
//! Every JSON endpoint answers with the `{success, data, message}` envelope.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                               - Liveness
//! GET  /health/ready                         - Readiness (database ping)
//!
//! # Auth
//! POST /api/admin/login | logout, GET /api/admin/me
//! POST /api/customers/register | login | logout, GET /api/customers/me
//! GET|POST /api/admin/users, PUT|DELETE /api/admin/users/{id}      (super admin)
//! GET|POST /api/admin/departments, DELETE /api/admin/departments/{id}
//!
//! # Catalogue and barcodes
//! GET  /api/shop/products, /api/shop/products/{id}, /api/shop/categories
//! GET|POST /api/admin/products, GET|PUT|DELETE /api/admin/products/{id}
//! GET  /api/barcode/validate/{code}, /api/barcode/check-duplicate/{code}
//! GET  /api/barcode/{code}/svg, /api/products/barcode/{code}
//! POST /api/barcode/log, /api/admin/barcode/generate
//! PUT  /api/admin/products/{id}/barcode
//!
//! # Checkout
//! POST /api/shop/checkout/quote, /api/shop/orders
//! GET  /api/shop/orders/track/{order_number}, /api/customers/orders
//! POST /api/customers/orders/{id}/receipt                          (multipart)
//!
//! # Department workflow
//! GET  /api/{financial|warehouse|logistics}/orders
//! GET  /api/orders/{id}/history
//! POST /api/financial/orders/{id}/{review|approve|reject}
//! GET  /api/financial/orders/{id}/receipt
//! POST /api/warehouse/orders/{id}/{process|approve|reject}
//! POST /api/logistics/orders/{id}/{assign|dispatch|verify-delivery|complete}
//! POST /api/admin/orders/{id}/cancel
//!
//! # Logistics configuration
//! GET  /api/shop/vat, GET|PUT /api/financial/vat-settings
//! GET  /api/shop/delivery-methods, /api/admin/delivery-methods[/{id}]
//! /api/logistics/{shipping-rates|international-countries|international-cities|vehicle-templates}[/{id}]
//! GET  /api/iraqi-provinces, /api/iraqi-cities
//! /api/admin/geography/{provinces|cities}[/{id}]
//! POST /api/logistics/calculate-vehicle
//!
//! # Messaging
//! /api/admin/email/{categories|init-categories|smtp|test-smtp|recipients}
//! /api/email-templates[/{id}[/set-default]], POST /api/templates/preview
//! POST /api/admin/detect-provider
//! /api/admin/sms/{settings|categories|templates|test}
//!
//! # Content, storage, documents, CRM
//! GET  /api/footer-settings, /api/admin/footer-settings[/{language}]
//! /api/admin/seo/{settings|ai-generate|keywords}, /api/admin/ai/{product-description|sku}
//! /api/admin/aws-s3-settings[/test], POST /api/admin/upload/image
//! GET  /api/documents/invoices/{order_id}, /api/documents/reports/orders
//! /api/crm/customers[/{id}[/activities]], GET /api/crm/dashboard
//! GET|PUT /api/admin/preferences/refresh
//! ```

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::state::AppState;

pub mod admin_users;
pub mod auth;
pub mod barcode;
pub mod checkout;
pub mod content;
pub mod crm;
pub mod documents;
pub mod email;
pub mod logistics;
pub mod preferences;
pub mod products;
pub mod seo;
pub mod sms;
pub mod storage;
pub mod workflow;

/// All application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(auth::router())
        .merge(admin_users::router())
        .merge(products::router())
        .merge(barcode::router())
        .merge(checkout::router())
        .merge(workflow::router())
        .merge(logistics::router())
        .merge(email::router())
        .merge(sms::router())
        .merge(content::router())
        .merge(seo::router())
        .merge(storage::router())
        .merge(documents::router())
        .merge(crm::router())
        .merge(preferences::router())
}

/// Liveness health check. Does not touch dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check: 503 when the database is unreachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
