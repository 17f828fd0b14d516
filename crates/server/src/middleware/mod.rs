//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (honour or generate `x-request-id`)
//! 4. Security headers
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Rate limiting on login/register routes (governor)
//!
//! Authentication is enforced per handler through the extractors in [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    AdminOrCustomer, Financial, Logistics, OptionalCustomer, RequireAdminAuth,
    RequireAdminSession, RequireCustomer, RequireDepartment, RequireSuperAdmin, Warehouse,
    clear_current_admin, clear_current_customer, set_current_admin, set_current_customer,
};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
