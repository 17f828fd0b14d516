//! Login, logout and identity endpoints for admins and customers.
//!
//! Both identities share one session cookie. Login and registration are
//! rate limited per client IP.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use momtazchem_core::{AdminRole, AdminUserId, Department, Email};

use crate::db::{AdminUserRepository, CustomerRepository};
use crate::error::{ApiResponse, ApiResult, AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    RequireAdminAuth, RequireCustomer, auth_rate_limiter, clear_current_admin,
    clear_current_customer, set_current_admin, set_current_customer,
};
use crate::models::{CurrentAdmin, CurrentCustomer, Customer, CustomerInput};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    let credentials = Router::new()
        .route("/api/admin/login", post(admin_login))
        .route("/api/customers/register", post(customer_register))
        .route("/api/customers/login", post(customer_login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/api/admin/logout", post(admin_logout))
        .route("/api/admin/me", get(admin_me))
        .route("/api/customers/logout", post(customer_logout))
        .route("/api/customers/me", get(customer_me))
        .merge(credentials)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub customer: CustomerInput,
    pub password: String,
}

/// The signed-in admin plus their department memberships.
#[derive(Debug, Serialize)]
pub struct AdminProfile {
    pub id: AdminUserId,
    pub email: Email,
    pub name: String,
    pub role: AdminRole,
    pub departments: Vec<Department>,
}

async fn profile(state: &AppState, admin: CurrentAdmin) -> Result<AdminProfile, AppError> {
    let departments = if admin.role == AdminRole::SuperAdmin {
        Department::ALL.to_vec()
    } else {
        AdminUserRepository::new(state.pool())
            .departments_for(admin.id)
            .await?
    };
    Ok(AdminProfile {
        id: admin.id,
        email: admin.email,
        name: admin.name,
        role: admin.role,
        departments,
    })
}

/// POST /api/admin/login
#[instrument(skip(state, session, req), fields(email = %req.email))]
async fn admin_login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> ApiResult<AdminProfile> {
    let admin = AuthService::new(state.pool())
        .login_admin(&req.email, &req.password)
        .await?;

    let current = CurrentAdmin::from(&admin);
    set_current_admin(&session, &current).await?;
    set_sentry_user(admin.id.as_i32(), Some(admin.email.as_str()));
    tracing::info!(admin_id = %admin.id, "Admin logged in");

    Ok(ApiResponse::with_message(
        profile(&state, current).await?,
        "Logged in",
    ))
}

/// POST /api/admin/logout
async fn admin_logout(session: Session) -> ApiResult<()> {
    clear_current_admin(&session).await?;
    clear_sentry_user();
    Ok(ApiResponse::message("Logged out"))
}

/// GET /api/admin/me
async fn admin_me(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> ApiResult<AdminProfile> {
    Ok(ApiResponse::ok(profile(&state, admin).await?))
}

/// POST /api/customers/register
#[instrument(skip(state, session, req), fields(email = %req.customer.email))]
async fn customer_register(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Customer> {
    let mut fields = req.customer.validate().map_err(AppError::BadRequest)?;
    fields.customer_source = "website".to_owned();

    let customer = AuthService::new(state.pool())
        .register_customer(&fields, &req.password)
        .await?;
    set_current_customer(&session, &CurrentCustomer::from(&customer)).await?;
    tracing::info!(customer_id = %customer.id, "Customer registered");

    Ok(ApiResponse::with_message(customer, "Account created"))
}

/// POST /api/customers/login
#[instrument(skip(state, session, req), fields(email = %req.email))]
async fn customer_login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Customer> {
    let customer = AuthService::new(state.pool())
        .login_customer(&req.email, &req.password)
        .await?;
    set_current_customer(&session, &CurrentCustomer::from(&customer)).await?;

    Ok(ApiResponse::with_message(customer, "Logged in"))
}

/// POST /api/customers/logout
async fn customer_logout(session: Session) -> ApiResult<()> {
    clear_current_customer(&session).await?;
    Ok(ApiResponse::message("Logged out"))
}

/// GET /api/customers/me
async fn customer_me(
    RequireCustomer(current): RequireCustomer,
    State(state): State<AppState>,
) -> ApiResult<Customer> {
    let customer = CustomerRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("customer".to_owned()))?;
    Ok(ApiResponse::ok(customer))
}
