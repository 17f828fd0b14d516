//! Admin account and department assignment management (super admin only).

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, put},
};
use serde::Deserialize;
use tracing::instrument;

use momtazchem_core::{AdminRole, AdminUserId, Department, DepartmentAssignmentId};

use crate::db::AdminUserRepository;
use crate::db::admin_users::AdminUserUpdate;
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::middleware::RequireSuperAdmin;
use crate::models::{AdminUser, DepartmentAssignment, clean_optional};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Build the admin users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(index).post(create))
        .route("/api/admin/users/{id}", put(update).delete(remove))
        .route("/api/admin/departments", get(assignments).post(assign))
        .route("/api/admin/departments/{id}", delete(unassign))
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub email: String,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: AdminRole,
    pub password: String,
}

const fn default_role() -> AdminRole {
    AdminRole::Admin
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdminRequest {
    pub name: Option<String>,
    pub role: Option<AdminRole>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub admin_user_id: AdminUserId,
    pub department: Department,
}

/// GET /api/admin/users
async fn index(
    RequireSuperAdmin(_): RequireSuperAdmin,
    State(state): State<AppState>,
) -> ApiResult<Vec<AdminUser>> {
    let users = AdminUserRepository::new(state.pool()).list_all().await?;
    Ok(ApiResponse::ok(users))
}

/// POST /api/admin/users
#[instrument(skip(admin, state, req), fields(email = %req.email))]
async fn create(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Json(req): Json<CreateAdminRequest>,
) -> ApiResult<AdminUser> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_owned()));
    }
    let user = AuthService::new(state.pool())
        .create_admin(&req.email, &req.name, req.role, &req.password)
        .await?;
    tracing::info!(created_by = %admin.id, admin_id = %user.id, "Admin user created");
    Ok(ApiResponse::with_message(user, "Admin user created"))
}

/// PUT /api/admin/users/{id}
#[instrument(skip(admin, state, req))]
async fn update(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<AdminUserId>,
    Json(req): Json<UpdateAdminRequest>,
) -> ApiResult<AdminUser> {
    if id == admin.id && (req.is_active == Some(false) || req.role.is_some_and(|r| r != admin.role))
    {
        return Err(AppError::BadRequest(
            "you cannot deactivate or demote your own account".to_owned(),
        ));
    }

    if let Some(password) = clean_optional(req.password) {
        AuthService::new(state.pool())
            .set_admin_password(id, &password)
            .await?;
    }

    let changes = AdminUserUpdate {
        name: clean_optional(req.name),
        role: req.role,
        is_active: req.is_active,
    };
    let user = AdminUserRepository::new(state.pool())
        .update(id, &changes)
        .await?;
    Ok(ApiResponse::ok(user))
}

/// DELETE /api/admin/users/{id}
#[instrument(skip(admin, state))]
async fn remove(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<AdminUserId>,
) -> ApiResult<()> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "you cannot delete your own account".to_owned(),
        ));
    }
    AdminUserRepository::new(state.pool()).delete(id).await?;
    tracing::info!(deleted_by = %admin.id, admin_id = %id, "Admin user deleted");
    Ok(ApiResponse::message("Admin user deleted"))
}

/// GET /api/admin/departments
async fn assignments(
    RequireSuperAdmin(_): RequireSuperAdmin,
    State(state): State<AppState>,
) -> ApiResult<Vec<DepartmentAssignment>> {
    let rows = AdminUserRepository::new(state.pool())
        .list_assignments()
        .await?;
    Ok(ApiResponse::ok(rows))
}

/// POST /api/admin/departments
#[instrument(skip(admin, state))]
async fn assign(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<DepartmentAssignment> {
    let assignment = AdminUserRepository::new(state.pool())
        .assign(req.admin_user_id, req.department, admin.id)
        .await?;
    Ok(ApiResponse::with_message(assignment, "Department assigned"))
}

/// DELETE /api/admin/departments/{id}
async fn unassign(
    RequireSuperAdmin(_): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<DepartmentAssignmentId>,
) -> ApiResult<()> {
    AdminUserRepository::new(state.pool())
        .remove_assignment(id)
        .await?;
    Ok(ApiResponse::message("Assignment removed"))
}
