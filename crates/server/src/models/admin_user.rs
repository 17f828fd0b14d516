//! Admin user domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use momtazchem_core::{AdminRole, AdminUserId, Department, DepartmentAssignmentId, Email};

/// A back-office account.
#[derive(Debug, Clone, Serialize)]
pub struct AdminUser {
    pub id: AdminUserId,
    pub email: Email,
    pub name: String,
    pub role: AdminRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An admin's membership in a workflow department.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DepartmentAssignment {
    pub id: DepartmentAssignmentId,
    pub admin_user_id: AdminUserId,
    pub admin_name: String,
    pub admin_email: String,
    pub department: Department,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
