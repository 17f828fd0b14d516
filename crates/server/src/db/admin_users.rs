//! Admin user and department assignment repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use momtazchem_core::{AdminRole, AdminUserId, Department, DepartmentAssignmentId, Email};

use super::{RepositoryError, require_affected};
use crate::models::{AdminUser, DepartmentAssignment};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct AdminUserRow {
    id: i32,
    email: String,
    name: String,
    role: AdminRole,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AdminUserRow> for AdminUser {
    type Error = RepositoryError;

    fn try_from(row: AdminUserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: AdminUserId::new(row.id),
            email,
            name: row.name,
            role: row.role,
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdminCredentialRow {
    #[sqlx(flatten)]
    user: AdminUserRow,
    password_hash: String,
}

const ADMIN_COLUMNS: &str =
    "id, email, name, role, is_active, last_login_at, created_at, updated_at";

/// Changes an admin may receive from a super admin.
#[derive(Debug, Clone)]
pub struct AdminUserUpdate {
    pub name: Option<String>,
    pub role: Option<AdminRole>,
    pub is_active: Option<bool>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for admin user database operations.
pub struct AdminUserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminUserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all admin users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn list_all(&self) -> Result<Vec<AdminUser>, RepositoryError> {
        let rows = sqlx::query_as::<_, AdminUserRow>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admin_users ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get an admin user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: AdminUserId) -> Result<Option<AdminUser>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admin_users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an admin and their password hash for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(AdminUser, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminCredentialRow>(&format!(
            "SELECT {ADMIN_COLUMNS}, password_hash FROM admin_users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((r.user.try_into()?, r.password_hash)))
            .transpose()
    }

    /// Create a new admin user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create(
        &self,
        email: &Email,
        name: &str,
        role: AdminRole,
        password_hash: &str,
    ) -> Result<AdminUser, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            r"
            INSERT INTO admin_users (email, name, role, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {ADMIN_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .bind(name)
        .bind(role)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "email already exists"))?;

        row.try_into()
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the admin does not exist.
    pub async fn update(
        &self,
        id: AdminUserId,
        update: &AdminUserUpdate,
    ) -> Result<AdminUser, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            r"
            UPDATE admin_users
            SET name = COALESCE($2, name),
                role = COALESCE($3, role),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ADMIN_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.role)
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Replace an admin's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the admin does not exist.
    pub async fn set_password(
        &self,
        id: AdminUserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE admin_users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        require_affected(result.rows_affected())
    }

    /// Delete an admin user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the admin does not exist.
    pub async fn delete(&self, id: AdminUserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM admin_users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }

    /// Stamp a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_login(&self, id: AdminUserId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE admin_users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Department assignments
    // =========================================================================

    /// List every assignment with the admin's name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_assignments(&self) -> Result<Vec<DepartmentAssignment>, RepositoryError> {
        let rows = sqlx::query_as::<_, DepartmentAssignment>(
            r"
            SELECT da.id, da.admin_user_id, au.name AS admin_name, au.email AS admin_email,
                   da.department, da.is_active, da.created_at
            FROM department_assignments da
            JOIN admin_users au ON au.id = da.admin_user_id
            ORDER BY da.department, au.name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Assign an admin to a department, reactivating an old assignment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the admin does not exist.
    pub async fn assign(
        &self,
        admin_id: AdminUserId,
        department: Department,
        assigned_by: AdminUserId,
    ) -> Result<DepartmentAssignment, RepositoryError> {
        let id = sqlx::query_scalar::<_, DepartmentAssignmentId>(
            r"
            INSERT INTO department_assignments (admin_user_id, department, assigned_by)
            SELECT id, $2, $3 FROM admin_users WHERE id = $1
            ON CONFLICT (admin_user_id, department)
            DO UPDATE SET is_active = TRUE, assigned_by = EXCLUDED.assigned_by
            RETURNING id
            ",
        )
        .bind(admin_id)
        .bind(department)
        .bind(assigned_by)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let row = sqlx::query_as::<_, DepartmentAssignment>(
            r"
            SELECT da.id, da.admin_user_id, au.name AS admin_name, au.email AS admin_email,
                   da.department, da.is_active, da.created_at
            FROM department_assignments da
            JOIN admin_users au ON au.id = da.admin_user_id
            WHERE da.id = $1
            ",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// Remove an assignment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the assignment does not exist.
    pub async fn remove_assignment(&self, id: DepartmentAssignmentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM department_assignments WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }

    /// Whether the admin is actively assigned to the department.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_assigned(
        &self,
        admin_id: AdminUserId,
        department: Department,
    ) -> Result<bool, RepositoryError> {
        let assigned = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM department_assignments
                WHERE admin_user_id = $1 AND department = $2 AND is_active
            )
            ",
        )
        .bind(admin_id)
        .bind(department)
        .fetch_one(self.pool)
        .await?;

        Ok(assigned)
    }

    /// Departments an admin currently works in.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn departments_for(
        &self,
        admin_id: AdminUserId,
    ) -> Result<Vec<Department>, RepositoryError> {
        let rows = sqlx::query_scalar::<_, Department>(
            r"
            SELECT department FROM department_assignments
            WHERE admin_user_id = $1 AND is_active
            ORDER BY department
            ",
        )
        .bind(admin_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
