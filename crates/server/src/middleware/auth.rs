//! Authentication extractors.
//!
//! Identities live in the session (see [`crate::models::session_keys`]).
//! Every extractor rejects with an [`AppError`], so failures use the same
//! JSON envelope as handler errors.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{Method, request::Parts},
};
use tower_sessions::Session;

use momtazchem_core::{AdminRole, Department};

use crate::db::AdminUserRepository;
use crate::error::AppError;
use crate::models::{CurrentAdmin, CurrentCustomer, session_keys};
use crate::state::AppState;

fn session(parts: &Parts) -> Result<&Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))
}

async fn session_admin(parts: &Parts) -> Result<CurrentAdmin, AppError> {
    session(parts)?
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?
        .ok_or_else(|| AppError::Unauthorized("admin login required".to_owned()))
}

/// The session admin. Read-only roles may only issue safe requests.
async fn current_admin(parts: &Parts) -> Result<CurrentAdmin, AppError> {
    let admin = session_admin(parts).await?;
    if !admin.role.can_write() && !is_safe(&parts.method) {
        return Err(AppError::Forbidden("read-only account".to_owned()));
    }
    Ok(admin)
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Requires a logged-in admin.
pub struct RequireAdminAuth(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireAdminAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_admin(parts).await.map(Self)
    }
}

/// Requires a logged-in admin of any role, for any method. Only for the
/// admin's own settings; shared data goes through [`RequireAdminAuth`].
pub struct RequireAdminSession(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireAdminSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_admin(parts).await.map(Self)
    }
}

/// Requires a logged-in super admin.
pub struct RequireSuperAdmin(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireSuperAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts).await?;
        if admin.role != AdminRole::SuperAdmin {
            return Err(AppError::Forbidden(
                "only super admins can access this resource".to_owned(),
            ));
        }
        Ok(Self(admin))
    }
}

/// A department whose endpoints are guarded by [`RequireDepartment`].
pub trait DepartmentScope: Send + Sync + 'static {
    const DEPARTMENT: Department;
}

pub struct Financial;
pub struct Warehouse;
pub struct Logistics;

impl DepartmentScope for Financial {
    const DEPARTMENT: Department = Department::Financial;
}

impl DepartmentScope for Warehouse {
    const DEPARTMENT: Department = Department::Warehouse;
}

impl DepartmentScope for Logistics {
    const DEPARTMENT: Department = Department::Logistics;
}

/// Requires a super admin, or an admin actively assigned to department `D`.
pub struct RequireDepartment<D: DepartmentScope>(pub CurrentAdmin, PhantomData<D>);

impl<D: DepartmentScope> RequireDepartment<D> {
    #[must_use]
    pub const fn department(&self) -> Department {
        D::DEPARTMENT
    }
}

impl<D: DepartmentScope> FromRequestParts<AppState> for RequireDepartment<D> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts).await?;
        if admin.role == AdminRole::SuperAdmin
            || AdminUserRepository::new(state.pool())
                .is_assigned(admin.id, D::DEPARTMENT)
                .await?
        {
            return Ok(Self(admin, PhantomData));
        }
        tracing::warn!(
            admin_id = %admin.id,
            department = %D::DEPARTMENT,
            "Admin not assigned to department"
        );
        Err(AppError::Forbidden(format!(
            "not assigned to the {} department",
            D::DEPARTMENT
        )))
    }
}

/// Requires a logged-in storefront customer.
pub struct RequireCustomer(pub CurrentCustomer);

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session(parts)?
            .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
            .await?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("customer login required".to_owned()))
    }
}

/// The storefront customer, if one is logged in (guest checkout otherwise).
pub struct OptionalCustomer(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
                .await
                .ok()
                .flatten(),
            None => None,
        };
        Ok(Self(customer))
    }
}

/// Either signed-in identity. The admin wins when both are present.
pub enum AdminOrCustomer {
    Admin(CurrentAdmin),
    Customer(CurrentCustomer),
}

impl<S> FromRequestParts<S> for AdminOrCustomer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session(parts)?;
        if let Some(admin) = session
            .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
            .await?
        {
            return Ok(Self::Admin(admin));
        }
        session
            .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
            .await?
            .map(Self::Customer)
            .ok_or_else(|| AppError::Unauthorized("login required".to_owned()))
    }
}

/// Store the admin identity, rotating the session ID first.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?;
    Ok(())
}

/// Store the customer identity, rotating the session ID first.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_CUSTOMER, customer).await
}

/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use momtazchem_core::{AdminUserId, Email};
    use tower_sessions::MemoryStore;

    use super::*;

    async fn parts_with_admin(method: Method, role: AdminRole) -> Parts {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        session
            .insert(
                session_keys::CURRENT_ADMIN,
                CurrentAdmin {
                    id: AdminUserId::new(4),
                    email: Email::parse("viewer@momtazchem.com").unwrap(),
                    name: "Viewer".to_owned(),
                    role,
                },
            )
            .await
            .unwrap();

        let (mut parts, ()) = Request::builder()
            .method(method)
            .uri("/api/admin/preferences/refresh")
            .body(())
            .unwrap()
            .into_parts();
        parts.extensions.insert(session);
        parts
    }

    #[tokio::test]
    async fn test_viewer_cannot_write_shared_data() {
        let mut parts = parts_with_admin(Method::PUT, AdminRole::Viewer).await;
        let result = RequireAdminAuth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let mut parts = parts_with_admin(Method::GET, AdminRole::Viewer).await;
        assert!(RequireAdminAuth::from_request_parts(&mut parts, &()).await.is_ok());
    }

    #[tokio::test]
    async fn test_viewer_can_save_own_settings() {
        let mut parts = parts_with_admin(Method::PUT, AdminRole::Viewer).await;
        let RequireAdminSession(admin) = RequireAdminSession::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(admin.id, AdminUserId::new(4));
    }

    #[tokio::test]
    async fn test_admin_session_still_requires_login() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let (mut parts, ()) = Request::builder()
            .method(Method::PUT)
            .uri("/api/admin/preferences/refresh")
            .body(())
            .unwrap()
            .into_parts();
        parts.extensions.insert(session);

        let result = RequireAdminSession::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_only_reads_are_safe() {
        assert!(is_safe(&Method::GET));
        assert!(is_safe(&Method::HEAD));
        assert!(!is_safe(&Method::POST));
        assert!(!is_safe(&Method::DELETE));
    }

    #[test]
    fn test_department_scopes() {
        assert_eq!(Financial::DEPARTMENT, Department::Financial);
        assert_eq!(Warehouse::DEPARTMENT, Department::Warehouse);
        assert_eq!(Logistics::DEPARTMENT, Department::Logistics);
    }
}
