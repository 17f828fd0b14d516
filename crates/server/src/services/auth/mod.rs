//! Authentication service.
//!
//! Admins and storefront customers both sign in with email and an Argon2id
//! password hash. Customers created by CRM staff have no password until they
//! register on the storefront, which claims the existing contact.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use momtazchem_core::{AdminRole, AdminUserId, Email};

use crate::db::{AdminUserRepository, CustomerRepository, RepositoryError};
use crate::models::customer::CustomerFields;
use crate::models::{AdminUser, Customer};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
pub struct AuthService<'a> {
    admins: AdminUserRepository<'a>,
    customers: CustomerRepository<'a>,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            admins: AdminUserRepository::new(pool),
            customers: CustomerRepository::new(pool),
        }
    }

    // =========================================================================
    // Admins
    // =========================================================================

    /// Login an admin with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong,
    /// `AuthError::AccountDisabled` if the admin has been deactivated.
    #[tracing::instrument(skip(self, password))]
    pub async fn login_admin(&self, email: &str, password: &str) -> Result<AdminUser, AuthError> {
        let email = Email::parse(email)?;

        let (admin, password_hash) = self
            .admins
            .get_with_password(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !admin.is_active {
            return Err(AuthError::AccountDisabled);
        }

        self.admins.record_login(admin.id).await?;
        Ok(admin)
    }

    /// Create an admin account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` for short passwords and
    /// `AuthError::UserAlreadyExists` if the email is taken.
    pub async fn create_admin(
        &self,
        email: &str,
        name: &str,
        role: AdminRole,
        password: &str,
    ) -> Result<AdminUser, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.admins
            .create(&email, name.trim(), role, &password_hash)
            .await
            .map_err(conflict_as_exists)
    }

    /// Replace an admin's password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` for short passwords.
    pub async fn set_admin_password(
        &self,
        id: AdminUserId,
        password: &str,
    ) -> Result<(), AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;
        self.admins.set_password(id, &password_hash).await?;
        Ok(())
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Register a storefront customer.
    ///
    /// An existing CRM contact with the same email and no password is
    /// claimed rather than duplicated.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` for short passwords and
    /// `AuthError::UserAlreadyExists` if the email already has a login.
    #[tracing::instrument(skip_all, fields(email = %fields.email))]
    pub async fn register_customer(
        &self,
        fields: &CustomerFields,
        password: &str,
    ) -> Result<Customer, AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        match self.customers.get_with_password(&fields.email).await? {
            Some((_, Some(_))) => Err(AuthError::UserAlreadyExists),
            Some((_, None)) => self
                .customers
                .claim_account(&fields.email, &password_hash)
                .await
                .map_err(conflict_as_exists),
            None => self
                .customers
                .create(fields, Some(&password_hash))
                .await
                .map_err(conflict_as_exists),
        }
    }

    /// Login a customer with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// or the contact never registered, `AuthError::AccountDisabled` for
    /// deactivated customers.
    #[tracing::instrument(skip(self, password))]
    pub async fn login_customer(&self, email: &str, password: &str) -> Result<Customer, AuthError> {
        let email = Email::parse(email)?;

        let (customer, password_hash) = self
            .customers
            .get_with_password(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let password_hash = password_hash.ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &password_hash)?;

        if !customer.is_active {
            return Err(AuthError::AccountDisabled);
        }
        Ok(customer)
    }
}

fn conflict_as_exists(err: RepositoryError) -> AuthError {
    match err {
        RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
        other => AuthError::Repository(other),
    }
}

/// Validate password requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(MIN_PASSWORD_LENGTH));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(MIN_PASSWORD_LENGTH))
        ));
        assert!(validate_password("long-enough").is_ok());
        // Counted in characters, not bytes.
        assert!(validate_password("کلمەیەک").is_err());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_malformed_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AuthError::WeakPassword(8).to_string(),
            "password must be at least 8 characters"
        );
    }
}
