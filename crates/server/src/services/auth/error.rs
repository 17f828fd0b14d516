//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] momtazchem_core::EmailError),

    /// Wrong password, unknown account, or a CRM contact without a login.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but has been deactivated.
    #[error("account is disabled")]
    AccountDisabled,

    #[error("an account with this email already exists")]
    UserAlreadyExists,

    /// Password shorter than the minimum length.
    #[error("password must be at least {0} characters")]
    WeakPassword(usize),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error: {0}")]
    PasswordHash(String),
}
