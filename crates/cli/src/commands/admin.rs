//! Admin user management.
//!
//! Accounts created here log in with email and password at
//! `POST /api/admin/login`. The first super admin has to come from here.

use std::io::BufRead;

use secrecy::{ExposeSecret, SecretString};

use momtazchem_core::{AdminRole, AdminUserId};
use momtazchem_server::services::auth::AuthService;

use super::{CommandError, connect};

/// Pick the password from `-p` or the first line of stdin.
///
/// # Errors
///
/// Returns `CommandError::MissingPassword` when neither source yields one.
pub fn resolve_password(
    flag: Option<String>,
    from_stdin: bool,
) -> Result<SecretString, CommandError> {
    if from_stdin {
        return read_password(std::io::stdin().lock());
    }
    flag.filter(|p| !p.is_empty())
        .map(SecretString::from)
        .ok_or(CommandError::MissingPassword)
}

fn read_password(mut reader: impl BufRead) -> Result<SecretString, CommandError> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|e| CommandError::Io("stdin".to_owned(), e))?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(CommandError::MissingPassword);
    }
    Ok(SecretString::from(password.to_owned()))
}

/// Create a new admin user.
///
/// # Errors
///
/// Returns an error for an unknown role, an invalid email, a short password
/// or an email that already has an account.
pub async fn create_user(
    email: &str,
    name: &str,
    role: &str,
    password: &SecretString,
) -> Result<AdminUserId, CommandError> {
    let role: AdminRole = role
        .parse()
        .map_err(|_| CommandError::InvalidRole(role.to_owned()))?;

    let pool = connect().await?;

    tracing::info!("Creating admin user: {} ({})", email, role);
    let admin = AuthService::new(&pool)
        .create_admin(email, name, role, password.expose_secret())
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}, Role: {}",
        admin.id,
        admin.email,
        admin.role
    );
    if role != AdminRole::SuperAdmin {
        tracing::warn!("Assign departments before this admin can act on the order workflow");
    }

    Ok(admin.id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_read_password_strips_line_ending() {
        let secret = read_password("hunter2hunter2\r\nignored\n".as_bytes()).unwrap();
        assert_eq!(secret.expose_secret(), "hunter2hunter2");
    }

    #[test]
    fn test_read_password_rejects_empty_input() {
        assert!(matches!(
            read_password("\n".as_bytes()),
            Err(CommandError::MissingPassword)
        ));
    }

    #[test]
    fn test_resolve_password_requires_a_source() {
        assert!(matches!(
            resolve_password(None, false),
            Err(CommandError::MissingPassword)
        ));
        let secret = resolve_password(Some("longenough".into()), false).unwrap();
        assert_eq!(secret.expose_secret(), "longenough");
    }
}
