//! Database migrations.
//!
//! Migration files live in `crates/server/migrations/` and are embedded at
//! compile time.

use super::{CommandError, connect};

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is missing, the connection fails or a
/// migration does not apply.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
