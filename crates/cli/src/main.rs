//! Momtazchem CLI - migrations, admin accounts, seed data and barcode tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! mc-cli migrate
//!
//! # Create the first super admin, reading the password from stdin
//! echo "$PASSWORD" | mc-cli admin create -e owner@momtazchem.com -n "Owner" -r super_admin --password-stdin
//!
//! # Load Iraqi provinces and cities
//! mc-cli seed geography data/iraqi_cities.yaml
//!
//! # Delivery methods, vehicle templates and email categories
//! mc-cli seed defaults
//!
//! # Offline barcode checks
//! mc-cli barcode validate 8469677112348
//! mc-cli barcode generate 1234
//! ```
//!
//! Database commands read `DATABASE_URL` (a `.env` file is honoured).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mc-cli")]
#[command(author, version, about = "Momtazchem CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Load reference data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// EAN-13 barcode tools (no database needed)
    Barcode {
        #[command(subcommand)]
        action: BarcodeAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Admin role (`super_admin`, `admin`, `viewer`)
        #[arg(short, long, default_value = "admin")]
        role: String,

        /// Password (visible in shell history; prefer --password-stdin)
        #[arg(short, long, conflicts_with = "password_stdin")]
        password: Option<String>,

        /// Read the password from the first line of stdin
        #[arg(long)]
        password_stdin: bool,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert provinces and cities from a YAML file
    Geography {
        /// YAML list of `{city, province, distance_from_erbil_km, name_english}`
        file: PathBuf,
    },
    /// Insert missing delivery methods, vehicle templates and email categories
    Defaults,
}

#[derive(Subcommand)]
enum BarcodeAction {
    /// Check a 13 digit code and print its fields
    Validate { code: String },
    /// Build the company barcode for a four digit product code
    Generate { product_code: u16 },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mc_cli=info,momtazchem_server=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                role,
                password,
                password_stdin,
            } => {
                let password = commands::admin::resolve_password(password, password_stdin)?;
                commands::admin::create_user(&email, &name, &role, &password).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Geography { file } => commands::seed::geography(&file).await?,
            SeedTarget::Defaults => commands::seed::defaults().await?,
        },
        Commands::Barcode { action } => match action {
            BarcodeAction::Validate { code } => commands::barcode::validate(&code)?,
            BarcodeAction::Generate { product_code } => {
                commands::barcode::generate(product_code)?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_password_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "mc-cli", "admin", "create", "-e", "a@b.iq", "-n", "A", "-p", "secret123",
            "--password-stdin",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_role_defaults_to_admin() {
        let parsed = Cli::try_parse_from(["mc-cli", "admin", "create", "-e", "a@b.iq", "-n", "A"]);
        assert!(matches!(
            parsed,
            Ok(Cli {
                command: Commands::Admin {
                    action: AdminAction::Create { ref role, .. }
                }
            }) if role == "admin"
        ));
    }
}
