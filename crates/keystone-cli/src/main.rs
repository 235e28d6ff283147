//! Keystone CLI - Operator command-line interface
//!
//! Usage:
//!   keystone seed-admin [--username <name>] [--email <email>] [--password <pw>]
//!   keystone hash-password [<password>]
//!   keystone issue-token --email <email> [--ttl <duration>]

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use keystone_api::auth::{
    ensure_admin, BootstrapOutcome, PasswordHasher, PgAccountRepository, TokenClaims,
    TokenService,
};
use keystone_core::config::parse_duration_secs;
use keystone_core::{normalize_email, AccountRepository, AppConfig, StorageBackend};
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "keystone")]
#[command(about = "Keystone account administration CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the administrator account if none exists
    SeedAdmin {
        #[arg(long, env = "ADMIN_USERNAME")]
        username: Option<String>,
        #[arg(long, env = "ADMIN_EMAIL")]
        email: Option<String>,
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Print the Argon2id digest of a password (read from stdin when omitted)
    HashPassword { password: Option<String> },
    /// Issue a bearer token for an existing account
    IssueToken {
        /// Account email
        #[arg(long)]
        email: String,
        /// Lifetime such as `30m`, `12h` or `7d` (defaults to JWT_EXPIRES_IN)
        #[arg(long)]
        ttl: Option<String>,
    },
}

async fn open_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn AccountRepository>> {
    if config.database.backend != StorageBackend::Postgres {
        bail!("this command needs persistent storage; set STORAGE_BACKEND=postgres");
    }

    let repo = PgAccountRepository::connect(&config.database)
        .await
        .context("failed to connect to the account database")?;
    repo.migrate().await?;
    Ok(Arc::new(repo))
}

fn read_password_from_stdin() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("no password given");
    }
    Ok(password)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;

    match cli.command {
        Commands::SeedAdmin {
            username,
            email,
            password,
        } => {
            if let Some(username) = username {
                config.bootstrap.admin_username = username;
            }
            if let Some(email) = email {
                config.bootstrap.admin_email = email;
            }
            if let Some(password) = password {
                config.bootstrap.admin_password = password;
            }

            let accounts = open_repository(&config).await?;
            let hasher = Arc::new(PasswordHasher::new(config.auth.password.clone()));

            match ensure_admin(&accounts, &hasher, &config.bootstrap).await? {
                BootstrapOutcome::Created(admin) => {
                    println!("{}", serde_json::to_string_pretty(&admin)?);
                }
                BootstrapOutcome::AlreadyPresent => {
                    println!("An administrator already exists; nothing to do");
                }
                BootstrapOutcome::IdentityInUse(holder) => {
                    bail!(
                        "no administrator exists, but account {} already uses that username or email",
                        holder.id
                    );
                }
            }
        }
        Commands::HashPassword { password } => {
            let password = match password {
                Some(password) => password,
                None => read_password_from_stdin()?,
            };
            let hasher = PasswordHasher::new(config.auth.password.clone());
            println!("{}", hasher.hash(&password)?);
        }
        Commands::IssueToken { email, ttl } => {
            let ttl = match ttl {
                Some(value) => parse_duration_secs(&value)
                    .with_context(|| format!("invalid duration: {value}"))?,
                None => config.auth.token_ttl_secs,
            };

            let accounts = open_repository(&config).await?;
            let account = accounts
                .find_by_email(&normalize_email(&email))
                .await?
                .with_context(|| format!("no account with email {email}"))?;

            if !account.is_active {
                bail!("account {} is deactivated", account.id);
            }

            let tokens = TokenService::new(&config.auth);
            let token = tokens.issue_with_ttl(
                &TokenClaims {
                    subject: account.id,
                    email: account.email.clone(),
                    role: account.role,
                },
                Duration::from_secs(ttl),
            )?;
            println!("{token}");
        }
    }

    Ok(())
}
