//! WasteWise maintenance CLI (wastewise-admin)
//!
//! One-off repairs on the service database: inspect recent accounts,
//! activate stuck subscriptions, reset quotas, wipe test data.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wastewise_common::config::{load_toml_config, ConfigOverrides, ServiceConfig};
use wastewise_common::db::init_database;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "wastewise-admin")]
#[command(about = "Maintenance commands for the WasteWise database")]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long = "database", env = "DATABASE_PATH", global = true)]
    database_path: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show recent users and subscriptions
    Status {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Activate pending premium subscriptions for one month from now
    ActivatePending {
        /// Only subscriptions of this user
        #[arg(long)]
        email: Option<String>,
        /// Apply changes; without it the candidates are only listed
        #[arg(long)]
        yes: bool,
    },
    /// Activate pending subscriptions lacking an end date (start + 1 month)
    FixEndDates,
    /// Set every free user's usage limit back to the free quota
    ResetFreeLimits,
    /// Delete all subscriptions and users
    CleanUsers {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wastewise_admin=info,wastewise_common=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let toml_config =
        load_toml_config(cli.config.as_deref()).context("Failed to load config file")?;
    let config = ServiceConfig::resolve(
        ConfigOverrides {
            database_path: cli.database_path.clone(),
            ..Default::default()
        },
        toml_config,
    )
    .context("Invalid configuration")?;

    let pool = init_database(&config.database_path)
        .await
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;

    match cli.command {
        Commands::Status { limit } => {
            let report = commands::status(&pool, limit).await?;

            println!("Users ({}):", report.users.len());
            for user in &report.users {
                println!(
                    "  {}  {:<32} {:<8} {}/{}",
                    user.id, user.email, user.plan.as_str(), user.usage_count, user.usage_limit
                );
            }

            println!("Subscriptions ({}):", report.subscriptions.len());
            for sub in &report.subscriptions {
                println!(
                    "  {}  user={} {:<8} {:<8} payment={} ends={}",
                    sub.id,
                    sub.user_id,
                    sub.plan.as_str(),
                    sub.status.as_str(),
                    sub.payment_id.as_deref().unwrap_or("-"),
                    sub.end_date
                        .map(|d| d.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        Commands::ActivatePending { email, yes } => {
            let pending = commands::pending_premium(&pool, email.as_deref()).await?;
            if pending.is_empty() {
                println!("No pending premium subscriptions");
                return Ok(());
            }

            for sub in &pending {
                println!(
                    "  {}  user={} created={}",
                    sub.id,
                    sub.user_id,
                    sub.created_at.to_rfc3339()
                );
            }

            if !yes {
                println!("{} pending; re-run with --yes to activate", pending.len());
                return Ok(());
            }

            let count = commands::activate_pending(&pool, &pending).await?;
            println!("Activated {} subscription(s)", count);
        }
        Commands::FixEndDates => {
            let count = commands::fix_end_dates(&pool).await?;
            println!("Fixed {} subscription(s)", count);
        }
        Commands::ResetFreeLimits => {
            let count = commands::reset_free_limits(&pool).await?;
            println!("Reset usage limit for {} free user(s)", count);
        }
        Commands::CleanUsers { yes } => {
            if !yes {
                bail!("clean-users deletes every user and subscription; pass --yes to confirm");
            }
            let (subs, users) = commands::clean_users(&pool).await?;
            println!("Deleted {} subscription(s) and {} user(s)", subs, users);
        }
    }

    Ok(())
}
