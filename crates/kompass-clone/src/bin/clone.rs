//! kompass-clone: command-line entry point for default-content cloning.
//!
//! ```text
//! kompass-clone migrate
//! kompass-clone copy --organization-id 42 [--plan pro]
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use kompass_clone::{CloneConfig, CloneOrchestrator};
use kompass_db::{Database, Error, OrganizationRepository, Plan, PoolConfig};

#[derive(Parser)]
#[command(name = "kompass-clone")]
#[command(author, version, about = "Default-content cloning for kompass organizations")]
#[command(propagate_version = true)]
struct Cli {
    /// Database URL (falls back to DATABASE_URL)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Copy default content into an organization and print the report as JSON
    Copy {
        /// Target organization
        #[arg(short, long)]
        organization_id: i64,

        /// Plan whose default content is copied (default: the organization's plan)
        #[arg(short, long)]
        plan: Option<Plan>,
    },
}

/// Initialize tracing from the environment.
///
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "kompass_clone=info,kompass_db=info")
fn init_tracing() -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kompass_clone=info,kompass_db=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    // stdout carries the JSON report, so console logs go to stderr.
    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("kompass-clone.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        subsystem = "cli",
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_tracing();

    let database_url = cli
        .database_url
        .unwrap_or_else(|| kompass_db::defaults::DATABASE_URL.to_string());
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env())
        .await
        .context("connecting to database")?;

    match cli.command {
        Commands::Migrate => {
            db.migrate().await.context("applying migrations")?;
            info!(subsystem = "cli", op = "migrate", "Migrations applied");
        }
        Commands::Copy {
            organization_id,
            plan,
        } => {
            let plan = match plan {
                Some(plan) => plan,
                None => {
                    db.organizations
                        .get(organization_id)
                        .await?
                        .ok_or(Error::OrganizationNotFound(organization_id))?
                        .plan
                }
            };

            let orchestrator =
                CloneOrchestrator::new(Arc::new(db.content_store()), CloneConfig::from_env());
            let report = orchestrator
                .clone_default_content(organization_id, plan)
                .await
                .context("cloning default content")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
