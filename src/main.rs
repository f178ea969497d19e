// ABOUTME: Entry point for the casestore binary.
// ABOUTME: Maintenance commands over the local store: init, retention sweeps, backups, and permission edits.

use std::path::PathBuf;

use anyhow::Context;
use casestore_app::{LocalServices, ServicesConfig};
use casestore_core::{LogFilter, LogLevel, PermissionUpdate, Role};
use clap::{Parser, Subcommand};

/// Inspect and maintain the CRM's embedded local store.
#[derive(Parser, Debug)]
#[command(name = "casestore")]
#[command(version, about, long_about = None)]
struct Args {
    /// Data directory (overrides CASESTORE_HOME)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or restore the store and seed the default routes
    Init,

    /// Delete logs and traces older than the retention window
    Sweep {
        /// Days to keep (defaults to CASESTORE_RETENTION_DAYS)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Write a full snapshot to a file
    Export { path: PathBuf },

    /// Replace the store contents with a snapshot file
    Import { path: PathBuf },

    /// Check whether a role may open a route
    Check { route: String, role: String },

    /// List every route permission as JSON
    Permissions,

    /// Change the flags or description of a registered route
    SetPermission {
        route: String,
        #[arg(long)]
        agent: Option<bool>,
        #[arg(long)]
        lawyer: Option<bool>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Print recent log entries as JSON, newest first
    Logs {
        #[arg(long)]
        level: Option<LogLevel>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("casestore=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ServicesConfig::from_env().context("invalid configuration")?;
    if let Some(home) = args.home {
        config.home = home;
    }

    let services = LocalServices::from_config(&config);
    services
        .init()
        .await
        .with_context(|| format!("failed to open store in {}", config.home.display()))?;

    let outcome = run(&services, &config, args.command).await;
    services.close().await.context("failed to persist store on close")?;
    outcome
}

async fn run(services: &LocalServices, config: &ServicesConfig, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Init => {
            let counts = services.store().counts().await?;
            println!(
                "store ready: {} route permissions, {} logs, {} traces",
                counts.route_permissions, counts.logs, counts.traces
            );
        }
        Command::Sweep { days } => {
            let days = days.unwrap_or(config.retention_days);
            let report = services.sweep_retention(days).await?;
            println!(
                "removed {} logs and {} traces older than {} days",
                report.logs_removed, report.traces_removed, days
            );
        }
        Command::Export { path } => {
            let bytes = services.export().await?;
            std::fs::write(&path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = bytes.len(), "exported snapshot");
        }
        Command::Import { path } => {
            let bytes =
                std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            services.import(&bytes).await?;
        }
        Command::Check { route, role } => {
            let role = Role::from(role.as_str());
            let allowed = services.permissions().check_permission(&route, &role).await;
            println!("{}", if allowed { "allowed" } else { "denied" });
        }
        Command::Permissions => {
            let rows = services.permissions().get_all_permissions().await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::SetPermission {
            route,
            agent,
            lawyer,
            description,
        } => {
            let update = PermissionUpdate {
                agent_allowed: agent,
                lawyer_allowed: lawyer,
                description,
            };
            services.permissions().update_route_permission(&route, update).await?;
        }
        Command::Logs { level, limit } => {
            let filter = LogFilter {
                level,
                limit: Some(limit),
                ..Default::default()
            };
            let entries = services.logs().get_logs(&filter).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(())
}
