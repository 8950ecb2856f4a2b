//! ReportFlow: multi-tenant reporting console backend.
//!
//! Loads configuration, opens the database, seeds defaults, and serves the
//! REST API.

use clap::Parser;
use reportflow_api::{ApiServer, AppState};
use reportflow_core::config::AppConfig;
use reportflow_platform::bootstrap;
use reportflow_storage::RepositoryFactory;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "reportflow")]
#[command(about = "Multi-tenant reporting console backend")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./reportflow.toml when present)
    #[arg(long, env = "REPORTFLOW_CONFIG")]
    config: Option<String>,

    /// Database URL (overrides config)
    #[arg(long, env = "REPORTFLOW__DATABASE__URL")]
    database_url: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "REPORTFLOW__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Apply schema migrations and seed defaults, then exit
    #[arg(long, default_value_t = false)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reportflow=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("ReportFlow starting up");

    let mut config = AppConfig::load(cli.config.as_deref())?;

    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if cli.migrate_only {
        config.database.run_migrations = true;
    }

    info!(
        instance = %config.instance_name,
        http_port = config.api.http_port,
        metrics_enabled = config.metrics.enabled,
        "Configuration loaded"
    );

    let repos = RepositoryFactory::shared(&config.database).await?;
    info!(provider = %repos.database().provider(), "Database connected");

    let state = AppState::new(&config, repos.clone())?;
    bootstrap::run(&state.repos, &state.rbac, state.accounts.hasher(), &config.auth).await?;

    if cli.migrate_only {
        info!("Migrations applied; exiting");
        repos.database().close().await;
        return Ok(());
    }

    let api_server = ApiServer::new(config.clone(), state.clone());

    if config.metrics.enabled {
        if let Err(e) = api_server.start_metrics().await {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    // Expired sessions are otherwise only dropped when presented.
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                info!(purged, "Expired sessions purged");
            }
        }
    });

    info!("ReportFlow is ready to serve traffic");

    api_server.start_http().await?;

    Ok(())
}
