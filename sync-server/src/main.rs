//! paperfeed binary entry point.
//!
//! Usage:
//! ```bash
//! paperfeed --config paperfeed.toml serve
//! paperfeed --config paperfeed.toml sync
//! paperfeed --help
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paperfeed_client::{
    CloudConfig, CloudConnector, HttpFeedSource, RenderEngine, RenderOptions, Sha256Provider,
};
use paperfeed_server::config::Config;
use paperfeed_server::http::{build_router, health};
use paperfeed_server::scheduler::spawn_scheduler;
use paperfeed_server::server::{PaperFeed, Trigger};
use paperfeed_server::storage::SqliteStorage;
use paperfeed_server::sync::{SyncService, SyncSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Delivers new feed articles as PDFs to each user's document tree.
#[derive(Parser, Debug)]
#[command(name = "paperfeed")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, short, global = true, default_value = "paperfeed.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the trigger endpoint and run on a schedule until Ctrl+C
    Serve,

    /// Run once and print the report as JSON
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let shutdown = CancellationToken::new();
    let app = build_app(config, shutdown.clone()).await?;

    let result = match cli.command {
        Commands::Serve => serve(app.clone(), shutdown).await,
        Commands::Sync => sync_once(app.clone(), shutdown).await,
    };

    if let Err(e) = app.service().renderer().shutdown().await {
        tracing::warn!("Rendering engine did not stop cleanly: {}", e);
    }

    result
}

fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::from_file(path)?
    } else {
        tracing::warn!("{} not found, using defaults", path.display());
        Config::default()
    };
    Ok(config.apply_env())
}

async fn build_app(config: Config, shutdown: CancellationToken) -> Result<Arc<PaperFeed>> {
    let storage = SqliteStorage::new(&config.storage.database)
        .await
        .with_context(|| format!("Failed to open {}", config.storage.database.display()))?;

    let feeds = HttpFeedSource::new(config.timeouts.feed())?;
    let connector = CloudConnector::new(
        CloudConfig {
            auth_url: config.remote.auth_url.clone(),
            sync_url: config.remote.sync_url.clone(),
            timeout: config.timeouts.remote(),
        },
        Arc::new(Sha256Provider),
    )?;
    let renderer = launch_renderer(&config.render).await?;

    let service = Arc::new(SyncService::new(
        Arc::new(storage),
        Arc::new(feeds),
        renderer,
        Arc::new(connector),
        SyncSettings::from_config(&config),
    ));

    Ok(Arc::new(PaperFeed::new(config, service, shutdown)))
}

#[cfg(feature = "chromium")]
async fn launch_renderer(options: &RenderOptions) -> Result<Arc<dyn RenderEngine>> {
    let engine = paperfeed_client::ChromiumEngine::launch(options.executable.as_deref())
        .await
        .context("Failed to launch Chromium")?;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "chromium"))]
async fn launch_renderer(_options: &RenderOptions) -> Result<Arc<dyn RenderEngine>> {
    anyhow::bail!("paperfeed was built without a rendering engine; rebuild with `--features chromium`")
}

async fn serve(app: Arc<PaperFeed>, shutdown: CancellationToken) -> Result<()> {
    health::init_start_time();

    let bind_address = app.config().server.bind_address.clone();
    if app.config().server.api_key.is_none() {
        tracing::warn!("No api key configured, the trigger endpoint will reject every request");
    }

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!("Listening on {}", bind_address);

    let scheduler = spawn_scheduler(app.clone());
    let router = build_router(app);

    let signal = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            wait_for_ctrl_c().await;
            tracing::info!("Shutting down, letting the current article finish");
            signal.cancel();
        })
        .await
        .context("HTTP server error")?;

    // the scheduler returns once its in-flight run has wound down
    shutdown.cancel();
    if let Err(e) = scheduler.await {
        tracing::warn!("Scheduler task ended abnormally: {}", e);
    }

    Ok(())
}

async fn sync_once(app: Arc<PaperFeed>, shutdown: CancellationToken) -> Result<()> {
    let watcher = tokio::spawn(async move {
        wait_for_ctrl_c().await;
        tracing::info!("Interrupted, letting the current article finish");
        shutdown.cancel();
    });

    let report = app.trigger(Trigger::Cli).await;
    watcher.abort();

    let report = report?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
