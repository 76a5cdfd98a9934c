//! AdPool Server: session pool allocation and subscription lifecycle.
//!
//! Main entry point that wires all crates together, serves the trigger
//! surface, and runs the periodic job scheduler.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use adpool_api::AppState;
use adpool_cache::provider::CacheManager;
use adpool_core::config::AppConfig;
use adpool_core::traits::cache::CacheProvider;
use adpool_database::connection::DatabasePool;
use adpool_database::store::Stores;
use adpool_service::{LogEmailSender, Services};
use adpool_worker::CronScheduler;

/// AdPool server command line.
#[derive(Debug, Parser)]
#[command(name = "adpool-server", version, about)]
struct Cli {
    /// Configuration overlay to load from `config/{env}.toml`.
    #[arg(long, env = "ADPOOL_ENV", default_value = "development")]
    env: String,

    /// Run against in-process stores instead of Postgres.
    #[arg(long)]
    memory: bool,

    /// Serve the trigger surface without starting the scheduler.
    #[arg(long)]
    no_worker: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(cli, config).await {
        tracing::error!("Server error: {e:#}");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(env = %cli.env, "Starting AdPool v{}", env!("CARGO_PKG_VERSION"));
    let config = Arc::new(config);

    // ── Step 1: Stores ───────────────────────────────────────────
    let (stores, db) = if cli.memory {
        tracing::warn!("Using in-memory stores; state is lost on exit");
        (Stores::memory(), None)
    } else {
        let db = DatabasePool::connect(&config.database)
            .await
            .context("Database connection failed")?;
        if config.database.run_migrations {
            adpool_database::migration::run_migrations(db.pool())
                .await
                .context("Migration failed")?;
        }
        (Stores::postgres(db.pool().clone()), Some(db))
    };

    // ── Step 2: Cache ────────────────────────────────────────────
    tracing::info!(provider = %config.cache.provider, "Initializing cache");
    let cache: Arc<dyn CacheProvider> = Arc::new(
        CacheManager::new(&config.cache)
            .await
            .context("Cache init failed")?,
    );

    // ── Step 3: Automation backend ───────────────────────────────
    let backend =
        adpool_backend::build_backend(&config.backend).context("Automation backend init failed")?;

    // ── Step 4: Services ─────────────────────────────────────────
    let services = Services::new(
        stores,
        Arc::clone(&backend),
        Arc::new(LogEmailSender),
        &config,
    );
    let jobs = Arc::new(services.jobs.clone());
    let state = AppState::new(Arc::clone(&config), services, cache, backend);
    if !state.system_secret.is_configured() {
        tracing::warn!("No system secret configured; only administrator tokens can trigger jobs");
    }

    // ── Step 5: Scheduler ────────────────────────────────────────
    let scheduler = if config.worker.enabled && !cli.no_worker {
        let scheduler = CronScheduler::new(jobs)
            .await
            .context("Scheduler init failed")?;
        scheduler
            .register_jobs(&config.worker)
            .await
            .context("Scheduler registration failed")?;
        scheduler.start().await.context("Scheduler start failed")?;
        Some(scheduler)
    } else {
        tracing::info!("Scheduler disabled; jobs run only when triggered over HTTP");
        None
    };

    // ── Step 6: HTTP server ──────────────────────────────────────
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let app = adpool_api::build_app(state);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        signal_token.cancel();
    });

    adpool_api::serve(app, addr, shutdown).await?;

    // ── Step 7: Graceful shutdown ────────────────────────────────
    if let Some(scheduler) = scheduler {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!(error = %e, "Scheduler shutdown failed");
        }
    }
    if let Some(db) = db {
        db.close().await;
    }

    tracing::info!("AdPool stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
