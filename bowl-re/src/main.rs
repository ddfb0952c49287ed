//! Recommendation Engine (bowl-re) - Main entry point
//!
//! Serves bowl recommendations over HTTP. Personalization is raced against a
//! deadline and backed by the menu catalog tiers, so every valid request
//! gets an answer within the latency budget.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bowl_common::config::{load_config, ConfigFileResolver};
use bowl_re::engine::{Clock, TokioClock};
use bowl_re::providers::{InMemoryPreferences, MenuCatalog, UnavailablePersonalization};
use bowl_re::{build_router, AppState, RecommendationEngine};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for bowl-re
#[derive(Parser, Debug)]
#[command(name = "bowl-re")]
#[command(about = "Bowl recommendation engine microservice")]
#[command(version)]
struct Args {
    /// Config file (overrides BOWL_CONFIG and the per-user config file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides bind_address from the config file)
    #[arg(short, long, env = "BOWL_BIND_ADDRESS")]
    bind: Option<String>,

    /// Menu file (overrides menu_path from the config file)
    #[arg(short, long, env = "BOWL_MENU")]
    menu: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config file resolution: --config > BOWL_CONFIG > per-user file > defaults
    let config_path = ConfigFileResolver::new("config").resolve(args.config.as_deref());
    let config = load_config(config_path.as_deref()).context("Failed to load config file")?;

    // RUST_LOG takes precedence over the configured level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any slow startup work
    info!(
        "Starting Bowl Recommendation Engine (bowl-re) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using compiled defaults"),
    }

    let params = config.engine_params().context("Invalid [engine] configuration")?;
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);

    let catalog = match args.menu.as_ref().or(config.menu_path.as_ref()) {
        Some(path) => MenuCatalog::load(path, Arc::clone(&clock), params.recent_ml_ttl())
            .with_context(|| format!("Failed to load menu {}", path.display()))?,
        None => {
            info!("No menu file configured, using bundled menu");
            MenuCatalog::bundled(Arc::clone(&clock), params.recent_ml_ttl())
                .context("Bundled menu is invalid")?
        }
    };
    if catalog.is_empty() {
        warn!("Menu has no bowls; only the emergency bowl can be served");
    }

    warn!("No personalization backend configured; all requests use fallback tiers");
    let engine = RecommendationEngine::builder(Arc::new(UnavailablePersonalization), Arc::new(catalog))
        .params(params)
        .clock(clock)
        .preferences(Arc::new(InMemoryPreferences::new()))
        .build()
        .context("Failed to initialize recommendation engine")?;
    info!(
        primary_timeout_ms = engine.params().primary_timeout_ms,
        retry_attempts = engine.params().retry_attempts,
        max_results = engine.params().max_results,
        "Recommendation engine initialized"
    );

    let shutdown = CancellationToken::new();
    let sweeper = engine.spawn_cache_sweeper(shutdown.clone());

    let app = build_router(AppState::new(engine));

    let bind_address = args.bind.as_deref().unwrap_or_else(|| config.bind_address());
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("bowl-re listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!("Cache sweeper task failed: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
