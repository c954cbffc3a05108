//! Bet Settlement Server
//!
//! Accepts bets and event outcomes over HTTP and settles pending bets as
//! outcomes arrive.

mod api;
mod config;
mod seed;
mod server;
mod shutdown;
mod state;

use betsettle_core::config::SettlementConfig;
use betsettle_core::events::{OutcomeReceiver, outcome_channel};
use betsettle_core::framework::DatabaseProcessor;
use betsettle_core::odds::MarketOdds;
use betsettle_core::processors::{
    BetMatcher, OutboxRelay, OutboxTransport, SettlementConsumer, TracingLedger, build_publisher,
};
use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Bet Settlement Server - settles sports bets against event outcomes
#[derive(Parser, Debug)]
#[command(name = "betsettle-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./betsettle-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Insert sample bets when the bet table is empty
    #[arg(long, default_value = "false")]
    seed: bool,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    log_json: bool,
}

/// Handles of the spawned pipeline tasks.
struct Pipeline {
    matcher: JoinHandle<()>,
    relay: Option<JoinHandle<()>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.log_json);

    tracing::info!("Starting betsettle-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    if args.seed {
        seed::seed_sample_bets(&DatabaseProcessor::new(db_pool.clone())).await?;
    }

    // Start the settlement pipeline
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (outcome_tx, outcome_rx) = outcome_channel();
    let pipeline = spawn_pipeline(
        DatabaseProcessor::new(db_pool.clone()),
        loaded_config.settlement,
        outcome_rx,
        shutdown_rx,
    );

    // Build the router
    let state = AppState::new(db_pool.clone(), outcome_tx);
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // The router held the last outcome sender, so the matcher drains the
    // queued outcomes and stops on its own.
    if let Err(e) = pipeline.matcher.await {
        tracing::error!("BetMatcher task failed: {}", e);
    }
    let _ = shutdown_tx.send(true);
    if let Some(relay) = pipeline.relay {
        if let Err(e) = relay.await {
            tracing::error!("OutboxRelay task failed: {}", e);
        }
    }

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Wire the matcher, the publisher and, in broker mode, the outbox relay.
fn spawn_pipeline(
    processor: DatabaseProcessor,
    config: SettlementConfig,
    outcome_rx: OutcomeReceiver,
    shutdown_rx: watch::Receiver<bool>,
) -> Pipeline {
    let consumer = SettlementConsumer::new(Arc::new(TracingLedger));
    let publisher = build_publisher(
        &config.broker,
        consumer.clone(),
        OutboxTransport::new(processor.clone()),
    );

    let relay = config.broker.use_real_broker.then(|| {
        let relay = OutboxRelay::new(processor.clone(), consumer, config.outbox);
        tokio::spawn(relay.run(shutdown_rx.clone()))
    });

    let matcher = BetMatcher::new(
        processor,
        Arc::new(MarketOdds::from(config.odds)),
        publisher,
        config.matcher,
    );
    let matcher = tokio::spawn(matcher.run(outcome_rx, shutdown_rx));

    Pipeline { matcher, relay }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
