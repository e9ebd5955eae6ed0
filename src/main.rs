//! Place locator - browse places and follow your position
//!
//! Module structure:
//! - `domain/` - Core value types (Coordinate, Establishment) and distance
//! - `io/` - External interfaces (position source, places backend, view)
//! - `services/` - Tracking state machine, nearby sync, event loop
//! - `infra/` - Infrastructure (Config, Metrics, logging)

use anyhow::Context;
use clap::{Parser, Subcommand};
use place_locator::domain::filter::filter;
use place_locator::infra::{logging, Config, Metrics};
use place_locator::io::{
    ConsoleView, EstablishmentDataSource, HttpDataSource, ReplaySource, ViewReconciler,
};
use place_locator::services::{Command, LiveLocationController, TrackerState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Place locator - map directory client with live location
#[derive(Parser, Debug)]
#[command(name = "place-locator", version, about)]
struct Args {
    /// Path to TOML configuration file (else CONFIG_FILE, else config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the place catalogue, optionally filtered
    List {
        /// Free-text search over name, description, address and category
        #[arg(short, long, default_value = "")]
        search: String,
        /// Exact category (e.g. Mall, Restaurant, Landmark)
        #[arg(long, default_value = "")]
        category: String,
    },
    /// Track a replayed position stream and follow nearby places
    Track {
        /// JSONL file of readings and faults
        #[arg(short, long)]
        replay: PathBuf,
        /// Time to wait for in-flight queries after the replay ends (ms)
        #[arg(long, default_value = "1000")]
        settle_ms: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = Config::resolve_config_path(args.config.as_deref());
    let (config, load_error) = Config::load_from_path(&config_path);
    let config = config.with_env_overrides();

    // Logging depends on the config, so load failures are reported afterwards
    logging::init(config.log_format());
    info!(version = env!("CARGO_PKG_VERSION"), git = env!("GIT_HASH"), "place-locator starting");
    if let Some(e) = load_error {
        warn!(path = %config_path, error = %format!("{e:#}"), "config_load_failed_using_defaults");
    }
    info!(
        config_file = %config.config_file(),
        api = %config.api_base_url(),
        token = config.api_token().is_some(),
        radius_m = config.nearby_radius_m(),
        threshold_m = config.significant_movement_m(),
        "config_loaded"
    );

    let data_source: Arc<dyn EstablishmentDataSource> =
        Arc::new(HttpDataSource::new(&config).context("Failed to create places client")?);

    match args.command {
        Cmd::List { search, category } => list(data_source, &search, &category).await,
        Cmd::Track { replay, settle_ms } => {
            track(config, data_source, replay, Duration::from_millis(settle_ms)).await
        }
    }
}

async fn list(
    data_source: Arc<dyn EstablishmentDataSource>,
    search: &str,
    category: &str,
) -> anyhow::Result<()> {
    let places = data_source.establishments().await.context("Failed to load establishments")?;
    let filtered = filter(&places, search, category);
    info!(total = places.len(), shown = filtered.len(), "catalogue_listed");
    ConsoleView::stdout().render(&filtered);
    Ok(())
}

async fn track(
    config: Config,
    data_source: Arc<dyn EstablishmentDataSource>,
    replay: PathBuf,
    settle: Duration,
) -> anyhow::Result<()> {
    let replay = Arc::new(ReplaySource::from_file(&replay)?);
    let metrics = Arc::new(Metrics::new());
    let controller = LiveLocationController::new(
        &config,
        replay.clone(),
        data_source,
        ConsoleView::stdout(),
        metrics.clone(),
    );

    let (cmd_tx, cmd_rx) = mpsc::channel(16);

    let driver = async {
        let (tx, rx) = oneshot::channel();
        if cmd_tx.send(Command::ToggleTracking { respond_to: Some(tx) }).await.is_err() {
            return;
        }

        if matches!(rx.await, Ok(TrackerState::Tracking)) {
            tokio::select! {
                _ = replay.drained() => {
                    info!("replay_finished");
                    tokio::time::sleep(settle).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown_signal_received");
                }
            }
        }

        let _ = cmd_tx.send(Command::StopTracking).await;
        let _ = cmd_tx.send(Command::Shutdown).await;
    };

    tokio::join!(controller.run(cmd_rx), driver);

    info!(accepted_total = metrics.positions_accepted_total(), "place-locator shutdown complete");
    Ok(())
}
