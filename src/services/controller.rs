//! Single-threaded event loop for the place browser
//!
//! The LiveLocationController is the only owner of tracker, synchronizer,
//! catalogue, and view. It multiplexes three inputs:
//! - user commands (locate toggle, filter, shutdown)
//! - sensor events from the live watch
//! - completions of nearby/geocode requests
//!
//! Each input is handled to completion before the next is read, which is
//! what keeps the movement filter free of races.

use crate::domain::error::SensorError;
use crate::domain::filter::filter;
use crate::domain::types::Establishment;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::data_source::EstablishmentDataSource;
use crate::io::position_source::{PositionSource, SensorEvent};
use crate::io::view::ViewReconciler;
use crate::services::synchronizer::{NearbyPlacesSynchronizer, SyncEvent};
use crate::services::tracker::{
    LocationTracker, PositionAccepted, ToggleOutcome, TrackerEvent, TrackerState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

const SENSOR_CHANNEL_CAPACITY: usize = 64;
const SYNC_CHANNEL_CAPACITY: usize = 64;

pub const LOGIN_REQUIRED_NOTICE: &str = "Please login to use location features.";
pub const LOCATION_ERROR_NOTICE: &str =
    "Error getting location. Please allow location access and make sure you have a GPS signal.";
pub const BACKEND_DOWN_NOTICE: &str =
    "Backend server not running. Please start the backend to see places.";

#[derive(Debug)]
pub enum Command {
    /// The locate control; replies with the state after the toggle
    ToggleTracking { respond_to: Option<oneshot::Sender<TrackerState>> },
    /// Stop tracking if active
    StopTracking,
    /// Re-render the catalogue through the search/category filter
    Filter { query: String, category: String },
    Shutdown,
}

pub struct LiveLocationController<V: ViewReconciler> {
    tracker: LocationTracker,
    synchronizer: NearbyPlacesSynchronizer,
    data_source: Arc<dyn EstablishmentDataSource>,
    view: V,
    /// Full list from the initial load, base for filtering
    catalogue: Vec<Establishment>,
    sensor_rx: mpsc::Receiver<SensorEvent>,
    sync_rx: mpsc::Receiver<SyncEvent>,
    require_token: bool,
    metrics_interval: Duration,
    metrics: Arc<Metrics>,
}

impl<V: ViewReconciler> LiveLocationController<V> {
    pub fn new(
        config: &Config,
        position_source: Arc<dyn PositionSource>,
        data_source: Arc<dyn EstablishmentDataSource>,
        view: V,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (sensor_tx, sensor_rx) = mpsc::channel(SENSOR_CHANNEL_CAPACITY);
        let (sync_tx, sync_rx) = mpsc::channel(SYNC_CHANNEL_CAPACITY);

        let tracker = LocationTracker::new(config, position_source, sensor_tx, metrics.clone());
        let synchronizer =
            NearbyPlacesSynchronizer::new(config, data_source.clone(), sync_tx, metrics.clone());

        Self {
            tracker,
            synchronizer,
            data_source,
            view,
            catalogue: Vec::new(),
            sensor_rx,
            sync_rx,
            require_token: config.require_token(),
            metrics_interval: Duration::from_secs(config.metrics_interval_secs().max(1)),
            metrics,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn tracker(&self) -> &LocationTracker {
        &self.tracker
    }

    pub fn catalogue(&self) -> &[Establishment] {
        &self.catalogue
    }

    /// Fetch and show the full catalogue
    ///
    /// A failure keeps the map usable: the listing shows a notice instead.
    pub async fn load_catalogue(&mut self) {
        match self.data_source.establishments().await {
            Ok(places) => {
                info!(count = places.len(), "catalogue_loaded");
                self.view.render(&places);
                self.catalogue = places;
            }
            Err(e) => {
                error!(error = %e, "catalogue_load_failed");
                self.view.show_notice(BACKEND_DOWN_NOTICE);
            }
        }
    }

    /// Run until a Shutdown command arrives or the command channel closes
    ///
    /// Returns the view so callers can inspect what was displayed.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> V {
        self.load_catalogue().await;

        let mut metrics_tick = interval(self.metrics_interval);
        metrics_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        metrics_tick.tick().await;

        loop {
            tokio::select! {
                // Drain sensor input before commands so a stop never
                // overtakes readings that were already delivered
                biased;

                Some(event) = self.sensor_rx.recv() => {
                    self.handle_sensor_event(event);
                }
                Some(event) = self.sync_rx.recv() => {
                    self.handle_sync_event(event);
                }
                command = commands.recv() => {
                    match command {
                        Some(Command::Shutdown) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }
                _ = metrics_tick.tick() => {
                    self.metrics.report().log();
                }
            }
        }

        if self.tracker.stop() {
            self.view.clear_user_position();
        }
        self.metrics.report().log();
        info!("controller_stopped");
        self.view
    }

    pub async fn handle_command(&mut self, command: Command) {
        match command {
            Command::ToggleTracking { respond_to } => {
                let state = self.toggle_tracking().await;
                if let Some(tx) = respond_to {
                    let _ = tx.send(state);
                }
            }
            Command::StopTracking => {
                if self.tracker.stop() {
                    self.view.clear_user_position();
                }
            }
            Command::Filter { query, category } => {
                let filtered = filter(&self.catalogue, &query, &category);
                info!(query = %query, category = %category, count = filtered.len(), "catalogue_filtered");
                self.view.render(&filtered);
            }
            Command::Shutdown => {}
        }
    }

    /// The locate control: start when idle, stop when tracking
    pub async fn toggle_tracking(&mut self) -> TrackerState {
        if !self.tracker.is_tracking() && self.require_token && !self.data_source.has_token() {
            warn!("tracking_requires_login");
            self.view.show_notice(LOGIN_REQUIRED_NOTICE);
            return self.tracker.state();
        }

        match self.tracker.toggle_tracking().await {
            Ok(ToggleOutcome::Started(accepted)) => self.on_position_accepted(accepted),
            Ok(ToggleOutcome::Stopped) => self.view.clear_user_position(),
            Err(e) => self.on_start_failed(e),
        }
        self.tracker.state()
    }

    pub fn handle_sensor_event(&mut self, event: SensorEvent) {
        match self.tracker.handle_sensor_event(event) {
            Some(TrackerEvent::PositionAccepted(accepted)) => self.on_position_accepted(accepted),
            Some(TrackerEvent::SessionEnded(e)) => {
                self.view.clear_user_position();
                self.view.show_notice(&format!("Location tracking stopped: {e}"));
            }
            // Already logged by the tracker; the session carries on
            Some(TrackerEvent::SensorFault(_)) | None => {}
        }
    }

    pub fn handle_sync_event(&mut self, event: SyncEvent) {
        self.synchronizer.apply(event, &mut self.view);
    }

    fn on_position_accepted(&mut self, accepted: PositionAccepted) {
        self.view.show_user_position(accepted.coordinate);
        self.synchronizer.on_position_accepted(&accepted);
    }

    fn on_start_failed(&mut self, e: SensorError) {
        error!(error = %e, "location_unavailable");
        self.view.show_notice(LOCATION_ERROR_NOTICE);
    }
}
