//! Nearby-places refresh driven by accepted positions
//!
//! Each accepted position fires one nearby query; the first fix of a
//! session additionally fires a reverse-geocode lookup. Requests run as
//! detached tasks and report back through `SyncEvent`s, which the event
//! loop applies in the order they complete. There is no staleness check:
//! a slow reply for an older position still overwrites the display.

use crate::domain::error::DataSourceError;
use crate::domain::types::{Coordinate, Establishment, GeocodeResponse};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::data_source::EstablishmentDataSource;
use crate::io::view::ViewReconciler;
use crate::services::tracker::PositionAccepted;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Completion of a request started by the synchronizer
#[derive(Debug)]
pub enum SyncEvent {
    NearbyLoaded {
        /// Dispatch order, for logs only
        seq: u64,
        at: Coordinate,
        latency_ms: u64,
        result: Result<Vec<Establishment>, DataSourceError>,
    },
    AddressResolved {
        at: Coordinate,
        result: Result<GeocodeResponse, DataSourceError>,
    },
}

pub struct NearbyPlacesSynchronizer {
    source: Arc<dyn EstablishmentDataSource>,
    radius_m: u32,
    skip_empty_results: bool,
    events_tx: mpsc::Sender<SyncEvent>,
    next_seq: u64,
    metrics: Arc<Metrics>,
}

impl NearbyPlacesSynchronizer {
    pub fn new(
        config: &Config,
        source: Arc<dyn EstablishmentDataSource>,
        events_tx: mpsc::Sender<SyncEvent>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            source,
            radius_m: config.nearby_radius_m(),
            skip_empty_results: config.skip_empty_results(),
            events_tx,
            next_seq: 0,
            metrics,
        }
    }

    /// Fire the requests for one accepted position
    pub fn on_position_accepted(&mut self, accepted: &PositionAccepted) {
        self.spawn_nearby(accepted.coordinate);
        if accepted.first_fix {
            self.spawn_geocode(accepted.coordinate);
        }
    }

    fn spawn_nearby(&mut self, at: Coordinate) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let radius_m = self.radius_m;
        let source = self.source.clone();
        let tx = self.events_tx.clone();

        debug!(seq = seq, lat = %at.latitude, lng = %at.longitude, radius_m = radius_m, "nearby_query_dispatched");
        tokio::spawn(async move {
            let started = Instant::now();
            let result = source.nearby(at, radius_m).await;
            let latency_ms = started.elapsed().as_millis() as u64;
            if tx.send(SyncEvent::NearbyLoaded { seq, at, latency_ms, result }).await.is_err() {
                debug!(seq = seq, "nearby_result_dropped_loop_closed");
            }
        });
    }

    fn spawn_geocode(&self, at: Coordinate) {
        let source = self.source.clone();
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let result = source.geocode(at).await;
            if tx.send(SyncEvent::AddressResolved { at, result }).await.is_err() {
                debug!("geocode_result_dropped_loop_closed");
            }
        });
    }

    /// Apply a completed request to the display
    ///
    /// Failures never reach the caller: a failed nearby query leaves the
    /// current listing as it is, a failed geocode shows raw coordinates.
    pub fn apply(&self, event: SyncEvent, view: &mut dyn ViewReconciler) {
        match event {
            SyncEvent::NearbyLoaded { seq, at, latency_ms, result } => {
                self.metrics.record_nearby_result(result.is_ok(), latency_ms);
                match result {
                    Ok(places) if places.is_empty() && self.skip_empty_results => {
                        info!(seq = seq, "nearby_empty_listing_kept");
                    }
                    Ok(places) => {
                        info!(seq = seq, count = places.len(), latency_ms = latency_ms, "nearby_places_loaded");
                        view.render(&places);
                    }
                    Err(e) => {
                        error!(
                            seq = seq,
                            lat = %at.latitude,
                            lng = %at.longitude,
                            error = %e,
                            "nearby_query_failed"
                        );
                    }
                }
            }
            SyncEvent::AddressResolved { at, result } => {
                let address = match result {
                    Ok(GeocodeResponse { address: Some(address) }) if !address.trim().is_empty() => {
                        self.metrics.record_geocode(true);
                        address
                    }
                    Ok(_) => {
                        warn!(lat = %at.latitude, lng = %at.longitude, "geocode_without_address");
                        self.metrics.record_geocode(false);
                        at.fallback_label()
                    }
                    Err(e) => {
                        warn!(lat = %at.latitude, lng = %at.longitude, error = %e, "geocode_failed");
                        self.metrics.record_geocode(false);
                        at.fallback_label()
                    }
                };
                view.show_address(&address);
            }
        }
    }
}
