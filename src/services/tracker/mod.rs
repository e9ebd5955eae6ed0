//! Live location tracking state machine
//!
//! The LocationTracker owns at most one TrackingSession:
//! - Idle: no session, no sensor subscription
//! - Tracking: a session holding the open watch and the last accepted fix
//!
//! Readings are filtered by distance from the last accepted fix so that
//! sensor jitter never reaches the nearby-places query.

mod handlers;
#[cfg(test)]
mod tests;

use crate::domain::types::Coordinate;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::position_source::{PositionOptions, PositionSource, SensorEvent, SensorSubscription};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use handlers::TrackerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Tracking,
}

/// A reading that passed the movement filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionAccepted {
    pub coordinate: Coordinate,
    /// First accepted fix of the session
    pub first_fix: bool,
    pub session_id: Uuid,
}

/// Result of the single locate control
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Started(PositionAccepted),
    Stopped,
}

/// One continuous period of sensor subscription
#[derive(Debug)]
pub(crate) struct TrackingSession {
    pub(crate) id: Uuid,
    /// Dropping the session clears the watch
    pub(crate) subscription: SensorSubscription,
    pub(crate) last_known_position: Option<Coordinate>,
}

pub struct LocationTracker {
    pub(crate) source: Arc<dyn PositionSource>,
    pub(crate) session: Option<TrackingSession>,
    /// Cloned into every watch the tracker opens
    pub(crate) sensor_tx: mpsc::Sender<SensorEvent>,
    pub(crate) threshold_m: f64,
    pub(crate) initial_options: PositionOptions,
    pub(crate) update_options: PositionOptions,
    pub(crate) metrics: Arc<Metrics>,
}

impl LocationTracker {
    pub fn new(
        config: &Config,
        source: Arc<dyn PositionSource>,
        sensor_tx: mpsc::Sender<SensorEvent>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let initial_options = PositionOptions {
            enable_high_accuracy: config.high_accuracy(),
            timeout: config.initial_timeout(),
            maximum_age: config.maximum_age(),
        };
        let update_options = PositionOptions { timeout: config.update_timeout(), ..initial_options };

        Self {
            source,
            session: None,
            sensor_tx,
            threshold_m: config.significant_movement_m(),
            initial_options,
            update_options,
            metrics,
        }
    }

    pub fn state(&self) -> TrackerState {
        if self.session.is_some() {
            TrackerState::Tracking
        } else {
            TrackerState::Idle
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.session.is_some()
    }

    pub fn last_known_position(&self) -> Option<Coordinate> {
        self.session.as_ref().and_then(|s| s.last_known_position)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }
}
