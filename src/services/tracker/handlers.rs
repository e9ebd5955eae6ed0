//! Transitions of the LocationTracker
//!
//! Every handler runs to completion before the next sensor event is read,
//! so the distance check and the `last_known_position` update are never
//! interleaved with another reading.

use super::{LocationTracker, PositionAccepted, ToggleOutcome, TrackingSession};
use crate::domain::distance::distance;
use crate::domain::error::SensorError;
use crate::domain::types::Coordinate;
use crate::io::position_source::{SensorEvent, SensorSubscription};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What the tracker reports back after handling a sensor event
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    PositionAccepted(PositionAccepted),
    /// Transient fault; the session continues
    SensorFault(SensorError),
    /// Terminal fault; the session is gone and its watch released
    SessionEnded(SensorError),
}

impl LocationTracker {
    /// Single entry point for the locate control: Idle starts, Tracking stops
    pub async fn toggle_tracking(&mut self) -> Result<ToggleOutcome, SensorError> {
        self.start().await
    }

    /// Open a session
    ///
    /// Asks for a fresh high-accuracy fix first, then opens the continuous
    /// watch. The tracker only becomes Tracking once both succeed; on any
    /// failure it stays Idle and the error goes back to the caller. Calling
    /// this on a live session stops it instead.
    pub async fn start(&mut self) -> Result<ToggleOutcome, SensorError> {
        if self.is_tracking() {
            self.stop();
            return Ok(ToggleOutcome::Stopped);
        }

        let fix = match self.source.current_position(self.initial_options).await {
            Ok(fix) => fix,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "tracking_start_failed");
                return Err(e);
            }
        };

        if !fix.is_valid() {
            warn!(lat = %fix.latitude, lng = %fix.longitude, "invalid_fix");
            self.metrics.record_position_discarded();
            return Err(SensorError::SensorUnavailable);
        }

        let subscription = match SensorSubscription::open(
            self.source.clone(),
            self.update_options,
            self.sensor_tx.clone(),
        ) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "tracking_watch_failed");
                return Err(e);
            }
        };

        let session_id = Uuid::now_v7();
        info!(
            session_id = %session_id,
            handle = %subscription.handle(),
            lat = %fix.latitude,
            lng = %fix.longitude,
            "tracking_started"
        );
        self.metrics.record_session_started();
        self.metrics.record_position_accepted();

        self.session = Some(TrackingSession {
            id: session_id,
            subscription,
            last_known_position: Some(fix),
        });

        Ok(ToggleOutcome::Started(PositionAccepted { coordinate: fix, first_fix: true, session_id }))
    }

    /// Release the session if any. Returns whether one was released.
    pub fn stop(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                info!(session_id = %session.id, "tracking_stopped");
                // Dropping the session clears the watch
                drop(session);
                true
            }
            None => false,
        }
    }

    /// Handle one event from the watch channel
    ///
    /// Events from a watch other than the live one (already released, or
    /// still queued from a previous session) are ignored.
    pub fn handle_sensor_event(&mut self, event: SensorEvent) -> Option<TrackerEvent> {
        let Some(session) = self.session.as_ref() else {
            debug!(handle = %event.handle(), "sensor_event_without_session");
            return None;
        };
        if session.subscription.handle() != event.handle() {
            debug!(
                handle = %event.handle(),
                live_handle = %session.subscription.handle(),
                "stale_sensor_event_ignored"
            );
            return None;
        }

        match event {
            SensorEvent::Reading { coordinate, .. } => {
                self.handle_reading(coordinate).map(TrackerEvent::PositionAccepted)
            }
            SensorEvent::Fault { error, .. } => Some(self.handle_fault(error)),
        }
    }

    /// Apply the movement filter to a live reading
    pub(crate) fn handle_reading(&mut self, coordinate: Coordinate) -> Option<PositionAccepted> {
        let threshold_m = self.threshold_m;
        let session = self.session.as_mut()?;

        if !coordinate.is_valid() {
            warn!(
                session_id = %session.id,
                lat = %coordinate.latitude,
                lng = %coordinate.longitude,
                "invalid_reading_discarded"
            );
            self.metrics.record_position_discarded();
            return None;
        }

        let first_fix = match session.last_known_position {
            None => true,
            Some(last) => {
                let moved_m = distance(last, coordinate);
                if moved_m <= threshold_m {
                    debug!(session_id = %session.id, moved_m = %format!("{moved_m:.2}"), "reading_discarded");
                    self.metrics.record_position_discarded();
                    return None;
                }
                debug!(session_id = %session.id, moved_m = %format!("{moved_m:.2}"), "significant_movement");
                false
            }
        };

        session.last_known_position = Some(coordinate);
        self.metrics.record_position_accepted();
        info!(
            session_id = %session.id,
            lat = %coordinate.latitude,
            lng = %coordinate.longitude,
            first_fix = first_fix,
            "position_accepted"
        );

        Some(PositionAccepted { coordinate, first_fix, session_id: session.id })
    }

    fn handle_fault(&mut self, error: SensorError) -> TrackerEvent {
        self.metrics.record_sensor_fault();

        if error.is_terminal() {
            if let Some(session) = self.session.take() {
                warn!(session_id = %session.id, error = %error, "tracking_ended_by_sensor");
            }
            return TrackerEvent::SessionEnded(error);
        }

        warn!(error = %error, kind = error.kind(), "sensor_fault");
        TrackerEvent::SensorFault(error)
    }
}
