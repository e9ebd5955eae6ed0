//! Tests for the LocationTracker state machine

use super::*;
use crate::domain::error::SensorError;
use crate::io::position_source::WatchHandle;
use crate::services::test_support::MockSource;
use std::time::Duration;

/// Test harness that keeps the watch receiver alive
struct TestTracker {
    tracker: LocationTracker,
    source: Arc<MockSource>,
    #[allow(dead_code)]
    sensor_rx: mpsc::Receiver<SensorEvent>,
}

impl std::ops::Deref for TestTracker {
    type Target = LocationTracker;
    fn deref(&self) -> &Self::Target {
        &self.tracker
    }
}

impl std::ops::DerefMut for TestTracker {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tracker
    }
}

fn create_test_tracker(source: MockSource) -> TestTracker {
    let source = Arc::new(source);
    let (sensor_tx, sensor_rx) = mpsc::channel(16);
    let tracker = LocationTracker::new(
        &Config::default(),
        source.clone(),
        sensor_tx,
        Arc::new(Metrics::new()),
    );
    TestTracker { tracker, source, sensor_rx }
}

fn reading(handle: WatchHandle, lat: f64, lng: f64) -> SensorEvent {
    SensorEvent::Reading { handle, coordinate: Coordinate::new(lat, lng) }
}

fn live_handle(tracker: &TestTracker) -> WatchHandle {
    tracker.session.as_ref().map(|s| s.subscription.handle()).expect("live session")
}

async fn started(source: MockSource) -> TestTracker {
    let mut tracker = create_test_tracker(source);
    match tracker.start().await {
        Ok(ToggleOutcome::Started(_)) => {}
        other => panic!("expected start, got {other:?}"),
    }
    tracker
}

#[tokio::test]
async fn test_start_accepts_first_fix() {
    let mut tracker = create_test_tracker(MockSource::new().with_fix(8.4830, 124.6480));
    assert_eq!(tracker.state(), TrackerState::Idle);

    let outcome = tracker.start().await.unwrap();
    let ToggleOutcome::Started(accepted) = outcome else {
        panic!("expected Started");
    };
    assert!(accepted.first_fix);
    assert_eq!(accepted.coordinate, Coordinate::new(8.4830, 124.6480));
    assert_eq!(tracker.state(), TrackerState::Tracking);
    assert_eq!(tracker.last_known_position(), Some(Coordinate::new(8.4830, 124.6480)));
    assert_eq!(tracker.session_id(), Some(accepted.session_id));
    assert_eq!(tracker.source.opened_count(), 1);
}

#[tokio::test]
async fn test_start_requests_fresh_high_accuracy_fix() {
    let tracker = started(MockSource::new().with_fix(8.4830, 124.6480)).await;
    let options = tracker.source.last_options.lock().clone();

    // First fix, then the watch
    assert_eq!(options.len(), 2);
    assert!(options.iter().all(|o| o.enable_high_accuracy && o.maximum_age == Duration::ZERO));
    assert_eq!(options[0].timeout, Duration::from_secs(10));
    assert_eq!(options[1].timeout, Duration::from_secs(5));
}

#[tokio::test]
async fn test_start_permission_denied_stays_idle() {
    let source = MockSource::new();
    source.push_fix(Err(SensorError::PermissionDenied));
    let mut tracker = create_test_tracker(source);

    let result = tracker.start().await;
    assert_eq!(result, Err(SensorError::PermissionDenied));
    assert_eq!(tracker.state(), TrackerState::Idle);
    assert_eq!(tracker.source.opened_count(), 0);
    assert_eq!(tracker.source.cleared_count(), 0);
}

#[tokio::test]
async fn test_start_watch_failure_stays_idle() {
    let source = MockSource::new().with_fix(8.4830, 124.6480);
    source.fail_watch(SensorError::SensorUnavailable);
    let mut tracker = create_test_tracker(source);

    assert_eq!(tracker.start().await, Err(SensorError::SensorUnavailable));
    assert!(!tracker.is_tracking());
    assert_eq!(tracker.last_known_position(), None);
}

#[tokio::test]
async fn test_invalid_first_fix_rejected() {
    let source = MockSource::new();
    source.push_fix(Ok(Coordinate::new(f64::NAN, 124.6480)));
    source.push_fix(Ok(Coordinate::new(95.0, 124.6480)));
    let mut tracker = create_test_tracker(source);

    for _ in 0..2 {
        assert_eq!(tracker.start().await, Err(SensorError::SensorUnavailable));
        assert_eq!(tracker.state(), TrackerState::Idle);
        assert_eq!(tracker.last_known_position(), None);
    }
    assert_eq!(tracker.source.opened_count(), 0);
    assert_eq!(tracker.metrics.report().positions_discarded, 2);
}

#[tokio::test]
async fn test_retry_after_failed_start() {
    let source = MockSource::new();
    source.push_fix(Err(SensorError::PermissionDenied));
    source.push_fix(Ok(Coordinate::new(8.4830, 124.6480)));
    let mut tracker = create_test_tracker(source);

    assert!(tracker.start().await.is_err());
    assert!(matches!(tracker.start().await, Ok(ToggleOutcome::Started(_))));
    assert!(tracker.is_tracking());
}

#[tokio::test]
async fn test_significant_movement_accepted() {
    let mut tracker = started(MockSource::new().with_fix(8.4830, 124.6480)).await;
    let handle = live_handle(&tracker);

    // ~11 m east
    let event = tracker.handle_sensor_event(reading(handle, 8.4830, 124.6481));
    let Some(TrackerEvent::PositionAccepted(accepted)) = event else {
        panic!("expected PositionAccepted");
    };
    assert!(!accepted.first_fix);
    assert_eq!(tracker.last_known_position(), Some(Coordinate::new(8.4830, 124.6481)));
}

#[tokio::test]
async fn test_jitter_discarded() {
    let mut tracker = started(MockSource::new().with_fix(8.4830, 124.6480)).await;
    let handle = live_handle(&tracker);

    // ~1.5 m away
    assert_eq!(tracker.handle_sensor_event(reading(handle, 8.48301, 124.64801)), None);
    assert_eq!(tracker.last_known_position(), Some(Coordinate::new(8.4830, 124.6480)));
}

#[tokio::test]
async fn test_filter_compares_against_last_accepted_not_last_seen() {
    let mut tracker = started(MockSource::new().with_fix(0.0, 0.0)).await;
    let handle = live_handle(&tracker);
    // 0.00005 degrees of latitude is ~5.6 m
    let step = 0.00005;

    assert_eq!(tracker.handle_sensor_event(reading(handle, step, 0.0)), None);
    let event = tracker.handle_sensor_event(reading(handle, 2.0 * step, 0.0));
    assert!(matches!(event, Some(TrackerEvent::PositionAccepted(_))));
}

#[tokio::test]
async fn test_toggle_twice_releases_once() {
    let mut tracker = create_test_tracker(MockSource::new().with_fix(8.4830, 124.6480));

    assert!(matches!(tracker.toggle_tracking().await, Ok(ToggleOutcome::Started(_))));
    let handle = live_handle(&tracker);
    assert_eq!(tracker.toggle_tracking().await, Ok(ToggleOutcome::Stopped));

    assert_eq!(tracker.state(), TrackerState::Idle);
    assert_eq!(tracker.last_known_position(), None);
    assert_eq!(*tracker.source.cleared.lock(), vec![handle]);

    // Idle stop afterwards must not release again
    assert!(!tracker.stop());
    drop(tracker);
}

#[tokio::test]
async fn test_stop_while_idle_is_noop() {
    let mut tracker = create_test_tracker(MockSource::new());
    assert!(!tracker.stop());
    assert!(!tracker.stop());
    assert_eq!(tracker.state(), TrackerState::Idle);
    assert_eq!(tracker.source.cleared_count(), 0);
}

#[tokio::test]
async fn test_no_events_after_stop() {
    let mut tracker = started(MockSource::new().with_fix(8.4830, 124.6480)).await;
    let handle = live_handle(&tracker);
    tracker.stop();

    assert_eq!(tracker.handle_sensor_event(reading(handle, 9.0, 125.0)), None);
    let fault = SensorEvent::Fault { handle, error: SensorError::Terminal("gone".into()) };
    assert_eq!(tracker.handle_sensor_event(fault), None);
    assert_eq!(tracker.source.cleared_count(), 1);
}

#[tokio::test]
async fn test_first_fix_after_restart_ignores_previous_session() {
    let source = MockSource::new().with_fix(8.4830, 124.6480);
    source.push_fix(Ok(Coordinate::new(8.4830, 124.6480)));
    let mut tracker = started(source).await;
    let old_handle = live_handle(&tracker);
    tracker.stop();

    // Same spot as the old session's last fix: still accepted as first fix
    let Ok(ToggleOutcome::Started(accepted)) = tracker.start().await else {
        panic!("restart failed");
    };
    assert!(accepted.first_fix);

    // Readings still queued from the old watch are ignored
    assert_eq!(tracker.handle_sensor_event(reading(old_handle, 10.0, 125.0)), None);
    assert_eq!(tracker.last_known_position(), Some(Coordinate::new(8.4830, 124.6480)));
}

#[tokio::test]
async fn test_transient_fault_keeps_session() {
    let mut tracker = started(MockSource::new().with_fix(8.4830, 124.6480)).await;
    let handle = live_handle(&tracker);

    for error in [SensorError::Timeout, SensorError::SignalLost("tunnel".into())] {
        let event = tracker.handle_sensor_event(SensorEvent::Fault { handle, error: error.clone() });
        assert_eq!(event, Some(TrackerEvent::SensorFault(error)));
    }
    assert!(tracker.is_tracking());
    assert_eq!(tracker.last_known_position(), Some(Coordinate::new(8.4830, 124.6480)));
    assert_eq!(tracker.source.cleared_count(), 0);
}

#[tokio::test]
async fn test_terminal_fault_ends_session_and_releases() {
    let mut tracker = started(MockSource::new().with_fix(8.4830, 124.6480)).await;
    let handle = live_handle(&tracker);

    let error = SensorError::Terminal("provider disabled".into());
    let event = tracker.handle_sensor_event(SensorEvent::Fault { handle, error: error.clone() });
    assert_eq!(event, Some(TrackerEvent::SessionEnded(error)));
    assert_eq!(tracker.state(), TrackerState::Idle);
    assert_eq!(*tracker.source.cleared.lock(), vec![handle]);

    assert!(!tracker.stop());
    assert_eq!(tracker.source.cleared_count(), 1);
}

#[tokio::test]
async fn test_drop_releases_live_watch() {
    let tracker = started(MockSource::new().with_fix(8.4830, 124.6480)).await;
    let source = tracker.source.clone();
    drop(tracker);
    assert_eq!(source.cleared_count(), 1);
}

#[tokio::test]
async fn test_invalid_reading_discarded() {
    let mut tracker = started(MockSource::new().with_fix(8.4830, 124.6480)).await;
    let handle = live_handle(&tracker);

    assert_eq!(tracker.handle_sensor_event(reading(handle, f64::NAN, 124.0)), None);
    assert_eq!(tracker.handle_sensor_event(reading(handle, 91.0, 124.0)), None);
    assert!(tracker.is_tracking());
}

#[tokio::test]
async fn test_metrics_count_accepted_and_discarded() {
    let mut tracker = started(MockSource::new().with_fix(8.4830, 124.6480)).await;
    let handle = live_handle(&tracker);

    tracker.handle_sensor_event(reading(handle, 8.48301, 124.64801));
    tracker.handle_sensor_event(reading(handle, 8.4830, 124.6481));

    let summary = tracker.metrics.report();
    assert_eq!(summary.positions_accepted, 2);
    assert_eq!(summary.positions_discarded, 1);
    assert_eq!(summary.sessions_started, 1);
}
