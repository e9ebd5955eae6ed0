//! Services - tracking logic and the event loop
//!
//! - `tracker` - LocationTracker state machine and movement filter
//! - `synchronizer` - nearby-places refresh and reverse geocoding
//! - `controller` - single-threaded loop gluing sensor, network and view

pub mod controller;
pub mod synchronizer;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use controller::{Command, LiveLocationController};
pub use synchronizer::{NearbyPlacesSynchronizer, SyncEvent};
pub use tracker::{LocationTracker, PositionAccepted, ToggleOutcome, TrackerEvent, TrackerState};
