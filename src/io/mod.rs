//! IO modules - external collaborator interfaces
//!
//! - `position_source` - continuous position sensor contract and watch guard
//! - `replay` - scripted position source (CLI replays, tests)
//! - `data_source` - places backend over HTTP
//! - `view` - display layer contract and console rendering

pub mod data_source;
pub mod position_source;
pub mod replay;
pub mod view;

// Re-export commonly used types
pub use data_source::{EstablishmentDataSource, HttpDataSource};
pub use position_source::{
    PositionOptions, PositionSource, SensorEvent, SensorSubscription, WatchHandle,
};
pub use replay::{ReplaySource, TimedStep};
pub use view::{ConsoleView, ViewReconciler};
