//! Continuous position source interface
//!
//! A `PositionSource` hands out one-shot fixes and long-lived watches. Watch
//! readings are pushed as `SensorEvent`s into the caller's channel, each
//! tagged with the handle of the watch that produced it so readings from a
//! released watch can be recognised and dropped.

use crate::domain::error::SensorError;
use crate::domain::types::Coordinate;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Request options passed through to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the platform may return (zero = always fresh)
    pub maximum_age: Duration,
}

/// Opaque id of an active watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(pub u64);

impl std::fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something a watch delivered
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Reading { handle: WatchHandle, coordinate: Coordinate },
    Fault { handle: WatchHandle, error: SensorError },
}

impl SensorEvent {
    pub fn handle(&self) -> WatchHandle {
        match self {
            Self::Reading { handle, .. } | Self::Fault { handle, .. } => *handle,
        }
    }
}

#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Single fix, honouring `options.timeout`
    async fn current_position(&self, options: PositionOptions) -> Result<Coordinate, SensorError>;

    /// Start a continuous watch delivering into `events`
    fn watch_position(
        &self,
        options: PositionOptions,
        events: mpsc::Sender<SensorEvent>,
    ) -> Result<WatchHandle, SensorError>;

    /// Stop a watch. Must tolerate unknown handles.
    fn clear_watch(&self, handle: WatchHandle);
}

/// An open watch, cleared when dropped
///
/// Owning the handle through this guard means every exit path (explicit
/// stop, terminal fault, tracker drop) releases it exactly once.
pub struct SensorSubscription {
    source: Arc<dyn PositionSource>,
    handle: WatchHandle,
}

impl SensorSubscription {
    pub fn open(
        source: Arc<dyn PositionSource>,
        options: PositionOptions,
        events: mpsc::Sender<SensorEvent>,
    ) -> Result<Self, SensorError> {
        let handle = source.watch_position(options, events)?;
        debug!(handle = %handle, "sensor_watch_opened");
        Ok(Self { source, handle })
    }

    pub fn handle(&self) -> WatchHandle {
        self.handle
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        self.source.clear_watch(self.handle);
        debug!(handle = %self.handle, "sensor_watch_cleared");
    }
}

impl std::fmt::Debug for SensorSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSubscription").field("handle", &self.handle).finish()
    }
}
