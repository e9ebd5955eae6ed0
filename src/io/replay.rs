//! Scripted position source
//!
//! Replays a recorded sequence of readings and faults, one JSON object per
//! line:
//!
//! ```text
//! {"lat": 8.4830, "lng": 124.6480, "delay_ms": 0}
//! {"lat": 8.4830, "lng": 124.6481, "delay_ms": 1000}
//! {"fault": "signal_lost", "delay_ms": 500}
//! ```
//!
//! The first step answers `current_position`; the rest feed the watch. A
//! step whose delay exceeds the request timeout yields a `Timeout` fault at
//! the timeout mark before the step itself is delivered.

use crate::domain::error::SensorError;
use crate::domain::types::Coordinate;
use crate::io::position_source::{PositionOptions, PositionSource, SensorEvent, WatchHandle};
use anyhow::{bail, Context};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayStep {
    Reading(Coordinate),
    Fault(SensorError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedStep {
    pub delay: Duration,
    pub step: ReplayStep,
}

impl TimedStep {
    pub fn reading(delay_ms: u64, latitude: f64, longitude: f64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            step: ReplayStep::Reading(Coordinate::new(latitude, longitude)),
        }
    }

    pub fn fault(delay_ms: u64, error: SensorError) -> Self {
        Self { delay: Duration::from_millis(delay_ms), step: ReplayStep::Fault(error) }
    }
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    delay_ms: u64,
    #[serde(default, alias = "latitude")]
    lat: Option<f64>,
    #[serde(default, alias = "longitude")]
    lng: Option<f64>,
    #[serde(default)]
    fault: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl RawStep {
    fn into_step(self) -> anyhow::Result<TimedStep> {
        let delay = Duration::from_millis(self.delay_ms);
        let detail = self.detail.unwrap_or_default();
        let step = match (self.fault.as_deref(), self.lat, self.lng) {
            (Some("permission_denied"), _, _) => ReplayStep::Fault(SensorError::PermissionDenied),
            (Some("sensor_unavailable"), _, _) => ReplayStep::Fault(SensorError::SensorUnavailable),
            (Some("timeout"), _, _) => ReplayStep::Fault(SensorError::Timeout),
            (Some("signal_lost"), _, _) => ReplayStep::Fault(SensorError::SignalLost(detail)),
            (Some("terminal"), _, _) => ReplayStep::Fault(SensorError::Terminal(detail)),
            (Some(other), _, _) => bail!("unknown fault kind {other:?}"),
            (None, Some(lat), Some(lng)) => {
                let coordinate = Coordinate::new(lat, lng);
                if !coordinate.is_valid() {
                    bail!("coordinate out of range: {lat}, {lng}");
                }
                ReplayStep::Reading(coordinate)
            }
            (None, _, _) => bail!("step needs either lat/lng or fault"),
        };
        Ok(TimedStep { delay, step })
    }
}

/// Parse a JSONL replay script; blank lines and `#` comments are skipped
pub fn parse_script(text: &str) -> anyhow::Result<Vec<TimedStep>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            let raw: RawStep = serde_json::from_str(line)
                .with_context(|| format!("line {}: invalid JSON", idx + 1))?;
            raw.into_step().with_context(|| format!("line {}", idx + 1))
        })
        .collect()
}

pub struct ReplaySource {
    steps: Mutex<VecDeque<TimedStep>>,
    watches: Mutex<HashMap<WatchHandle, JoinHandle<()>>>,
    next_handle: AtomicU64,
    drained_tx: Arc<watch::Sender<bool>>,
}

impl ReplaySource {
    pub fn new(steps: Vec<TimedStep>) -> Self {
        let (drained_tx, _) = watch::channel(steps.is_empty());
        let drained_tx = Arc::new(drained_tx);
        Self {
            steps: Mutex::new(steps.into()),
            watches: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            drained_tx,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;
        let steps = parse_script(&text)
            .with_context(|| format!("Failed to parse replay file {}", path.display()))?;
        info!(path = %path.display(), steps = steps.len(), "replay_loaded");
        Ok(Self::new(steps))
    }

    /// Steps not yet delivered to anyone
    pub fn remaining(&self) -> usize {
        self.steps.lock().len()
    }

    pub fn active_watches(&self) -> usize {
        self.watches.lock().len()
    }

    /// Resolves once every step has been delivered or abandoned by a cleared watch
    pub async fn drained(&self) {
        let mut rx = self.drained_tx.subscribe();
        // Err means the sender is gone, which cannot happen while &self lives
        let _ = rx.wait_for(|drained| *drained).await;
    }
}

#[async_trait]
impl PositionSource for ReplaySource {
    async fn current_position(&self, options: PositionOptions) -> Result<Coordinate, SensorError> {
        let next = self.steps.lock().pop_front();
        let Some(next) = next else {
            return Err(SensorError::SensorUnavailable);
        };

        if next.delay > options.timeout {
            tokio::time::sleep(options.timeout).await;
            // The late fix is still consumed, the platform would discard it
            self.drained_tx.send_replace(self.remaining() == 0);
            return Err(SensorError::Timeout);
        }
        tokio::time::sleep(next.delay).await;
        self.drained_tx.send_replace(self.remaining() == 0);

        match next.step {
            ReplayStep::Reading(coordinate) => Ok(coordinate),
            ReplayStep::Fault(error) => Err(error),
        }
    }

    fn watch_position(
        &self,
        options: PositionOptions,
        events: mpsc::Sender<SensorEvent>,
    ) -> Result<WatchHandle, SensorError> {
        let handle = WatchHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let steps: Vec<TimedStep> = self.steps.lock().drain(..).collect();
        let drained_tx = self.drained_tx.clone();

        let task = tokio::spawn(async move {
            for TimedStep { delay, step } in steps {
                if delay > options.timeout {
                    tokio::time::sleep(options.timeout).await;
                    let timeout = SensorEvent::Fault { handle, error: SensorError::Timeout };
                    if events.send(timeout).await.is_err() {
                        break;
                    }
                    tokio::time::sleep(delay - options.timeout).await;
                } else {
                    tokio::time::sleep(delay).await;
                }

                let event = match step {
                    ReplayStep::Reading(coordinate) => SensorEvent::Reading { handle, coordinate },
                    ReplayStep::Fault(error) => SensorEvent::Fault { handle, error },
                };
                if events.send(event).await.is_err() {
                    break;
                }
            }
            drained_tx.send_replace(true);
            debug!(handle = %handle, "replay_watch_finished");
        });

        self.watches.lock().insert(handle, task);
        Ok(handle)
    }

    fn clear_watch(&self, handle: WatchHandle) {
        if let Some(task) = self.watches.lock().remove(&handle) {
            task.abort();
            self.drained_tx.send_replace(true);
        }
    }
}
