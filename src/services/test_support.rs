//! Hand-written collaborators shared by the service tests

use crate::domain::error::{DataSourceError, SensorError};
use crate::domain::types::{Coordinate, Establishment, GeocodeResponse};
use crate::io::data_source::EstablishmentDataSource;
use crate::io::position_source::{PositionOptions, PositionSource, SensorEvent, WatchHandle};
use crate::io::view::ViewReconciler;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub fn place(name: &str) -> Establishment {
    Establishment {
        id: name.to_lowercase().replace(' ', "-"),
        name: name.to_string(),
        category: "Restaurant".to_string(),
        latitude: Some(8.48),
        longitude: Some(124.65),
        rating: 4.2,
        description: None,
        address: Some("Cagayan de Oro".to_string()),
    }
}

pub fn places(count: usize) -> Vec<Establishment> {
    (0..count).map(|i| place(&format!("Place {i}"))).collect()
}

/// Position source with a scripted first fix and counted watch lifecycle
pub struct MockSource {
    fixes: Mutex<VecDeque<Result<Coordinate, SensorError>>>,
    watch_error: Mutex<Option<SensorError>>,
    next_handle: AtomicU64,
    pub watches_opened: AtomicUsize,
    pub cleared: Mutex<Vec<WatchHandle>>,
    pub last_options: Mutex<Vec<PositionOptions>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            fixes: Mutex::new(VecDeque::new()),
            watch_error: Mutex::new(None),
            next_handle: AtomicU64::new(1),
            watches_opened: AtomicUsize::new(0),
            cleared: Mutex::new(Vec::new()),
            last_options: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fix(self, lat: f64, lng: f64) -> Self {
        self.push_fix(Ok(Coordinate::new(lat, lng)));
        self
    }

    pub fn push_fix(&self, fix: Result<Coordinate, SensorError>) {
        self.fixes.lock().push_back(fix);
    }

    pub fn fail_watch(&self, error: SensorError) {
        *self.watch_error.lock() = Some(error);
    }

    pub fn cleared_count(&self) -> usize {
        self.cleared.lock().len()
    }

    pub fn opened_count(&self) -> usize {
        self.watches_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PositionSource for MockSource {
    async fn current_position(&self, options: PositionOptions) -> Result<Coordinate, SensorError> {
        self.last_options.lock().push(options);
        let next = self.fixes.lock().pop_front();
        next.unwrap_or(Err(SensorError::SensorUnavailable))
    }

    fn watch_position(
        &self,
        options: PositionOptions,
        _events: tokio::sync::mpsc::Sender<SensorEvent>,
    ) -> Result<WatchHandle, SensorError> {
        self.last_options.lock().push(options);
        if let Some(error) = self.watch_error.lock().take() {
            return Err(error);
        }
        self.watches_opened.fetch_add(1, Ordering::SeqCst);
        Ok(WatchHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    fn clear_watch(&self, handle: WatchHandle) {
        self.cleared.lock().push(handle);
    }
}

/// Places backend with queued nearby replies and a fixed geocode reply
pub struct MockDataSource {
    catalogue: Mutex<Result<Vec<Establishment>, DataSourceError>>,
    nearby: Mutex<VecDeque<Result<Vec<Establishment>, DataSourceError>>>,
    /// Replies bound to a position, answered after a delay
    nearby_at: Mutex<Vec<(Coordinate, Duration, Result<Vec<Establishment>, DataSourceError>)>>,
    geocode: Mutex<Result<GeocodeResponse, DataSourceError>>,
    nearby_calls: Mutex<Vec<(Coordinate, u32)>>,
    geocode_calls: AtomicUsize,
    token: bool,
}

impl MockDataSource {
    pub fn new() -> Self {
        Self {
            catalogue: Mutex::new(Ok(Vec::new())),
            nearby: Mutex::new(VecDeque::new()),
            nearby_at: Mutex::new(Vec::new()),
            geocode: Mutex::new(Err(DataSourceError::Network("not scripted".into()))),
            nearby_calls: Mutex::new(Vec::new()),
            geocode_calls: AtomicUsize::new(0),
            token: true,
        }
    }

    pub fn without_token(mut self) -> Self {
        self.token = false;
        self
    }

    pub fn set_catalogue(&self, result: Result<Vec<Establishment>, DataSourceError>) {
        *self.catalogue.lock() = result;
    }

    pub fn push_nearby(&self, result: Result<Vec<Establishment>, DataSourceError>) {
        self.nearby.lock().push_back(result);
    }

    pub fn push_nearby_at(
        &self,
        at: Coordinate,
        delay: Duration,
        result: Result<Vec<Establishment>, DataSourceError>,
    ) {
        self.nearby_at.lock().push((at, delay, result));
    }

    pub fn set_geocode(&self, result: Result<GeocodeResponse, DataSourceError>) {
        *self.geocode.lock() = result;
    }

    pub fn nearby_calls(&self) -> Vec<(Coordinate, u32)> {
        self.nearby_calls.lock().clone()
    }

    pub fn geocode_calls(&self) -> usize {
        self.geocode_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EstablishmentDataSource for MockDataSource {
    async fn establishments(&self) -> Result<Vec<Establishment>, DataSourceError> {
        self.catalogue.lock().clone()
    }

    async fn nearby(
        &self,
        at: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<Establishment>, DataSourceError> {
        self.nearby_calls.lock().push((at, radius_m));
        let bound = {
            let mut replies = self.nearby_at.lock();
            replies.iter().position(|(c, _, _)| *c == at).map(|idx| replies.remove(idx))
        };
        if let Some((_, delay, result)) = bound {
            tokio::time::sleep(delay).await;
            return result;
        }
        let next = self.nearby.lock().pop_front();
        next.unwrap_or_else(|| Err(DataSourceError::Network("no scripted reply".into())))
    }

    async fn geocode(&self, _at: Coordinate) -> Result<GeocodeResponse, DataSourceError> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        self.geocode.lock().clone()
    }

    fn has_token(&self) -> bool {
        self.token
    }
}

/// View that records every call
#[derive(Debug, Default)]
pub struct RecordingView {
    pub renders: Vec<Vec<Establishment>>,
    pub positions: Vec<Coordinate>,
    pub cleared: usize,
    pub addresses: Vec<String>,
    pub notices: Vec<String>,
}

impl RecordingView {
    /// What the listing currently shows
    pub fn displayed(&self) -> &[Establishment] {
        self.renders.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl ViewReconciler for RecordingView {
    fn render(&mut self, establishments: &[Establishment]) {
        self.renders.push(establishments.to_vec());
    }

    fn show_user_position(&mut self, at: Coordinate) {
        self.positions.push(at);
    }

    fn clear_user_position(&mut self) {
        self.cleared += 1;
    }

    fn show_address(&mut self, address: &str) {
        self.addresses.push(address.to_string());
    }

    fn show_notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}
