//! Places backend client
//!
//! Endpoints (relative to the configured base URL):
//! - `GET /establishments` - full catalogue
//! - `GET /nearby?lat&lng&radius` - places within `radius` meters
//! - `GET /geocode?lat&lng` - `{ "address": "..." }`
//!
//! The bearer token is optional. A 401 drops the token for the rest of the
//! process, after which requests go out anonymously.

use crate::domain::error::DataSourceError;
use crate::domain::types::{Coordinate, Establishment, GeocodeResponse};
use crate::infra::config::Config;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

#[async_trait]
pub trait EstablishmentDataSource: Send + Sync {
    async fn establishments(&self) -> Result<Vec<Establishment>, DataSourceError>;

    async fn nearby(
        &self,
        at: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<Establishment>, DataSourceError>;

    async fn geocode(&self, at: Coordinate) -> Result<GeocodeResponse, DataSourceError>;

    /// Whether requests currently carry a bearer token
    fn has_token(&self) -> bool;
}

pub struct HttpDataSource {
    client: reqwest::Client,
    base_url: String,
    token: Mutex<Option<String>>,
}

impl HttpDataSource {
    pub fn new(config: &Config) -> Result<Self, DataSourceError> {
        // Create HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(config.api_timeout())
            .build()
            .map_err(|e| DataSourceError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url().to_string(),
            token: Mutex::new(config.api_token().map(str::to_string)),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, DataSourceError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url).query(query).header("Accept", "application/json");

        // Clone out so the lock is not held across the await
        let token = self.token.lock().clone();
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response =
            request.send().await.map_err(|e| DataSourceError::Network(e.to_string()))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            if self.token.lock().take().is_some() {
                warn!(path = %path, "api_unauthorized_token_cleared");
            }
            return Err(DataSourceError::Unauthorized);
        }
        if !status.is_success() {
            return Err(DataSourceError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| DataSourceError::Network(e.to_string()))?;
        debug!(path = %path, bytes = body.len(), "api_response");

        serde_json::from_slice(&body).map_err(|e| DataSourceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl EstablishmentDataSource for HttpDataSource {
    async fn establishments(&self) -> Result<Vec<Establishment>, DataSourceError> {
        self.get_json("/establishments", &[]).await
    }

    async fn nearby(
        &self,
        at: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<Establishment>, DataSourceError> {
        let query = [
            ("lat", at.latitude.to_string()),
            ("lng", at.longitude.to_string()),
            ("radius", radius_m.to_string()),
        ];
        self.get_json("/nearby", &query).await
    }

    async fn geocode(&self, at: Coordinate) -> Result<GeocodeResponse, DataSourceError> {
        let query = [("lat", at.latitude.to_string()), ("lng", at.longitude.to_string())];
        self.get_json("/geocode", &query).await
    }

    fn has_token(&self) -> bool {
        self.token.lock().is_some()
    }
}
