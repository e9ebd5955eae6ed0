//! Shared value types for places and positions

use serde::{Deserialize, Deserializer};

/// A WGS84 position in decimal degrees
///
/// Latitude is expected in [-90, 90] and longitude in [-180, 180]; values
/// coming from the position source are assumed to be pre-validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True when both components are finite and inside their ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Raw coordinate text used when no address can be resolved
    pub fn fallback_label(&self) -> String {
        format!("Latitude: {:.6}, Longitude: {:.6}", self.latitude, self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// A place served by the backend
///
/// The backend is schemaless, so field aliases from older records are
/// accepted (`lat`/`latitude`, `lng`/`longitude`, `category`/`type`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Establishment {
    #[serde(default, alias = "_id", deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "type")]
    pub category: String,
    #[serde(default, alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lng")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Establishment {
    /// Position of the place, if the record carries a usable one
    pub fn coordinate(&self) -> Option<Coordinate> {
        let coordinate = Coordinate::new(self.latitude?, self.longitude?);
        coordinate.is_valid().then_some(coordinate)
    }

    /// Description, falling back to the street address
    pub fn summary(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(self.address.as_deref())
            .unwrap_or("")
    }
}

/// Ids arrive either as strings or as bare numbers depending on the store
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Reply body of the reverse-geocoding endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub address: Option<String>,
}
