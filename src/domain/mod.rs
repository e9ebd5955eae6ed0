//! Domain models - value types and pure computations
//!
//! - `types` - Coordinate, Establishment, geocode reply
//! - `distance` - haversine great-circle distance
//! - `error` - sensor and backend error taxonomy
//! - `filter` - catalogue search/category filtering

pub mod distance;
pub mod error;
pub mod filter;
pub mod types;

pub use distance::{distance, EARTH_RADIUS_M};
pub use error::{DataSourceError, SensorError};
pub use types::{Coordinate, Establishment, GeocodeResponse};
