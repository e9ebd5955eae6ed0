//! Place locator library
//!
//! Live-location tracking and nearby-place synchronisation for a map-based
//! place directory. Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
