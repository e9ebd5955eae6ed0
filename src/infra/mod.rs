//! Infrastructure - configuration, metrics, and logging
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults)
//! - `metrics` - Lock-free pipeline counters
//! - `logging` - tracing subscriber initialisation

pub mod config;
pub mod logging;
pub mod metrics;

// Re-export commonly used types
pub use config::{Config, LogFormat};
pub use metrics::Metrics;
