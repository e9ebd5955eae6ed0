//! Error taxonomy for the position sensor and the places backend

use thiserror::Error;

/// Failures reported by a position source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The user or platform refused location access
    #[error("location permission denied")]
    PermissionDenied,

    /// No position provider exists on this platform
    #[error("position sensor unavailable")]
    SensorUnavailable,

    /// No fix within the configured timeout
    #[error("position request timed out")]
    Timeout,

    /// Fix temporarily lost (tunnel, indoor, ...)
    #[error("position signal lost: {0}")]
    SignalLost(String),

    /// The subscription cannot continue
    #[error("position sensor failed: {0}")]
    Terminal(String),
}

impl SensorError {
    /// Whether a fault on a live watch ends the session
    ///
    /// Permission revocation mid-session is as final as a hard failure;
    /// timeouts and signal loss are per-reading.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_) | Self::PermissionDenied | Self::SensorUnavailable)
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::SensorUnavailable => "sensor_unavailable",
            Self::Timeout => "timeout",
            Self::SignalLost(_) => "signal_lost",
            Self::Terminal(_) => "terminal",
        }
    }
}

/// Failures talking to the places backend
///
/// `Malformed` is handled exactly like `Network` by every caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    /// Backend rejected the bearer token (token has been dropped)
    #[error("not authorized")]
    Unauthorized,
}
