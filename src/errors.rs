//! Error types for the service monitor

use std::fmt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug)]
pub enum MonitorError {
    /// IO operation failed
    Io(std::io::Error),

    /// HTTP request failed
    Http(reqwest::Error),

    /// JSON serialization/deserialization failed
    Json(serde_json::Error),

    /// Configuration error
    Config(String),

    /// Metrics registry rejected an operation
    Metrics(prometheus::Error),

    /// No metric registered under this name
    UnknownMetric(String),

    /// Label values do not match the metric's label names
    InvalidLabels {
        metric: String,
        expected: usize,
        got: usize,
    },

    /// Value cannot be applied to the metric (negative counter delta, NaN)
    InvalidValue { metric: String, value: f64 },

    /// Partner service answered with an error status
    Partner { url: String, status: u16 },

    /// Request did not complete in time
    Timeout(Duration),

    /// Generic error with message
    Other(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Io(err) => write!(f, "IO error: {}", err),
            MonitorError::Http(err) => write!(f, "HTTP error: {}", err),
            MonitorError::Json(err) => write!(f, "JSON error: {}", err),
            MonitorError::Config(msg) => write!(f, "Configuration error: {}", msg),
            MonitorError::Metrics(err) => write!(f, "Metrics error: {}", err),
            MonitorError::UnknownMetric(name) => write!(f, "Unknown metric: {}", name),
            MonitorError::InvalidLabels { metric, expected, got } => write!(
                f,
                "Metric {} expects {} label values, got {}",
                metric, expected, got
            ),
            MonitorError::InvalidValue { metric, value } => {
                write!(f, "Invalid value {} for metric {}", value, metric)
            }
            MonitorError::Partner { url, status } => {
                write!(f, "Partner endpoint {} returned status {}", url, status)
            }
            MonitorError::Timeout(after) => {
                write!(f, "Timed out after {}ms", after.as_millis())
            }
            MonitorError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Io(err) => Some(err),
            MonitorError::Http(err) => Some(err),
            MonitorError::Json(err) => Some(err),
            MonitorError::Metrics(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::Io(err)
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::Http(err)
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Json(err)
    }
}

impl From<prometheus::Error> for MonitorError {
    fn from(err: prometheus::Error) -> Self {
        MonitorError::Metrics(err)
    }
}
