use std::time::Duration;

use thiserror::Error;

use crate::location::PermissionStatus;
use crate::session::SessionState;
use crate::store::SessionId;

/// Failures reported by the device location capability. These are values
/// handed to the caller, never panics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("location permission not granted ({0})")]
    PermissionDenied(PermissionStatus),
    #[error("no location fix within {0:?}")]
    Timeout(Duration),
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to (de)serialize session: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage backend rejected the request: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("cannot {operation} a session that is {state}")]
    InvalidTransition {
        state: SessionState,
        operation: &'static str,
    },
    #[error("location permission is {0}, refusing to start tracking")]
    Permission(PermissionStatus),
    #[error(transparent)]
    Location(#[from] LocationError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse yaml: {0}")]
    Yaml(#[from] yaml_rust::ScanError),
    #[error("invalid config: {0}")]
    Invalid(String),
}
