//! Error types for walkguide.
//!
//! This module defines the crate-level error type returned by session startup,
//! configuration loading and the CLI, along with the spoken message each
//! failure category produces for the user.

use std::path::PathBuf;
use thiserror::Error;

use crate::capability::{LocationError, RouteError};
use crate::geo::GeoError;

/// Spoken when location permission is refused.
pub const PERMISSION_MESSAGE: &str = "위치 권한이 필요합니다. 설정에서 위치 권한을 허용해 주세요.";

/// Spoken when no usable GPS fix could be obtained.
pub const FIX_FAILURE_MESSAGE: &str = "현재 위치를 찾을 수 없습니다. 잠시 후 다시 시도해 주세요.";

/// Spoken when the router cannot produce a walking path.
pub const ROUTE_FAILURE_MESSAGE: &str = "목적지까지 가는 경로를 찾을 수 없습니다.";

/// The main error type for walkguide operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Session Startup Errors ===
    /// Location permission was refused by the user or platform.
    #[error("location permission denied")]
    Permission,

    /// No fix arrived even after the low-accuracy retry.
    #[error("could not obtain a GPS fix after {attempts} attempts: {source}")]
    FixTimeout {
        /// Number of acquisition attempts made.
        attempts: u32,
        /// The error from the last attempt.
        #[source]
        source: LocationError,
    },

    /// The router failed or returned no usable path.
    #[error("routing failed: {0}")]
    Route(#[from] RouteError),

    /// A location provider failure outside of fix acquisition.
    #[error("location provider error: {0}")]
    Location(#[from] LocationError),

    /// Malformed coordinates reached the geodesic layer.
    #[error(transparent)]
    InvalidPosition(#[from] GeoError),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read an input file.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// Path that couldn't be read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// The session was already ended or its input channel is gone.
    #[error("navigation session is closed")]
    SessionClosed,

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for walkguide operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error is a permission issue.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(
            self,
            Self::Permission | Self::Location(LocationError::PermissionDenied)
        )
    }

    /// Check if this error came from the routing step.
    #[must_use]
    pub fn is_route_error(&self) -> bool {
        matches!(self, Self::Route(_))
    }

    /// The message spoken to the user when this error ends a session.
    ///
    /// Each startup category gets exactly one message so the user can tell
    /// "I can't find you" apart from "I can't find a path".
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Permission | Self::Location(LocationError::PermissionDenied) => {
                PERMISSION_MESSAGE
            }
            Self::Route(_) => ROUTE_FAILURE_MESSAGE,
            _ => FIX_FAILURE_MESSAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Permission;
        assert_eq!(err.to_string(), "location permission denied");

        let err = Error::internal("test error");
        assert_eq!(err.to_string(), "internal error: test error");
    }

    #[test]
    fn test_error_is_permission_error() {
        assert!(Error::Permission.is_permission_error());
        assert!(Error::Location(LocationError::PermissionDenied).is_permission_error());
        assert!(!Error::SessionClosed.is_permission_error());
    }

    #[test]
    fn test_error_is_route_error() {
        assert!(Error::Route(RouteError::NoPath).is_route_error());
        assert!(!Error::Permission.is_route_error());
    }

    #[test]
    fn test_user_messages_are_distinct_per_category() {
        let permission = Error::Permission.user_message();
        let fix = Error::FixTimeout {
            attempts: 2,
            source: LocationError::Timeout { timeout_ms: 20_000 },
        }
        .user_message();
        let route = Error::Route(RouteError::NoPath).user_message();

        assert_ne!(permission, fix);
        assert_ne!(fix, route);
        assert_ne!(permission, route);
    }

    #[test]
    fn test_fix_timeout_display() {
        let err = Error::FixTimeout {
            attempts: 2,
            source: LocationError::Timeout { timeout_ms: 20_000 },
        };
        let msg = err.to_string();
        assert!(msg.contains("2 attempts"));
        assert!(msg.contains("20000"));
    }

    #[test]
    fn test_from_route_error() {
        let err: Error = RouteError::request("HTTP 502").into();
        assert!(matches!(err, Error::Route(RouteError::Request(_))));
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn test_from_geo_error() {
        let err: Error = GeoError::InvalidPosition {
            latitude: f64::NAN,
            longitude: 0.0,
        }
        .into();
        assert!(matches!(err, Error::InvalidPosition(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::config_validation("trigger_radius_m must be positive");
        assert!(err.to_string().contains("trigger_radius_m"));
    }

    #[test]
    fn test_file_read_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::FileRead {
            path: PathBuf::from("/tmp/trace.json"),
            source: io_err,
        };
        assert!(err.to_string().contains("/tmp/trace.json"));
    }
}
