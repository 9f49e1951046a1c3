//! Collaborator capabilities consumed by a navigation session.
//!
//! This module defines the traits that platform integrations must fulfill:
//! location fixes, walking routes, speech output and speech input. Sessions
//! receive them at construction so tests and the simulator can substitute
//! deterministic implementations.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::geo::Position;
use crate::route::Waypoint;

/// Errors reported by a location provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The user or platform refused location access.
    #[error("location permission denied")]
    PermissionDenied,

    /// No fix arrived within the requested time.
    #[error("location fix timed out after {timeout_ms} ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The provider could not produce a fix.
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

impl LocationError {
    /// Create a timeout error for the given duration.
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Errors reported by a router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The routing request failed.
    #[error("route request failed: {0}")]
    Request(String),

    /// The router answered but no usable path exists.
    #[error("no walking path found")]
    NoPath,

    /// The router's response could not be understood.
    #[error("malformed route response: {0}")]
    Parse(String),
}

impl RouteError {
    /// Create a request error.
    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    /// Create a parse error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}

/// Errors reported by speech input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    /// Speech recognition is not available on this device.
    #[error("speech recognition unavailable")]
    Unavailable,

    /// Microphone or recognition permission was refused.
    #[error("speech recognition permission denied")]
    PermissionDenied,
}

/// Requested fix accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accuracy {
    /// Satellite-grade accuracy, slower to obtain.
    High,
    /// Whatever the device can produce quickly (network, cached).
    Low,
}

impl std::fmt::Display for Accuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// One event from a continuous fix subscription.
pub type FixEvent = Result<Position, LocationError>;

/// One event from speech recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// A (partial or final) transcript.
    Transcript(String),
    /// Recognition failed; listening has stopped.
    Error(String),
}

/// A handle to a continuous fix subscription.
///
/// This is a lightweight, cloneable handle; cancelling any clone cancels the
/// subscription for all of them.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

static NEXT_WATCH_ID: AtomicU64 = AtomicU64::new(1);

impl WatchHandle {
    /// Create a new, active watch handle with a unique id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_WATCH_ID.fetch_add(1, Ordering::Relaxed),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The subscription id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Signal the subscription to stop delivering fixes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for WatchHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of GPS fixes.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    /// Ask for location permission; returns whether it was granted.
    async fn request_permission(&self) -> bool;

    /// Obtain a single fix.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::Timeout`] when no fix arrives within
    /// `timeout`, or another [`LocationError`] on provider failure.
    async fn current_fix(
        &self,
        accuracy: Accuracy,
        timeout: Duration,
    ) -> Result<Position, LocationError>;

    /// Start delivering fixes (and fix errors) through `tx` until the
    /// returned handle is cancelled or the receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be started.
    fn watch_fixes(&self, tx: mpsc::Sender<FixEvent>) -> Result<WatchHandle, LocationError>;

    /// Stop a subscription started by [`LocationProvider::watch_fixes`].
    fn cancel_watch(&self, handle: &WatchHandle) {
        handle.cancel();
    }
}

/// External walking-route service.
#[async_trait::async_trait]
pub trait Router: Send + Sync {
    /// Compute the ordered waypoints of a walking route.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] if the request fails or yields no path.
    async fn compute_walking_route(
        &self,
        start: Position,
        end: Position,
    ) -> Result<Vec<Waypoint>, RouteError>;
}

/// Text-to-speech output. Fire-and-forget: no completion signal is assumed.
pub trait SpeechOutput: Send + Sync {
    /// Start speaking `text`.
    fn speak(&self, text: &str);

    /// Stop any utterance in progress.
    fn stop(&self);
}

/// Speech recognition.
pub trait SpeechInput: Send + Sync {
    /// Start listening, delivering events through `tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if recognition is unavailable or not permitted.
    fn listen(&self, tx: mpsc::Sender<SpeechEvent>) -> Result<(), SpeechError>;

    /// Stop listening.
    fn stop_listening(&self);
}

/// The full set of collaborators a session needs.
#[derive(Clone)]
pub struct Capabilities {
    /// GPS fixes.
    pub location: Arc<dyn LocationProvider>,
    /// Walking routes.
    pub router: Arc<dyn Router>,
    /// Spoken output.
    pub speech_out: Arc<dyn SpeechOutput>,
    /// Voice commands.
    pub speech_in: Arc<dyn SpeechInput>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_handle_new() {
        let handle = WatchHandle::new();
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn test_watch_handle_ids_are_unique() {
        let a = WatchHandle::new();
        let b = WatchHandle::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_watch_handle_clone_shares_signal() {
        let handle1 = WatchHandle::new();
        let handle2 = handle1.clone();

        handle1.cancel();
        assert!(handle2.is_cancelled());
        assert_eq!(handle1.id(), handle2.id());
    }

    #[test]
    fn test_accuracy_display() {
        assert_eq!(Accuracy::High.to_string(), "high");
        assert_eq!(Accuracy::Low.to_string(), "low");
    }

    #[test]
    fn test_location_error_timeout() {
        let err = LocationError::timeout(Duration::from_secs(10));
        assert_eq!(err, LocationError::Timeout { timeout_ms: 10_000 });
        assert!(err.to_string().contains("10000 ms"));
    }

    #[test]
    fn test_location_error_display() {
        assert!(LocationError::PermissionDenied
            .to_string()
            .contains("permission"));
        assert!(LocationError::unavailable("no satellites")
            .to_string()
            .contains("no satellites"));
    }

    #[test]
    fn test_route_error_display() {
        assert!(RouteError::request("HTTP 503")
            .to_string()
            .contains("HTTP 503"));
        assert!(RouteError::NoPath.to_string().contains("no walking path"));
        assert!(RouteError::parse("missing features")
            .to_string()
            .contains("missing features"));
    }

    #[test]
    fn test_speech_error_display() {
        assert!(SpeechError::Unavailable.to_string().contains("unavailable"));
        assert!(SpeechError::PermissionDenied
            .to_string()
            .contains("permission"));
    }
}
