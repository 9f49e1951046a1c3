//! File-backed collaborators for running sessions without a device.
//!
//! A recorded trace stands in for the GPS, a saved route for the routing
//! service, the console for the speech synthesizer and a timed script for
//! the speech recognizer.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::capability::{
    Accuracy, FixEvent, LocationError, LocationProvider, RouteError, Router, SpeechError,
    SpeechEvent, SpeechInput, SpeechOutput, WatchHandle,
};
use crate::error::{Error, Result};
use crate::geo::Position;
use crate::route::{load_waypoints, Waypoint};

/// Replay step used when a trace carries no usable timestamps.
pub const DEFAULT_REPLAY_STEP: Duration = Duration::from_secs(1);

/// Slowest replay speed accepted.
pub const MIN_REPLAY_SPEED: f64 = 0.01;

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Replays a recorded trace as a location provider.
///
/// The first fix answers [`LocationProvider::current_fix`]; the rest are
/// streamed by [`LocationProvider::watch_fixes`], spaced by their recorded
/// timestamps divided by the replay speed.
#[derive(Debug, Clone)]
pub struct ReplayLocationProvider {
    fixes: Vec<Position>,
    speed: f64,
    granted: bool,
}

impl ReplayLocationProvider {
    /// Create a provider replaying `fixes` in real time.
    #[must_use]
    pub fn new(fixes: Vec<Position>) -> Self {
        Self {
            fixes,
            speed: 1.0,
            granted: true,
        }
    }

    /// Parse a trace: a JSON array of positions.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        let fixes: Vec<Position> = serde_json::from_str(json)?;
        Ok(Self::new(fixes))
    }

    /// Load a trace file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let provider = Self::from_json(&read_file(path)?)?;
        info!(path = %path.display(), fixes = provider.fixes.len(), "Loaded trace");
        Ok(provider)
    }

    /// Replay `speed` times faster than recorded. Speeds below
    /// [`MIN_REPLAY_SPEED`] or not finite are ignored.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        if speed.is_finite() && speed >= MIN_REPLAY_SPEED {
            self.speed = speed;
        }
        self
    }

    /// Refuse the location permission request.
    #[must_use]
    pub fn deny_permission(mut self) -> Self {
        self.granted = false;
        self
    }

    /// The recorded fixes.
    #[must_use]
    pub fn fixes(&self) -> &[Position] {
        &self.fixes
    }

    fn step(&self, previous: &Position, next: &Position) -> Duration {
        let recorded = next.timestamp_ms - previous.timestamp_ms;
        let step = u64::try_from(recorded)
            .ok()
            .filter(|ms| *ms > 0)
            .map_or(DEFAULT_REPLAY_STEP, Duration::from_millis);
        Duration::try_from_secs_f64(step.as_secs_f64() / self.speed).unwrap_or(step)
    }
}

#[async_trait::async_trait]
impl LocationProvider for ReplayLocationProvider {
    async fn request_permission(&self) -> bool {
        self.granted
    }

    async fn current_fix(
        &self,
        accuracy: Accuracy,
        _timeout: Duration,
    ) -> std::result::Result<Position, LocationError> {
        if !self.granted {
            return Err(LocationError::PermissionDenied);
        }
        debug!(%accuracy, "Replaying first fix");
        self.fixes
            .first()
            .copied()
            .ok_or_else(|| LocationError::unavailable("trace is empty"))
    }

    fn watch_fixes(
        &self,
        tx: mpsc::Sender<FixEvent>,
    ) -> std::result::Result<WatchHandle, LocationError> {
        if !self.granted {
            return Err(LocationError::PermissionDenied);
        }

        let handle = WatchHandle::new();
        let cancelled = handle.clone();
        let steps: Vec<(Duration, Position)> = self
            .fixes
            .windows(2)
            .map(|pair| (self.step(&pair[0], &pair[1]), pair[1]))
            .collect();

        tokio::spawn(async move {
            debug!(watch_id = cancelled.id(), fixes = steps.len(), "Replay started");
            for (delay, fix) in steps {
                tokio::time::sleep(delay).await;
                if cancelled.is_cancelled() {
                    debug!(watch_id = cancelled.id(), "Replay cancelled");
                    return;
                }
                if tx.send(Ok(fix)).await.is_err() {
                    debug!("Fix channel closed, stopping replay");
                    return;
                }
            }
            debug!(watch_id = cancelled.id(), "Replay finished");
        });

        Ok(handle)
    }
}

/// Serves one saved route for every request.
#[derive(Debug, Clone, Default)]
pub struct FileRouter {
    waypoints: Vec<Waypoint>,
}

impl FileRouter {
    /// Create a router that always answers with `waypoints`.
    #[must_use]
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    /// Load a route file, either a waypoint array or a pedestrian GeoJSON
    /// response.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let waypoints = load_waypoints(&read_file(path)?)?;
        info!(path = %path.display(), waypoints = waypoints.len(), "Loaded route");
        Ok(Self::new(waypoints))
    }

    /// The saved waypoints.
    #[must_use]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }
}

#[async_trait::async_trait]
impl Router for FileRouter {
    async fn compute_walking_route(
        &self,
        start: Position,
        end: Position,
    ) -> std::result::Result<Vec<Waypoint>, RouteError> {
        debug!(
            start_lat = start.latitude,
            start_lon = start.longitude,
            end_lat = end.latitude,
            end_lon = end.longitude,
            "Serving saved route"
        );
        if self.waypoints.is_empty() {
            return Err(RouteError::NoPath);
        }
        Ok(self.waypoints.clone())
    }
}

/// Prints utterances to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSpeech;

impl SpeechOutput for ConsoleSpeech {
    fn speak(&self, text: &str) {
        println!("[speech] {text}");
    }

    fn stop(&self) {
        trace!("Console speech stopped");
    }
}

/// Emits scripted transcripts at fixed offsets from the start of listening.
#[derive(Debug, Default)]
pub struct ScriptedSpeechInput {
    script: Vec<(Duration, String)>,
    listening: Arc<AtomicBool>,
}

impl ScriptedSpeechInput {
    /// Create an input that says each `(offset, text)` in order.
    #[must_use]
    pub fn new(mut script: Vec<(Duration, String)>) -> Self {
        script.sort_by_key(|(offset, _)| *offset);
        Self {
            script,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the recognizer is currently listening.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

impl SpeechInput for ScriptedSpeechInput {
    fn listen(&self, tx: mpsc::Sender<SpeechEvent>) -> std::result::Result<(), SpeechError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            debug!("Scripted speech input already listening");
            return Ok(());
        }
        if self.script.is_empty() {
            return Ok(());
        }

        let script = self.script.clone();
        let listening = Arc::clone(&self.listening);
        tokio::spawn(async move {
            let mut elapsed = Duration::ZERO;
            for (offset, text) in script {
                tokio::time::sleep(offset.saturating_sub(elapsed)).await;
                elapsed = offset;
                if !listening.load(Ordering::SeqCst) {
                    return;
                }
                println!("[heard] {text}");
                if tx.send(SpeechEvent::Transcript(text)).await.is_err() {
                    return;
                }
            }
        });
        Ok(())
    }

    fn stop_listening(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }
}
