//! Navigation session orchestration.
//!
//! A session walks through permission, first fix and routing, then tracks
//! continuous fixes until the walker stops it. Startup failures are terminal
//! for the session; failures while tracking are logged and absorbed so that
//! transient GPS noise never ends guidance.
//!
//! All handlers run on one task and complete before the next event is taken,
//! so no state is shared across threads apart from the liveness flag the
//! [`SessionHandle`] reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::announcer::GuidanceAnnouncer;
use crate::capability::{
    Accuracy, Capabilities, FixEvent, LocationError, RouteError, SpeechEvent, WatchHandle,
};
use crate::config::Config;
use crate::controls::{StopCommand, TapCounter};
use crate::error::{Error, Result};
use crate::geo::Position;
use crate::heading::HeadingEstimator;
use crate::josa::attach_direction;
use crate::progress::{Announcement, RouteProgressTracker};
use crate::route::usable_waypoints;

/// Spoken while the first fix is being acquired.
pub const SEARCHING_MESSAGE: &str = "GPS 신호를 찾고 있습니다";

/// Spoken when guidance ends on request.
pub const END_MESSAGE: &str = "안내를 종료합니다";

const VOICE_BUFFER: usize = 16;

/// Build the message spoken when tracking begins.
#[must_use]
pub fn start_message(destination: &str) -> String {
    if destination.trim().is_empty() {
        return "안내를 시작합니다. 앞으로 걸어 주세요.".to_string();
    }
    format!(
        "{} 안내를 시작합니다. 앞으로 걸어 주세요.",
        attach_direction(destination.trim())
    )
}

/// Which startup step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Location permission was refused.
    Permission,
    /// No fix could be obtained.
    Fix,
    /// No walking route could be obtained.
    Route,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permission => write!(f, "permission"),
            Self::Fix => write!(f, "fix"),
            Self::Route => write!(f, "route"),
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, not started.
    Init,
    /// Waiting for location permission.
    AcquiringPermission,
    /// Waiting for the first fix.
    AcquiringFix,
    /// Waiting for the router.
    Routing,
    /// Following the route.
    Tracking,
    /// Stopped on request.
    Ended,
    /// Startup failed.
    Error(FailureKind),
}

impl SessionState {
    /// Whether the session can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Error(_))
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::AcquiringPermission => write!(f, "acquiring_permission"),
            Self::AcquiringFix => write!(f, "acquiring_fix"),
            Self::Routing => write!(f, "routing"),
            Self::Tracking => write!(f, "tracking"),
            Self::Ended => write!(f, "ended"),
            Self::Error(kind) => write!(f, "error({kind})"),
        }
    }
}

/// Why a tracking session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The stop gesture was tapped.
    Tap,
    /// A stop command was heard.
    Voice,
    /// [`SessionHandle::stop`] was called.
    Requested,
    /// The location provider closed the fix subscription.
    FixStreamClosed,
}

/// Where the walker wants to go.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    /// Spoken name, e.g. "강남역".
    pub name: String,
    /// Location handed to the router.
    pub position: Position,
}

impl Destination {
    /// Create a destination.
    #[must_use]
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// Input from the user interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    /// The screen was tapped at the given instant.
    Tap(Instant),
    /// Stop guidance.
    Stop,
}

/// A cloneable handle for driving a session from other tasks.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    live: Arc<AtomicBool>,
    inputs: mpsc::UnboundedSender<SessionInput>,
}

impl SessionHandle {
    /// Register a tap now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session is gone.
    pub fn tap(&self) -> Result<()> {
        self.send(SessionInput::Tap(Instant::now()))
    }

    /// Ask the session to stop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session is gone.
    pub fn stop(&self) -> Result<()> {
        self.send(SessionInput::Stop)
    }

    /// Whether the session is between start and end.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn send(&self, input: SessionInput) -> Result<()> {
        self.inputs.send(input).map_err(|_| Error::SessionClosed)
    }
}

/// Receivers feeding a tracking session.
#[derive(Debug)]
pub struct TrackingStreams {
    /// Fixes from the location subscription.
    pub fixes: mpsc::Receiver<FixEvent>,
    /// Speech recognition events.
    pub voice: mpsc::Receiver<SpeechEvent>,
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    /// Final state.
    pub state: SessionState,
    /// Why tracking ended, if it did.
    pub stop_reason: Option<StopReason>,
    /// Waypoint announcements produced, in order.
    pub announcements: Vec<Announcement>,
    /// Whether the final waypoint was reached.
    pub route_complete: bool,
}

/// One navigation session, from permission request to stop.
#[derive(Debug)]
pub struct NavigationSession {
    caps: Capabilities,
    config: Config,
    state: SessionState,
    heading: HeadingEstimator,
    progress: Option<RouteProgressTracker>,
    announcer: GuidanceAnnouncer,
    taps: TapCounter,
    stop_command: StopCommand,
    watch: Option<WatchHandle>,
    live: Arc<AtomicBool>,
    input_tx: mpsc::UnboundedSender<SessionInput>,
    input_rx: Option<mpsc::UnboundedReceiver<SessionInput>>,
    status: String,
    announcements: Vec<Announcement>,
    stop_reason: Option<StopReason>,
}

impl NavigationSession {
    /// Create a session over the given collaborators.
    #[must_use]
    pub fn new(caps: Capabilities, config: Config) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let announcer = GuidanceAnnouncer::new(caps.speech_out.clone(), config.cooldown_policy());
        Self {
            heading: HeadingEstimator::new(config.guidance.reorientation_threshold_m),
            taps: TapCounter::new(config.tap_window(), config.controls.taps_to_stop),
            stop_command: StopCommand::new(config.controls.stop_keywords.clone()),
            caps,
            config,
            state: SessionState::Init,
            progress: None,
            announcer,
            watch: None,
            live: Arc::new(AtomicBool::new(false)),
            input_tx,
            input_rx: Some(input_rx),
            status: String::new(),
            announcements: Vec::new(),
            stop_reason: None,
        }
    }

    /// A handle for taps and stop requests.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            live: Arc::clone(&self.live),
            inputs: self.input_tx.clone(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Latest user-facing status text.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Whether the session is between start and end.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// The heading estimator.
    #[must_use]
    pub fn heading(&self) -> &HeadingEstimator {
        &self.heading
    }

    /// The route tracker, once a route has been obtained.
    #[must_use]
    pub fn progress(&self) -> Option<&RouteProgressTracker> {
        self.progress.as_ref()
    }

    /// The announcer.
    #[must_use]
    pub fn announcer(&self) -> &GuidanceAnnouncer {
        &self.announcer
    }

    /// Summary of the session so far.
    #[must_use]
    pub fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            state: self.state,
            stop_reason: self.stop_reason,
            announcements: self.announcements.clone(),
            route_complete: self
                .progress
                .as_ref()
                .is_some_and(RouteProgressTracker::is_complete),
        }
    }

    /// Run the whole session: start, then track until stopped.
    ///
    /// # Errors
    ///
    /// Returns the startup error if permission, the first fix or routing
    /// fails.
    pub async fn run(&mut self, destination: Destination) -> Result<SessionOutcome> {
        let streams = self.start(destination).await?;
        self.track(streams).await
    }

    /// Acquire permission, a first fix and a route, then subscribe to fixes
    /// and voice commands.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Permission`], [`Error::FixTimeout`] or
    /// [`Error::Route`] when the corresponding step fails; the session is
    /// then in [`SessionState::Error`].
    pub async fn start(&mut self, destination: Destination) -> Result<TrackingStreams> {
        if self.state != SessionState::Init {
            return Err(Error::internal(format!(
                "session cannot start from state {}",
                self.state
            )));
        }
        self.live.store(true, Ordering::SeqCst);
        info!(destination = %destination.name, "Starting navigation session");

        self.transition(SessionState::AcquiringPermission);
        if !self.caps.location.request_permission().await {
            return Err(self.fail(FailureKind::Permission, Error::Permission));
        }

        self.transition(SessionState::AcquiringFix);
        self.status = SEARCHING_MESSAGE.to_string();
        self.announcer.announce(SEARCHING_MESSAGE);
        let first_fix = match self.acquire_fix().await {
            Ok(fix) => fix,
            Err(e) if e.is_permission_error() => {
                return Err(self.fail(FailureKind::Permission, e));
            }
            Err(e) => return Err(self.fail(FailureKind::Fix, e)),
        };
        if let Err(e) = self.heading.seed(first_fix) {
            return Err(self.fail(FailureKind::Fix, e.into()));
        }

        self.transition(SessionState::Routing);
        let waypoints = match self
            .caps
            .router
            .compute_walking_route(first_fix, destination.position)
            .await
        {
            Ok(waypoints) => usable_waypoints(waypoints),
            Err(e) => return Err(self.fail(FailureKind::Route, e.into())),
        };
        if waypoints.is_empty() {
            return Err(self.fail(FailureKind::Route, RouteError::NoPath.into()));
        }
        info!(waypoints = waypoints.len(), "Route obtained");
        self.progress = Some(RouteProgressTracker::new(
            waypoints,
            self.config.guidance.trigger_radius_m,
        ));

        let (fix_tx, fixes) = mpsc::channel(self.config.gps.watch_buffer);
        match self.caps.location.watch_fixes(fix_tx) {
            Ok(handle) => {
                debug!(watch_id = handle.id(), "Fix subscription started");
                self.watch = Some(handle);
            }
            Err(e) => return Err(self.fail(FailureKind::Fix, e.into())),
        }

        let (voice_tx, voice) = mpsc::channel(VOICE_BUFFER);
        if let Err(e) = self.caps.speech_in.listen(voice_tx) {
            warn!(error = %e, "Voice commands unavailable, tap gesture still active");
        }

        self.transition(SessionState::Tracking);
        let message = start_message(&destination.name);
        self.status.clone_from(&message);
        // Supersedes the searching message if it is still playing.
        self.announcer.interrupt(&message);

        Ok(TrackingStreams { fixes, voice })
    }

    /// Process events until the session ends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if called twice or before
    /// [`NavigationSession::start`] succeeded.
    pub async fn track(&mut self, streams: TrackingStreams) -> Result<SessionOutcome> {
        if self.state != SessionState::Tracking {
            return Err(Error::SessionClosed);
        }
        let mut inputs = self.input_rx.take().ok_or(Error::SessionClosed)?;
        let TrackingStreams {
            mut fixes,
            mut voice,
        } = streams;

        while self.state == SessionState::Tracking {
            tokio::select! {
                biased;
                Some(input) = inputs.recv() => self.handle_input(input),
                Some(event) = voice.recv() => self.handle_speech(event),
                event = fixes.recv() => match event {
                    Some(event) => {
                        self.handle_fix(event);
                    }
                    None => {
                        warn!("Fix subscription closed by provider");
                        self.end(StopReason::FixStreamClosed);
                    }
                },
            }
        }

        Ok(self.outcome())
    }

    /// Handle one event from the fix subscription.
    ///
    /// Returns the waypoint announcement this fix produced, if any.
    pub fn handle_fix(&mut self, event: FixEvent) -> Option<Announcement> {
        if !self.is_live() {
            trace!("Fix after session end ignored");
            return None;
        }

        let fix = match event {
            Ok(fix) => fix,
            Err(e) => {
                warn!(error = %e, "Fix error while tracking, waiting for next fix");
                self.status = "GPS 신호가 약합니다. 위치를 다시 찾는 중입니다".to_string();
                return None;
            }
        };
        trace!(lat = fix.latitude, lon = fix.longitude, "Fix");

        let update = match self.heading.on_fix(fix) {
            Ok(update) => update,
            Err(e) => {
                error!(error = %e, "Malformed fix skipped");
                return None;
            }
        };
        if update.just_oriented {
            self.status = "방향을 확인했습니다".to_string();
        }

        let progress = self.progress.as_mut()?;
        let announcement = progress.on_fix(&fix, update.heading)?;
        let complete = progress.is_complete();

        self.announcer.announce(&announcement.text);
        self.status.clone_from(&announcement.text);
        if complete {
            info!("Destination reached");
        }
        self.announcements.push(announcement.clone());
        Some(announcement)
    }

    /// Handle one user-interface input.
    pub fn handle_input(&mut self, input: SessionInput) {
        if !self.is_live() {
            trace!(?input, "Input after session end ignored");
            return;
        }
        match input {
            SessionInput::Tap(at) => {
                if self.taps.register(at) {
                    self.end(StopReason::Tap);
                }
            }
            SessionInput::Stop => {
                self.end(StopReason::Requested);
            }
        }
    }

    /// Handle one speech-recognition event.
    pub fn handle_speech(&mut self, event: SpeechEvent) {
        if !self.is_live() {
            trace!("Speech after session end ignored");
            return;
        }
        match event {
            SpeechEvent::Transcript(text) => {
                debug!(transcript = %text, "Heard");
                if self.stop_command.matches(&text) {
                    self.end(StopReason::Voice);
                }
            }
            SpeechEvent::Error(message) => {
                warn!(error = %message, "Speech recognition stopped");
            }
        }
    }

    /// End a tracking session. Returns false if it had already ended.
    pub fn end(&mut self, reason: StopReason) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        info!(?reason, "Ending navigation session");
        self.state = SessionState::Ended;
        self.stop_reason = Some(reason);
        self.release();
        self.status = END_MESSAGE.to_string();
        self.announcer.announce(END_MESSAGE);
        true
    }

    async fn acquire_fix(&self) -> Result<Position> {
        let first = match self.request_fix(Accuracy::High, self.config.fix_timeout()).await {
            Ok(fix) => return Ok(fix),
            Err(LocationError::PermissionDenied) => return Err(Error::Permission),
            Err(e) => e,
        };
        warn!(error = %first, "High-accuracy fix failed, retrying with low accuracy");

        match self
            .request_fix(Accuracy::Low, self.config.fallback_timeout())
            .await
        {
            Ok(fix) => Ok(fix),
            Err(LocationError::PermissionDenied) => Err(Error::Permission),
            Err(source) => Err(Error::FixTimeout {
                attempts: 2,
                source,
            }),
        }
    }

    async fn request_fix(
        &self,
        accuracy: Accuracy,
        timeout: Duration,
    ) -> std::result::Result<Position, LocationError> {
        debug!(%accuracy, timeout_ms = timeout.as_millis(), "Requesting fix");
        let fix = tokio::time::timeout(timeout, self.caps.location.current_fix(accuracy, timeout))
            .await
            .map_err(|_| LocationError::timeout(timeout))??;
        fix.validate()
            .map_err(|e| LocationError::unavailable(e.to_string()))?;
        Ok(fix)
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "Session transition");
        self.state = next;
    }

    fn fail(&mut self, kind: FailureKind, err: Error) -> Error {
        error!(%kind, error = %err, "Navigation session failed");
        self.state = SessionState::Error(kind);
        self.release();
        let message = err.user_message();
        self.status = message.to_string();
        self.announcer.interrupt(message);
        err
    }

    fn release(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        if let Some(watch) = self.watch.take() {
            debug!(watch_id = watch.id(), "Cancelling fix subscription");
            self.caps.location.cancel_watch(&watch);
        }
        self.caps.speech_in.stop_listening();
        self.announcer.cancel();
    }
}
