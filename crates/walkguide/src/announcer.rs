//! Spoken guidance with a single shared audio channel.
//!
//! Speech output gives no reliable "finished" signal, so the announcer
//! approximates utterance length with a cooldown and drops any request that
//! arrives while the channel is busy. Missed announcements are acceptable;
//! overlapping ones are not.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::capability::SpeechOutput;

/// Cooldown after short utterances.
pub const DEFAULT_SHORT_COOLDOWN: Duration = Duration::from_millis(1500);

/// Cooldown after long utterances.
pub const DEFAULT_LONG_COOLDOWN: Duration = Duration::from_millis(2500);

/// Texts with more characters than this use the long cooldown.
pub const DEFAULT_LONG_TEXT_CHARS: usize = 10;

/// Build the spoken instruction for a waypoint at the given clock hour.
#[must_use]
pub fn compose_instruction(clock: u8, description: &str) -> String {
    if clock == 12 {
        format!("전방, {description}")
    } else {
        format!("{clock}시 방향, {description}")
    }
}

/// Cooldown settings for the announcer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// Cooldown after short texts.
    pub short: Duration,
    /// Cooldown after long texts.
    pub long: Duration,
    /// Character count above which a text is long.
    pub long_text_chars: usize,
}

impl CooldownPolicy {
    /// Cooldown for `text`, counted in characters rather than bytes.
    #[must_use]
    pub fn cooldown_for(&self, text: &str) -> Duration {
        if text.chars().count() > self.long_text_chars {
            self.long
        } else {
            self.short
        }
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            short: DEFAULT_SHORT_COOLDOWN,
            long: DEFAULT_LONG_COOLDOWN,
            long_text_chars: DEFAULT_LONG_TEXT_CHARS,
        }
    }
}

/// A request that made it to the speech channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementRequest {
    /// What was spoken.
    pub text: String,
    /// When it was submitted.
    pub created_at: DateTime<Utc>,
}

/// Serializes announcements onto one speech output.
pub struct GuidanceAnnouncer {
    speech: Arc<dyn SpeechOutput>,
    policy: CooldownPolicy,
    busy_until: Option<Instant>,
    spoken: u64,
    dropped: u64,
    last: Option<AnnouncementRequest>,
}

impl std::fmt::Debug for GuidanceAnnouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidanceAnnouncer")
            .field("policy", &self.policy)
            .field("busy_until", &self.busy_until)
            .field("spoken", &self.spoken)
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}

impl GuidanceAnnouncer {
    /// Create an announcer over `speech`.
    #[must_use]
    pub fn new(speech: Arc<dyn SpeechOutput>, policy: CooldownPolicy) -> Self {
        Self {
            speech,
            policy,
            busy_until: None,
            spoken: 0,
            dropped: 0,
            last: None,
        }
    }

    /// Whether an utterance is still considered in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.is_busy_at(Instant::now())
    }

    /// [`GuidanceAnnouncer::is_busy`] evaluated at `now`.
    #[must_use]
    pub fn is_busy_at(&self, now: Instant) -> bool {
        self.busy_until.is_some_and(|until| now < until)
    }

    /// Speak `text` unless busy. Returns whether it was spoken.
    pub fn announce(&mut self, text: &str) -> bool {
        self.announce_at(text, Instant::now())
    }

    /// [`GuidanceAnnouncer::announce`] evaluated at `now`.
    pub fn announce_at(&mut self, text: &str, now: Instant) -> bool {
        if self.is_busy_at(now) {
            self.dropped += 1;
            debug!(text, "Speech channel busy, announcement dropped");
            return false;
        }
        self.submit(text, now);
        true
    }

    /// Cut off any utterance in progress and speak `text` immediately.
    ///
    /// Used for messages that supersede whatever is playing: the start of
    /// tracking and terminal errors.
    pub fn interrupt(&mut self, text: &str) {
        self.interrupt_at(text, Instant::now());
    }

    /// [`GuidanceAnnouncer::interrupt`] evaluated at `now`.
    pub fn interrupt_at(&mut self, text: &str, now: Instant) {
        if self.is_busy_at(now) {
            self.speech.stop();
        }
        self.submit(text, now);
    }

    /// Stop speaking and clear the cooldown.
    pub fn cancel(&mut self) {
        self.speech.stop();
        self.busy_until = None;
    }

    /// Number of texts handed to speech output.
    #[must_use]
    pub fn spoken_count(&self) -> u64 {
        self.spoken
    }

    /// Number of texts dropped because the channel was busy.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// The most recent request handed to speech output.
    #[must_use]
    pub fn last_request(&self) -> Option<&AnnouncementRequest> {
        self.last.as_ref()
    }

    fn submit(&mut self, text: &str, now: Instant) {
        let cooldown = self.policy.cooldown_for(text);
        self.busy_until = Some(now + cooldown);
        self.spoken += 1;
        self.last = Some(AnnouncementRequest {
            text: text.to_string(),
            created_at: Utc::now(),
        });
        info!(text, cooldown_ms = cooldown.as_millis(), "Speaking");
        self.speech.speak(text);
    }
}
