//! Stop controls: a full-screen triple tap and spoken stop commands.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Maximum gap between consecutive taps of one gesture.
pub const DEFAULT_TAP_WINDOW: Duration = Duration::from_millis(1000);

/// Taps needed to end guidance.
pub const DEFAULT_TAPS_TO_STOP: u32 = 3;

/// Default words that end guidance when heard.
#[must_use]
pub fn default_stop_keywords() -> Vec<String> {
    vec!["종료".to_string(), "그만".to_string(), "스탑".to_string()]
}

/// Counts rapid taps; a gap longer than the window starts over.
#[derive(Debug, Clone)]
pub struct TapCounter {
    window: Duration,
    required: u32,
    count: u32,
    last_tap: Option<Instant>,
}

impl TapCounter {
    /// Create a counter firing after `required` taps each within `window`
    /// of the previous one.
    #[must_use]
    pub fn new(window: Duration, required: u32) -> Self {
        Self {
            window,
            required,
            count: 0,
            last_tap: None,
        }
    }

    /// Register a tap at `at`. Returns true when this tap completes the
    /// gesture; the counter then starts over.
    pub fn register(&mut self, at: Instant) -> bool {
        if let Some(last) = self.last_tap {
            if at.saturating_duration_since(last) > self.window {
                self.count = 0;
            }
        }
        self.count += 1;
        self.last_tap = Some(at);
        trace!(count = self.count, required = self.required, "Tap registered");

        if self.count >= self.required {
            self.reset();
            return true;
        }
        false
    }

    /// Taps counted towards the current gesture.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Forget any partial gesture.
    pub fn reset(&mut self) {
        self.count = 0;
        self.last_tap = None;
    }
}

impl Default for TapCounter {
    fn default() -> Self {
        Self::new(DEFAULT_TAP_WINDOW, DEFAULT_TAPS_TO_STOP)
    }
}

/// Recognizes stop commands in speech transcripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopCommand {
    keywords: Vec<String>,
}

impl StopCommand {
    /// Create a matcher for the given keywords.
    #[must_use]
    pub fn new(keywords: Vec<String>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// Whether `transcript` contains any stop keyword.
    #[must_use]
    pub fn matches(&self, transcript: &str) -> bool {
        let heard = transcript.trim().to_lowercase();
        self.keywords.iter().any(|k| heard.contains(k.as_str()))
    }

    /// The normalized keywords.
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl Default for StopCommand {
    fn default() -> Self {
        Self::new(default_stop_keywords())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_quick_taps_fire_once() {
        let mut taps = TapCounter::default();
        let t0 = Instant::now();

        assert!(!taps.register(t0));
        assert!(!taps.register(t0 + Duration::from_millis(400)));
        assert!(taps.register(t0 + Duration::from_millis(800)));
        assert_eq!(taps.count(), 0);
    }

    #[test]
    fn test_slow_taps_do_not_accumulate() {
        let mut taps = TapCounter::default();
        let t0 = Instant::now();

        assert!(!taps.register(t0));
        assert!(!taps.register(t0 + Duration::from_millis(1100)));
        assert!(!taps.register(t0 + Duration::from_millis(2200)));
        assert_eq!(taps.count(), 1);
    }

    #[test]
    fn test_gap_resets_partial_gesture() {
        let mut taps = TapCounter::default();
        let t0 = Instant::now();

        taps.register(t0);
        taps.register(t0 + Duration::from_millis(500));
        // Too slow: starts a new gesture with this tap as the first.
        assert!(!taps.register(t0 + Duration::from_millis(2000)));
        assert!(!taps.register(t0 + Duration::from_millis(2500)));
        assert!(taps.register(t0 + Duration::from_millis(3000)));
    }

    #[test]
    fn test_six_quick_taps_fire_twice() {
        let mut taps = TapCounter::default();
        let t0 = Instant::now();
        let fired = (0..6)
            .filter(|i| taps.register(t0 + Duration::from_millis(200 * i)))
            .count();
        assert_eq!(fired, 2);
    }

    #[test]
    fn test_stop_command_matches_keywords() {
        let stop = StopCommand::default();
        assert!(stop.matches("안내 종료"));
        assert!(stop.matches("이제 그만"));
        assert!(stop.matches("스탑"));
        assert!(!stop.matches("강남역"));
        assert!(!stop.matches(""));
    }

    #[test]
    fn test_stop_command_normalizes() {
        let stop = StopCommand::new(vec!["  STOP ".to_string(), String::new()]);
        assert_eq!(stop.keywords(), &["stop".to_string()]);
        assert!(stop.matches("please Stop now"));
    }
}
