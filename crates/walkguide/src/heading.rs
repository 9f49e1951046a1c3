//! Travel heading derived from GPS movement.
//!
//! No compass or IMU is trusted. The estimator keeps a baseline fix and only
//! commits to a heading once the walker has moved far enough from it that GPS
//! jitter no longer dominates the bearing.

use tracing::{debug, info, trace};

use crate::geo::{bearing_degrees, distance_meters, GeoError, Position};

/// Default displacement (meters) required before a heading is (re)computed.
pub const DEFAULT_REORIENTATION_THRESHOLD_M: f64 = 4.0;

/// Phase of the heading estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingPhase {
    /// No fix has been seen yet.
    Searching,
    /// A baseline exists but the walker has not moved far enough.
    Calibrating,
    /// A heading has been established.
    Oriented,
}

impl std::fmt::Display for HeadingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Searching => write!(f, "searching"),
            Self::Calibrating => write!(f, "calibrating"),
            Self::Oriented => write!(f, "oriented"),
        }
    }
}

/// Snapshot of the estimator's mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadingState {
    /// The fix the next displacement is measured from.
    pub last_confirmed: Option<Position>,
    /// Current travel heading in degrees, 0 = north.
    pub heading_degrees: Option<f64>,
    /// Whether a heading has ever been established this session.
    pub oriented: bool,
}

/// Result of feeding one fix to the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadingUpdate {
    /// Heading after this fix, if established.
    pub heading: Option<f64>,
    /// True only for the fix that first established a heading.
    pub just_oriented: bool,
}

/// Derives a heading from consecutive fixes.
#[derive(Debug, Clone)]
pub struct HeadingEstimator {
    threshold_m: f64,
    state: HeadingState,
}

impl HeadingEstimator {
    /// Create an estimator with the given reorientation threshold in meters.
    #[must_use]
    pub fn new(threshold_m: f64) -> Self {
        Self {
            threshold_m,
            state: HeadingState::default(),
        }
    }

    /// The reorientation threshold in meters.
    #[must_use]
    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> HeadingState {
        self.state
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> HeadingPhase {
        if self.state.oriented {
            HeadingPhase::Oriented
        } else if self.state.last_confirmed.is_some() {
            HeadingPhase::Calibrating
        } else {
            HeadingPhase::Searching
        }
    }

    /// Whether a heading has been established.
    #[must_use]
    pub fn is_oriented(&self) -> bool {
        self.state.oriented
    }

    /// Current heading in degrees, if established.
    #[must_use]
    pub fn heading(&self) -> Option<f64> {
        self.state.heading_degrees
    }

    /// Use `fix` as the baseline when none exists yet.
    ///
    /// The session calls this with its first fix so that the first watched
    /// fix can already measure displacement.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidPosition`] for malformed coordinates.
    pub fn seed(&mut self, fix: Position) -> Result<(), GeoError> {
        fix.validate()?;
        if self.state.last_confirmed.is_none() {
            debug!(lat = fix.latitude, lon = fix.longitude, "Heading baseline seeded");
            self.state.last_confirmed = Some(fix);
        }
        Ok(())
    }

    /// Feed one fix.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidPosition`] for malformed coordinates; the
    /// state is left untouched in that case.
    pub fn on_fix(&mut self, fix: Position) -> Result<HeadingUpdate, GeoError> {
        fix.validate()?;

        let Some(baseline) = self.state.last_confirmed else {
            self.state.last_confirmed = Some(fix);
            debug!("First fix, calibrating heading");
            return Ok(self.update(false));
        };

        let displacement = distance_meters(&baseline, &fix);
        if displacement < self.threshold_m {
            trace!(displacement, "Displacement below threshold");
            return Ok(self.update(false));
        }

        let heading = bearing_degrees(&baseline, &fix);
        self.state.heading_degrees = Some(heading);
        self.state.last_confirmed = Some(fix);

        let just_oriented = !self.state.oriented;
        if just_oriented {
            self.state.oriented = true;
            info!(heading, displacement, "Heading established");
        } else {
            trace!(heading, displacement, "Heading updated");
        }
        Ok(self.update(just_oriented))
    }

    /// Forget everything, returning to [`HeadingPhase::Searching`].
    pub fn reset(&mut self) {
        self.state = HeadingState::default();
    }

    fn update(&self, just_oriented: bool) -> HeadingUpdate {
        HeadingUpdate {
            heading: self.state.heading_degrees,
            just_oriented,
        }
    }
}

impl Default for HeadingEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_REORIENTATION_THRESHOLD_M)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ~1.11 m of latitude per 0.00001 degree
    const METER_LAT: f64 = 0.000_009;

    fn north_of(origin: &Position, meters: f64) -> Position {
        Position::new(origin.latitude + meters * METER_LAT, origin.longitude, 0)
    }

    fn east_of(origin: &Position, meters: f64) -> Position {
        let scale = origin.latitude.to_radians().cos();
        Position::new(origin.latitude, origin.longitude + meters * METER_LAT / scale, 0)
    }

    fn origin() -> Position {
        Position::new(37.5665, 126.9780, 0)
    }

    #[test]
    fn test_phase_transitions() {
        let mut estimator = HeadingEstimator::default();
        assert_eq!(estimator.phase(), HeadingPhase::Searching);

        estimator.on_fix(origin()).unwrap();
        assert_eq!(estimator.phase(), HeadingPhase::Calibrating);

        estimator.on_fix(north_of(&origin(), 10.0)).unwrap();
        assert_eq!(estimator.phase(), HeadingPhase::Oriented);
    }

    #[test]
    fn test_first_fix_sets_baseline_without_heading() {
        let mut estimator = HeadingEstimator::default();
        let update = estimator.on_fix(origin()).unwrap();
        assert_eq!(update, HeadingUpdate::default());
        assert_eq!(estimator.state().last_confirmed, Some(origin()));
    }

    #[test]
    fn test_small_movements_do_not_orient() {
        let mut estimator = HeadingEstimator::default();
        estimator.on_fix(origin()).unwrap();

        for meters in [1.0, 2.5, 3.0, 0.5, 2.9] {
            let update = estimator.on_fix(north_of(&origin(), meters)).unwrap();
            assert!(update.heading.is_none());
            assert!(!update.just_oriented);
        }
        assert!(!estimator.is_oriented());
        assert_eq!(estimator.state().last_confirmed, Some(origin()));
    }

    #[test]
    fn test_orients_exactly_once() {
        let mut estimator = HeadingEstimator::default();
        estimator.on_fix(origin()).unwrap();

        let first = north_of(&origin(), 5.0);
        let update = estimator.on_fix(first).unwrap();
        assert!(update.just_oriented);
        assert!(update.heading.unwrap().abs() < 1.0);

        let mut last = first;
        let mut events = 0;
        for step in 0..10 {
            let next = if step % 2 == 0 {
                north_of(&last, 1.0)
            } else {
                east_of(&last, 6.0)
            };
            let update = estimator.on_fix(next).unwrap();
            if update.just_oriented {
                events += 1;
            }
            assert!(estimator.is_oriented());
            assert!(update.heading.is_some());
            last = next;
        }
        assert_eq!(events, 0);
    }

    #[test]
    fn test_heading_follows_large_displacement() {
        let mut estimator = HeadingEstimator::default();
        estimator.on_fix(origin()).unwrap();
        let north = north_of(&origin(), 8.0);
        estimator.on_fix(north).unwrap();

        let update = estimator.on_fix(east_of(&north, 8.0)).unwrap();
        let heading = update.heading.unwrap();
        assert!((heading - 90.0).abs() < 1.0, "got {heading}");
        assert!(!update.just_oriented);
    }

    #[test]
    fn test_small_displacement_keeps_heading_and_baseline() {
        let mut estimator = HeadingEstimator::default();
        estimator.on_fix(origin()).unwrap();
        let north = north_of(&origin(), 8.0);
        estimator.on_fix(north).unwrap();

        let update = estimator.on_fix(east_of(&north, 2.0)).unwrap();
        assert!(update.heading.unwrap().abs() < 1.0);
        assert_eq!(estimator.state().last_confirmed, Some(north));
    }

    #[test]
    fn test_seed_only_sets_missing_baseline() {
        let mut estimator = HeadingEstimator::default();
        estimator.seed(origin()).unwrap();
        assert_eq!(estimator.phase(), HeadingPhase::Calibrating);

        estimator.seed(north_of(&origin(), 50.0)).unwrap();
        assert_eq!(estimator.state().last_confirmed, Some(origin()));
    }

    #[test]
    fn test_invalid_fix_rejected() {
        let mut estimator = HeadingEstimator::default();
        estimator.on_fix(origin()).unwrap();

        let result = estimator.on_fix(Position::new(f64::NAN, 126.0, 0));
        assert!(matches!(result, Err(GeoError::InvalidPosition { .. })));
        assert_eq!(estimator.state().last_confirmed, Some(origin()));
    }

    #[test]
    fn test_reset() {
        let mut estimator = HeadingEstimator::default();
        estimator.on_fix(origin()).unwrap();
        estimator.on_fix(north_of(&origin(), 10.0)).unwrap();

        estimator.reset();
        assert_eq!(estimator.phase(), HeadingPhase::Searching);
        assert!(estimator.heading().is_none());
    }

    #[test]
    fn test_custom_threshold() {
        let mut estimator = HeadingEstimator::new(10.0);
        estimator.on_fix(origin()).unwrap();
        assert!(!estimator.on_fix(north_of(&origin(), 6.0)).unwrap().just_oriented);
        assert!(estimator.on_fix(north_of(&origin(), 12.0)).unwrap().just_oriented);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(HeadingPhase::Searching.to_string(), "searching");
        assert_eq!(HeadingPhase::Calibrating.to_string(), "calibrating");
        assert_eq!(HeadingPhase::Oriented.to_string(), "oriented");
    }
}
