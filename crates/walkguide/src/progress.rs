//! Route progress tracking.
//!
//! The tracker owns the waypoint sequence for one session and a cursor into
//! it. Each oriented fix scans forward from the cursor: a waypoint inside the
//! trigger radius is announced once, and a waypoint whose successor is
//! already closer is skipped over without an announcement.

use tracing::{debug, info, trace};

use crate::announcer::compose_instruction;
use crate::geo::{angle_difference, bearing_degrees, clock_direction, distance_meters, Position};
use crate::route::{Waypoint, WaypointKind};

/// Default radius (meters) within which a waypoint counts as reached.
pub const DEFAULT_TRIGGER_RADIUS_M: f64 = 25.0;

/// A waypoint that has just been reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    /// Index of the reached waypoint.
    pub waypoint_index: usize,
    /// The waypoint's description.
    pub description: String,
    /// The waypoint's kind.
    pub kind: WaypointKind,
    /// Distance from the fix to the waypoint, in meters.
    pub distance_m: f64,
    /// Clock direction of the waypoint relative to the travel heading.
    pub clock: u8,
    /// The instruction to speak.
    pub text: String,
}

/// Tracks progress along a fixed waypoint sequence.
#[derive(Debug, Clone)]
pub struct RouteProgressTracker {
    waypoints: Vec<Waypoint>,
    cursor: usize,
    // Indices below this have been announced or passed for good.
    next_eligible: usize,
    trigger_radius_m: f64,
}

impl RouteProgressTracker {
    /// Create a tracker for `waypoints` with the given trigger radius.
    #[must_use]
    pub fn new(waypoints: Vec<Waypoint>, trigger_radius_m: f64) -> Self {
        Self {
            waypoints,
            cursor: 0,
            next_eligible: 0,
            trigger_radius_m,
        }
    }

    /// The waypoint sequence.
    #[must_use]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Index of the waypoint the scan starts from.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The trigger radius in meters.
    #[must_use]
    pub fn trigger_radius_m(&self) -> f64 {
        self.trigger_radius_m
    }

    /// Whether the final waypoint has been announced (or there are none).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }

    /// Number of waypoints not yet announced.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.waypoints.len().saturating_sub(self.next_eligible)
    }

    /// The next waypoint still eligible for an announcement.
    #[must_use]
    pub fn next_waypoint(&self) -> Option<&Waypoint> {
        self.waypoints.get(self.next_eligible.max(self.cursor))
    }

    /// Process one fix.
    ///
    /// Nothing happens until a heading is available. Returns the announcement
    /// for the waypoint reached by this fix, if any.
    pub fn on_fix(&mut self, position: &Position, heading: Option<f64>) -> Option<Announcement> {
        let heading = heading?;
        if self.is_complete() {
            return None;
        }

        let mut i = self.cursor;
        while i < self.waypoints.len() {
            let target = self.waypoints[i].position();
            let d = distance_meters(position, &target);

            if d < self.trigger_radius_m {
                if i >= self.next_eligible {
                    return Some(self.reach(i, position, &target, heading, d));
                }
                trace!(index = i, "Waypoint already announced");
                i += 1;
                continue;
            }

            let next_closer = self
                .waypoints
                .get(i + 1)
                .is_some_and(|next| distance_meters(position, &next.position()) < d);
            if next_closer {
                if i > self.cursor {
                    debug!(from = self.cursor, to = i, "Skipping ahead");
                }
                self.cursor = i;
                i += 1;
                continue;
            }

            break;
        }

        None
    }

    fn reach(
        &mut self,
        index: usize,
        position: &Position,
        target: &Position,
        heading: f64,
        distance_m: f64,
    ) -> Announcement {
        let bearing = bearing_degrees(position, target);
        let clock = clock_direction(angle_difference(bearing, heading));
        let waypoint = &self.waypoints[index];
        let text = compose_instruction(clock, &waypoint.description);

        self.next_eligible = index + 1;
        self.cursor = if self.next_eligible == self.waypoints.len() {
            info!("Final waypoint reached, route complete");
            self.waypoints.len()
        } else {
            index
        };

        info!(index, clock, distance_m, kind = %waypoint.kind, "Waypoint reached");
        Announcement {
            waypoint_index: index,
            description: waypoint.description.clone(),
            kind: waypoint.kind,
            distance_m,
            clock,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METER_LAT: f64 = 0.000_009;

    fn at(lat: f64, lon: f64) -> Position {
        Position::new(lat, lon, 0)
    }

    fn waypoint(lat: f64, lon: f64, description: &str) -> Waypoint {
        Waypoint::new(lat, lon, description, WaypointKind::Turn)
    }

    /// Waypoints due north of (37.5665, 126.9780) at the given distances.
    fn north_route(distances: &[f64]) -> Vec<Waypoint> {
        distances
            .iter()
            .enumerate()
            .map(|(i, m)| waypoint(37.5665 + m * METER_LAT, 126.9780, &format!("W{i}")))
            .collect()
    }

    fn north(meters: f64) -> Position {
        at(37.5665 + meters * METER_LAT, 126.9780)
    }

    #[test]
    fn test_no_heading_no_announcement() {
        let mut tracker = RouteProgressTracker::new(north_route(&[10.0]), 25.0);
        assert!(tracker.on_fix(&north(0.0), None).is_none());
        assert_eq!(tracker.cursor(), 0);
    }

    #[test]
    fn test_empty_route() {
        let mut tracker = RouteProgressTracker::new(Vec::new(), 25.0);
        assert!(tracker.is_complete());
        assert!(tracker.on_fix(&north(0.0), Some(0.0)).is_none());
        assert_eq!(tracker.cursor(), 0);
    }

    #[test]
    fn test_reached_waypoint_announced_once() {
        let mut tracker = RouteProgressTracker::new(north_route(&[40.0, 200.0]), 25.0);
        let fix = north(20.0);

        let announcement = tracker.on_fix(&fix, Some(0.0)).unwrap();
        assert_eq!(announcement.waypoint_index, 0);
        assert_eq!(announcement.description, "W0");
        assert_eq!(announcement.clock, 12);
        assert_eq!(announcement.text, "전방, W0");
        assert_eq!(tracker.cursor(), 0);

        assert!(tracker.on_fix(&fix, Some(0.0)).is_none());
        assert_eq!(tracker.cursor(), 0);
    }

    #[test]
    fn test_out_of_range_returns_none() {
        let mut tracker = RouteProgressTracker::new(north_route(&[100.0]), 25.0);
        assert!(tracker.on_fix(&north(0.0), Some(0.0)).is_none());
        assert_eq!(tracker.cursor(), 0);
    }

    #[test]
    fn test_skip_ahead_without_losing_next_waypoint() {
        // From 45 m north: W0 is 45 m back, W1 40 m east, W2 30 m ahead.
        let scale = 37.5665_f64.to_radians().cos();
        let route = vec![
            waypoint(37.5665, 126.9780, "W0"),
            waypoint(37.5665 + 45.0 * METER_LAT, 126.9780 + 40.0 * METER_LAT / scale, "W1"),
            waypoint(37.5665 + 75.0 * METER_LAT, 126.9780, "W2"),
            waypoint(37.5665 + 300.0 * METER_LAT, 126.9780, "W3"),
        ];
        let mut tracker = RouteProgressTracker::new(route, 25.0);

        let fix = north(45.0);
        assert!(tracker.on_fix(&fix, Some(0.0)).is_none());
        assert_eq!(tracker.cursor(), 1);

        let announcement = tracker.on_fix(&north(70.0), Some(0.0)).unwrap();
        assert_eq!(announcement.waypoint_index, 2);
        assert_eq!(announcement.description, "W2");
    }

    #[test]
    fn test_already_announced_waypoint_lets_next_fire() {
        let mut tracker = RouteProgressTracker::new(north_route(&[10.0, 30.0, 500.0]), 25.0);
        assert_eq!(tracker.on_fix(&north(5.0), Some(0.0)).unwrap().waypoint_index, 0);

        // Still inside W0's radius, now also inside W1's.
        let announcement = tracker.on_fix(&north(20.0), Some(0.0)).unwrap();
        assert_eq!(announcement.waypoint_index, 1);
        assert_eq!(tracker.cursor(), 1);
    }

    #[test]
    fn test_final_waypoint_completes_route() {
        let mut tracker = RouteProgressTracker::new(north_route(&[30.0]), 25.0);
        let announcement = tracker.on_fix(&north(20.0), Some(0.0)).unwrap();
        assert_eq!(announcement.waypoint_index, 0);
        assert!(tracker.is_complete());
        assert_eq!(tracker.cursor(), 1);
        assert_eq!(tracker.remaining(), 0);
        assert!(tracker.next_waypoint().is_none());

        assert!(tracker.on_fix(&north(30.0), Some(0.0)).is_none());
    }

    #[test]
    fn test_cursor_monotonic_and_bounded() {
        let route = north_route(&[20.0, 60.0, 100.0, 140.0]);
        let len = route.len();
        let mut tracker = RouteProgressTracker::new(route, 25.0);

        let mut last = tracker.cursor();
        for step in 0..80 {
            // Walk north with some back-and-forth jitter.
            let meters = f64::from(step) * 2.0 - if step % 3 == 0 { 15.0 } else { 0.0 };
            tracker.on_fix(&north(meters), Some(0.0));
            assert!(tracker.cursor() >= last);
            assert!(tracker.cursor() <= len);
            last = tracker.cursor();
        }
        assert!(tracker.is_complete());
    }

    #[test]
    fn test_each_waypoint_announced_at_most_once() {
        let mut tracker = RouteProgressTracker::new(north_route(&[20.0, 60.0, 100.0]), 25.0);
        let mut announced = Vec::new();
        for step in 0..60 {
            if let Some(a) = tracker.on_fix(&north(f64::from(step) * 2.0), Some(0.0)) {
                announced.push(a.waypoint_index);
            }
        }
        assert_eq!(announced, vec![0, 1, 2]);
    }

    #[test]
    fn test_clock_direction_relative_to_heading() {
        // Waypoint 20 m east while heading north: 3 o'clock.
        let scale = 37.5665_f64.to_radians().cos();
        let route = vec![waypoint(37.5665, 126.9780 + 20.0 * METER_LAT / scale, "오른쪽")];
        let mut tracker = RouteProgressTracker::new(route, 25.0);

        let announcement = tracker.on_fix(&north(0.0), Some(0.0)).unwrap();
        assert_eq!(announcement.clock, 3);
        assert_eq!(announcement.text, "3시 방향, 오른쪽");
    }

    #[test]
    fn test_next_waypoint() {
        let mut tracker = RouteProgressTracker::new(north_route(&[10.0, 100.0]), 25.0);
        assert_eq!(tracker.next_waypoint().unwrap().description, "W0");
        tracker.on_fix(&north(0.0), Some(0.0));
        assert_eq!(tracker.next_waypoint().unwrap().description, "W1");
        assert_eq!(tracker.remaining(), 1);
    }
}
