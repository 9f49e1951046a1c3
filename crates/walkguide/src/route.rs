//! Route waypoints and pedestrian-route parsing.
//!
//! Walking routes arrive as a GeoJSON `FeatureCollection` in the shape of the
//! TMap pedestrian API: `Point` features mark turn points and landmarks,
//! `LineString` features carry the path geometry between them. Only the
//! points matter for guidance.

use geojson::{FeatureCollection, GeometryValue};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, error};

use crate::capability::RouteError;
use crate::geo::Position;

/// TMap turn type for the destination point.
const TURN_TYPE_DESTINATION: i64 = 201;

/// TMap point type for the route's end point.
const POINT_TYPE_END: &str = "EP";

/// What a waypoint represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointKind {
    /// A change of direction (or the start point).
    #[default]
    Turn,
    /// A crossing, stairs, overpass or similar feature worth mentioning.
    Landmark,
    /// The end of the route.
    Destination,
}

impl WaypointKind {
    /// Classify a TMap `turnType` / `pointType` pair.
    #[must_use]
    pub fn from_tmap(turn_type: Option<i64>, point_type: Option<&str>) -> Self {
        if turn_type == Some(TURN_TYPE_DESTINATION) || point_type == Some(POINT_TYPE_END) {
            return Self::Destination;
        }
        match turn_type {
            // overpass, underpass, stairs, ramps, crosswalks, elevator
            Some(125..=129 | 211..=218) => Self::Landmark,
            _ => Self::Turn,
        }
    }
}

impl std::fmt::Display for WaypointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Turn => write!(f, "turn"),
            Self::Landmark => write!(f, "landmark"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// A routed point of interest with its spoken description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Human-readable instruction, e.g. "우회전 후 17m 이동".
    #[serde(default)]
    pub description: String,
    /// What this waypoint marks.
    #[serde(default)]
    pub kind: WaypointKind,
}

impl Waypoint {
    /// Create a waypoint.
    #[must_use]
    pub fn new(
        latitude: f64,
        longitude: f64,
        description: impl Into<String>,
        kind: WaypointKind,
    ) -> Self {
        Self {
            latitude,
            longitude,
            description: description.into(),
            kind,
        }
    }

    /// The waypoint's location as an untimed position.
    #[must_use]
    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude, 0)
    }
}

/// Extract the ordered waypoints from a pedestrian-route GeoJSON document.
///
/// Positions may carry an altitude; only longitude and latitude are read.
///
/// # Errors
///
/// Returns [`RouteError::Parse`] if the document is not a feature collection
/// or a `Point` feature has fewer than two coordinates.
pub fn parse_pedestrian_geojson(json: &str) -> Result<Vec<Waypoint>, RouteError> {
    let collection: FeatureCollection =
        serde_json::from_str(json).map_err(|e| RouteError::parse(e.to_string()))?;

    let mut waypoints = Vec::new();
    for (index, feature) in collection.features.iter().enumerate() {
        let Some(GeometryValue::Point { coordinates: coords }) = feature.geometry.as_ref().map(|g| &g.value) else {
            continue;
        };
        if coords.len() < 2 {
            return Err(RouteError::parse(format!(
                "feature {index}: point has {} coordinates",
                coords.len()
            )));
        }

        let description = feature
            .property("description")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        let kind = WaypointKind::from_tmap(
            feature.property("turnType").and_then(JsonValue::as_i64),
            feature.property("pointType").and_then(JsonValue::as_str),
        );
        waypoints.push(Waypoint::new(coords[1], coords[0], description, kind));
    }

    debug!(count = waypoints.len(), "Parsed pedestrian route");
    Ok(waypoints)
}

/// Drop waypoints whose coordinates are outside the geodesic domain.
///
/// Each dropped waypoint is logged at error level; order is preserved.
#[must_use]
pub fn usable_waypoints(waypoints: Vec<Waypoint>) -> Vec<Waypoint> {
    waypoints
        .into_iter()
        .enumerate()
        .filter_map(|(index, waypoint)| match waypoint.position().validate() {
            Ok(()) => Some(waypoint),
            Err(e) => {
                error!(
                    index,
                    error = %e,
                    description = %waypoint.description,
                    "Invalid waypoint dropped"
                );
                None
            }
        })
        .collect()
}

/// Load waypoints from either a plain JSON array of [`Waypoint`]s or a
/// pedestrian-route GeoJSON document.
///
/// # Errors
///
/// Returns [`RouteError::Parse`] if the input is neither format.
pub fn load_waypoints(json: &str) -> Result<Vec<Waypoint>, RouteError> {
    if json.trim_start().starts_with('[') {
        return serde_json::from_str(json).map_err(|e| RouteError::parse(e.to_string()));
    }
    parse_pedestrian_geojson(json)
}
