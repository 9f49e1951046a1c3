//! `walkguide` - Turn-by-turn voice guidance for blind pedestrians
//!
//! This library estimates the walker's heading from consecutive GPS fixes,
//! tracks progress along a walking route and announces each waypoint as a
//! clock direction relative to that heading.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod announcer;
pub mod capability;
pub mod cli;
pub mod config;
pub mod controls;
pub mod error;
pub mod geo;
pub mod heading;
pub mod josa;
pub mod logging;
pub mod progress;
pub mod route;
pub mod session;
pub mod sim;

pub use announcer::GuidanceAnnouncer;
pub use capability::{Capabilities, LocationProvider, Router, SpeechInput, SpeechOutput};
pub use config::Config;
pub use error::{Error, Result};
pub use geo::Position;
pub use heading::HeadingEstimator;
pub use logging::init_logging;
pub use progress::{Announcement, RouteProgressTracker};
pub use route::{Waypoint, WaypointKind};
pub use session::{Destination, NavigationSession, SessionHandle, SessionOutcome, SessionState};
