//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::sim::MIN_REPLAY_SPEED;

/// Default spoken name when none is given.
pub const DEFAULT_DESTINATION_NAME: &str = "목적지";

/// Simulate command arguments.
#[derive(Debug, Args)]
pub struct SimulateCommand {
    /// Route file: a waypoint array or a pedestrian GeoJSON response
    #[arg(short, long, value_name = "FILE")]
    pub route: PathBuf,

    /// Recorded walk: a JSON array of positions
    #[arg(short, long, value_name = "FILE")]
    pub trace: PathBuf,

    /// Destination name used in the start message
    #[arg(short = 'n', long, default_value = DEFAULT_DESTINATION_NAME)]
    pub dest_name: String,

    /// Destination latitude (defaults to the last waypoint)
    #[arg(long, requires = "dest_lon", allow_hyphen_values = true)]
    pub dest_lat: Option<f64>,

    /// Destination longitude (defaults to the last waypoint)
    #[arg(long, requires = "dest_lat", allow_hyphen_values = true)]
    pub dest_lon: Option<f64>,

    /// Replay speed multiplier
    #[arg(short, long, default_value = "1.0", value_parser = parse_speed)]
    pub speed: f64,

    /// Refuse the location permission request
    #[arg(long)]
    pub deny_permission: bool,

    /// Say TEXT SECS seconds after tracking starts (repeatable)
    #[arg(long = "say", value_name = "SECS:TEXT", value_parser = parse_utterance)]
    pub say: Vec<Utterance>,

    /// Print the outcome as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Route command arguments.
#[derive(Debug, Args)]
pub struct RouteCommand {
    /// Route file to inspect
    pub file: PathBuf,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// A scripted voice command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Offset from the start of listening.
    pub after: Duration,
    /// What is said.
    pub text: String,
}

fn parse_speed(s: &str) -> Result<f64, String> {
    let speed: f64 = s.parse().map_err(|_| format!("invalid speed: {s}"))?;
    if speed.is_finite() && speed >= MIN_REPLAY_SPEED {
        Ok(speed)
    } else {
        Err(format!("speed must be at least {MIN_REPLAY_SPEED}, got {s}"))
    }
}

fn parse_utterance(s: &str) -> Result<Utterance, String> {
    let (secs, text) = s
        .split_once(':')
        .ok_or_else(|| format!("expected SECS:TEXT, got {s}"))?;
    let secs: f64 = secs
        .trim()
        .parse()
        .map_err(|_| format!("invalid offset: {secs}"))?;
    if !(secs.is_finite() && secs >= 0.0) {
        return Err(format!("offset must be non-negative, got {secs}"));
    }
    let text = text.trim();
    if text.is_empty() {
        return Err("utterance text is empty".to_string());
    }
    Ok(Utterance {
        after: Duration::from_secs_f64(secs),
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_speed() {
        assert_eq!(parse_speed("2.5"), Ok(2.5));
        assert!(parse_speed("0").is_err());
        assert!(parse_speed("-1").is_err());
        assert!(parse_speed("1e-20").is_err());
        assert!(parse_speed("inf").is_err());
        assert_eq!(parse_speed("0.01"), Ok(MIN_REPLAY_SPEED));
        assert!(parse_speed("fast").is_err());
    }

    #[test]
    fn test_parse_utterance() {
        assert_eq!(
            parse_utterance("12:안내 종료"),
            Ok(Utterance {
                after: Duration::from_secs(12),
                text: "안내 종료".to_string(),
            })
        );
        assert_eq!(
            parse_utterance("0.5: 그만 ").unwrap().after,
            Duration::from_millis(500)
        );
        assert!(parse_utterance("종료").is_err());
        assert!(parse_utterance("-3:종료").is_err());
        assert!(parse_utterance("3:").is_err());
    }
}
