//! Command-line interface for walkguide.
//!
//! This module provides the CLI structure for the `walkguide` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, RouteCommand, SimulateCommand, Utterance, DEFAULT_DESTINATION_NAME,
};

/// walkguide - Turn-by-turn voice guidance for blind pedestrians
///
/// Estimates the walker's heading from consecutive GPS fixes and announces
/// upcoming waypoints as clock directions. The simulate command replays a
/// recorded walk against a saved route.
#[derive(Debug, Parser)]
#[command(name = "walkguide")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a recorded walk against a saved route
    Simulate(SimulateCommand),

    /// Inspect a route file
    Route(RouteCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
