//! `walkguide` - CLI for the guidance engine
//!
//! This binary replays recorded walks against saved routes and inspects
//! route and configuration files.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, warn};

use walkguide::cli::{Cli, Command, ConfigCommand, RouteCommand, SimulateCommand};
use walkguide::geo::distance_meters;
use walkguide::sim::{ConsoleSpeech, FileRouter, ReplayLocationProvider, ScriptedSpeechInput};
use walkguide::{
    init_logging, Capabilities, Config, Destination, NavigationSession, Position, SessionOutcome,
    Waypoint,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match cli.command {
        // Validation reports its own errors instead of failing the load.
        Command::Config(ConfigCommand::Validate { file }) => {
            handle_validate(file.or(cli.config));
            Ok(())
        }
        command => {
            let config = Config::load_from(cli.config.clone())
                .context("failed to load configuration")?;
            match command {
                Command::Simulate(cmd) => handle_simulate(config, cmd).await,
                Command::Route(cmd) => handle_route(&cmd),
                Command::Config(cmd) => handle_config(&config, &cmd),
            }
        }
    }
}

async fn handle_simulate(config: Config, cmd: SimulateCommand) -> anyhow::Result<()> {
    let router = FileRouter::load(&cmd.route)?;
    let mut location = ReplayLocationProvider::load(&cmd.trace)?.with_speed(cmd.speed);
    if cmd.deny_permission {
        location = location.deny_permission();
    }

    let target = match (cmd.dest_lat, cmd.dest_lon) {
        (Some(latitude), Some(longitude)) => Position::new(latitude, longitude, 0),
        _ => router
            .waypoints()
            .last()
            .map(Waypoint::position)
            .context("route is empty and no destination coordinates were given")?,
    };
    target.validate().context("invalid destination")?;

    let script = cmd.say.into_iter().map(|u| (u.after, u.text)).collect();
    let caps = Capabilities {
        location: Arc::new(location),
        router: Arc::new(router),
        speech_out: Arc::new(ConsoleSpeech),
        speech_in: Arc::new(ScriptedSpeechInput::new(script)),
    };

    let mut session = NavigationSession::new(caps, config);
    let handle = session.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, stopping session");
            if let Err(e) = handle.stop() {
                warn!(error = %e, "Failed to stop session");
            }
        }
    });

    match session.run(Destination::new(cmd.dest_name, target)).await {
        Ok(outcome) => {
            print_outcome(&outcome, cmd.json)?;
            Ok(())
        }
        Err(e) => {
            print_outcome(&session.outcome(), cmd.json)?;
            let state = session.state();
            Err(anyhow::Error::new(e).context(format!("navigation session failed ({state})")))
        }
    }
}

fn print_outcome(outcome: &SessionOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        let announcements: Vec<_> = outcome
            .announcements
            .iter()
            .map(|a| {
                serde_json::json!({
                    "waypoint_index": a.waypoint_index,
                    "kind": a.kind,
                    "distance_m": a.distance_m,
                    "clock": a.clock,
                    "text": a.text,
                })
            })
            .collect();
        let summary = serde_json::json!({
            "state": outcome.state.to_string(),
            "stop_reason": outcome.stop_reason.map(|r| format!("{r:?}")),
            "route_complete": outcome.route_complete,
            "announcements": announcements,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!("Session Summary");
        println!("===============");
        println!("  State:          {}", outcome.state);
        if let Some(reason) = outcome.stop_reason {
            println!("  Stop reason:    {reason:?}");
        }
        println!("  Announcements:  {}", outcome.announcements.len());
        println!("  Route complete: {}", outcome.route_complete);
    }
    Ok(())
}

fn handle_route(cmd: &RouteCommand) -> anyhow::Result<()> {
    let router = FileRouter::load(&cmd.file)?;
    let waypoints = router.waypoints();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(waypoints)?);
        return Ok(());
    }

    let length: f64 = waypoints
        .windows(2)
        .map(|pair| distance_meters(&pair[0].position(), &pair[1].position()))
        .sum();

    println!("Route: {}", cmd.file.display());
    println!("  Waypoints: {}", waypoints.len());
    println!("  Length:    {length:.0} m");
    println!();
    for (i, waypoint) in waypoints.iter().enumerate() {
        println!(
            "{i:>3}  {:<11} {:>10.6} {:>11.6}  {}",
            waypoint.kind.to_string(),
            waypoint.latitude,
            waypoint.longitude,
            waypoint.description
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Guidance]");
                println!("  Trigger radius (m):     {}", config.guidance.trigger_radius_m);
                println!(
                    "  Reorientation (m):      {}",
                    config.guidance.reorientation_threshold_m
                );
                println!();
                println!("[Speech]");
                println!("  Short cooldown (ms):    {}", config.speech.short_cooldown_ms);
                println!("  Long cooldown (ms):     {}", config.speech.long_cooldown_ms);
                println!("  Long text (chars):      {}", config.speech.long_text_chars);
                println!();
                println!("[GPS]");
                println!("  Fix timeout (ms):       {}", config.gps.fix_timeout_ms);
                println!("  Fallback timeout (ms):  {}", config.gps.fallback_timeout_ms);
                println!();
                println!("[Controls]");
                println!("  Tap window (ms):        {}", config.controls.tap_window_ms);
                println!("  Taps to stop:           {}", config.controls.taps_to_stop);
                println!(
                    "  Stop keywords:          {}",
                    config.controls.stop_keywords.join(", ")
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            handle_validate(file.clone());
        }
    }
    Ok(())
}

fn handle_validate(file: Option<std::path::PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
}
