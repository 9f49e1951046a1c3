//! Configuration management for walkguide.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::announcer::CooldownPolicy;
use crate::controls::default_stop_keywords;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "walkguide";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `WALKGUIDE_`)
/// 2. TOML config file at `~/.config/walkguide/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Waypoint matching and heading configuration.
    pub guidance: GuidanceConfig,
    /// Speech cooldown configuration.
    pub speech: SpeechConfig,
    /// GPS acquisition configuration.
    pub gps: GpsConfig,
    /// Stop gesture and command configuration.
    pub controls: ControlsConfig,
}

/// Guidance-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    /// Distance in meters at which a waypoint counts as reached.
    pub trigger_radius_m: f64,
    /// Displacement in meters required before the heading is recomputed.
    pub reorientation_threshold_m: f64,
}

/// Speech-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Cooldown after short announcements, in milliseconds.
    pub short_cooldown_ms: u64,
    /// Cooldown after long announcements, in milliseconds.
    pub long_cooldown_ms: u64,
    /// Announcements longer than this many characters use the long cooldown.
    pub long_text_chars: usize,
}

/// GPS-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    /// Timeout for the first, high-accuracy fix request, in milliseconds.
    pub fix_timeout_ms: u64,
    /// Timeout for the low-accuracy retry, in milliseconds.
    pub fallback_timeout_ms: u64,
    /// Capacity of the fix subscription channel.
    pub watch_buffer: usize,
}

/// Stop-control configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Maximum gap between taps of one gesture, in milliseconds.
    pub tap_window_ms: u64,
    /// Taps needed to end guidance.
    pub taps_to_stop: u32,
    /// Words that end guidance when heard.
    pub stop_keywords: Vec<String>,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            trigger_radius_m: crate::progress::DEFAULT_TRIGGER_RADIUS_M,
            reorientation_threshold_m: crate::heading::DEFAULT_REORIENTATION_THRESHOLD_M,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            short_cooldown_ms: 1500,
            long_cooldown_ms: 2500,
            long_text_chars: crate::announcer::DEFAULT_LONG_TEXT_CHARS,
        }
    }
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            fix_timeout_ms: 10_000,
            fallback_timeout_ms: 20_000,
            watch_buffer: 32,
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            tap_window_ms: 1000,
            taps_to_stop: crate::controls::DEFAULT_TAPS_TO_STOP,
            stop_keywords: default_stop_keywords(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `WALKGUIDE_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("WALKGUIDE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let guidance = &self.guidance;
        if !(guidance.trigger_radius_m.is_finite() && guidance.trigger_radius_m > 0.0) {
            return Err(Error::config_validation(format!(
                "trigger_radius_m must be a positive number, got {}",
                guidance.trigger_radius_m
            )));
        }
        if !(guidance.reorientation_threshold_m.is_finite()
            && guidance.reorientation_threshold_m > 0.0)
        {
            return Err(Error::config_validation(format!(
                "reorientation_threshold_m must be a positive number, got {}",
                guidance.reorientation_threshold_m
            )));
        }

        if self.speech.short_cooldown_ms == 0 {
            return Err(Error::config_validation(
                "short_cooldown_ms must be greater than 0",
            ));
        }
        if self.speech.long_cooldown_ms < self.speech.short_cooldown_ms {
            return Err(Error::config_validation(format!(
                "long_cooldown_ms ({}) cannot be less than short_cooldown_ms ({})",
                self.speech.long_cooldown_ms, self.speech.short_cooldown_ms
            )));
        }

        if self.gps.fix_timeout_ms == 0 {
            return Err(Error::config_validation(
                "fix_timeout_ms must be greater than 0",
            ));
        }
        if self.gps.fallback_timeout_ms < self.gps.fix_timeout_ms {
            return Err(Error::config_validation(format!(
                "fallback_timeout_ms ({}) cannot be less than fix_timeout_ms ({})",
                self.gps.fallback_timeout_ms, self.gps.fix_timeout_ms
            )));
        }
        if self.gps.watch_buffer == 0 {
            return Err(Error::config_validation(
                "watch_buffer must be greater than 0",
            ));
        }

        if self.controls.taps_to_stop < 2 {
            return Err(Error::config_validation(
                "taps_to_stop must be at least 2",
            ));
        }
        if self.controls.tap_window_ms == 0 {
            return Err(Error::config_validation(
                "tap_window_ms must be greater than 0",
            ));
        }
        if self
            .controls
            .stop_keywords
            .iter()
            .all(|k| k.trim().is_empty())
        {
            return Err(Error::config_validation(
                "stop_keywords must contain at least one word",
            ));
        }

        Ok(())
    }

    /// Get the speech cooldown policy.
    #[must_use]
    pub fn cooldown_policy(&self) -> CooldownPolicy {
        CooldownPolicy {
            short: Duration::from_millis(self.speech.short_cooldown_ms),
            long: Duration::from_millis(self.speech.long_cooldown_ms),
            long_text_chars: self.speech.long_text_chars,
        }
    }

    /// Get the high-accuracy fix timeout as a Duration.
    #[must_use]
    pub fn fix_timeout(&self) -> Duration {
        Duration::from_millis(self.gps.fix_timeout_ms)
    }

    /// Get the low-accuracy retry timeout as a Duration.
    #[must_use]
    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.gps.fallback_timeout_ms)
    }

    /// Get the tap window as a Duration.
    #[must_use]
    pub fn tap_window(&self) -> Duration {
        Duration::from_millis(self.controls.tap_window_ms)
    }
}
