//! Configuration management for the DreamControl surface
//!
//! Handles loading, parsing and validation of the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tokio::fs;

use crate::buttons::LedPolicy;

/// Configuration values rejected by validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("MIDI channel {0} is invalid (must be 1-16)")]
    InvalidChannel(u8),

    #[error("{field} = {value} is not a valid controller number (must be 0-127)")]
    InvalidController { field: &'static str, value: u8 },

    #[error("fader controllers must be distinct (cc {0} used twice)")]
    DuplicateController(u8),

    #[error("port pattern for '{0}' cannot be empty")]
    EmptyPortPattern(&'static str),

    #[error("tick_ms must be at least 1")]
    ZeroTick,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub midi: MidiConfig,
    pub fader: FaderConfig,
    pub buttons: ButtonConfig,
    pub startup: StartupConfig,
}

/// MIDI port configuration. Port names are matched by case-insensitive substring.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MidiConfig {
    pub daw_port: String,
    pub plugin_port: String,
    pub fader_port: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_port: Option<String>,
    /// MIDI channel (1-16) for buttons and fader traffic
    pub channel: u8,
}

/// Motor fader wire settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FaderConfig {
    /// CC carrying the position MSB from/to the fader board
    pub msb_cc: u8,
    /// CC carrying the position LSB from/to the fader board
    pub lsb_cc: u8,
    /// CC carrying the touch-sense state
    pub touch_cc: u8,
    /// NRPN parameter (LSB) the host uses for the fader
    pub nrpn_parameter: u8,
    /// The fader is mounted upside down
    pub invert: bool,
    /// Precede each NRPN triplet with a CC99 = 0 parameter-MSB select
    pub nrpn_select_msb: bool,
}

/// Button behaviour
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ButtonConfig {
    pub led_policy: LedPolicy,
    /// Minimum time between two edges on one line (0 = forward every edge)
    pub debounce_ms: u64,
    /// Sampling period of the polled button bank
    pub tick_ms: u64,
}

/// Startup behaviour
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Ask the plugin to resend its button states
    pub sync_buttons: bool,
    /// Light every LED to check the hardware
    pub test_mode: bool,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            daw_port: "DreamControl DAW".to_string(),
            plugin_port: "DreamControl Plugin".to_string(),
            fader_port: "DreamControl Fader".to_string(),
            calibration_port: None,
            channel: 1,
        }
    }
}

impl Default for FaderConfig {
    fn default() -> Self {
        Self {
            msb_cc: 0,
            lsb_cc: 32,
            touch_cc: 47,
            nrpn_parameter: 1,
            invert: true,
            nrpn_select_msb: false,
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            led_policy: LedPolicy::HostEcho,
            debounce_ms: 0,
            tick_ms: 1,
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            sync_buttons: true,
            test_mode: false,
        }
    }
}

impl MidiConfig {
    /// Zero-based channel for the wire
    pub fn wire_channel(&self) -> u8 {
        self.channel.saturating_sub(1)
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=16).contains(&self.midi.channel) {
            return Err(ConfigError::InvalidChannel(self.midi.channel));
        }

        for (name, pattern) in [
            ("daw_port", &self.midi.daw_port),
            ("plugin_port", &self.midi.plugin_port),
            ("fader_port", &self.midi.fader_port),
        ] {
            if pattern.trim().is_empty() {
                return Err(ConfigError::EmptyPortPattern(name));
            }
        }
        if let Some(pattern) = &self.midi.calibration_port {
            if pattern.trim().is_empty() {
                return Err(ConfigError::EmptyPortPattern("calibration_port"));
            }
        }

        let fader = &self.fader;
        let mut seen = HashSet::new();
        for (field, value) in [
            ("msb_cc", fader.msb_cc),
            ("lsb_cc", fader.lsb_cc),
            ("touch_cc", fader.touch_cc),
            ("nrpn_parameter", fader.nrpn_parameter),
        ] {
            if value > 127 {
                return Err(ConfigError::InvalidController { field, value });
            }
            if field != "nrpn_parameter" && !seen.insert(value) {
                return Err(ConfigError::DuplicateController(value));
            }
        }

        if self.buttons.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }

        Ok(())
    }
}
