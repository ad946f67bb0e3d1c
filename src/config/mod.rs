//! Configuration module
//!
//! Handles loading and saving bridge configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::discovery::DISCOVERY_PORT;
use crate::protocol::{AircraftInfo, DEFAULT_TELEMETRY_PORT};
use crate::sim::SimLimits;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transmitted aircraft identity
    #[serde(default)]
    pub aircraft: AircraftInfo,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Simulation settings
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Airport reference table settings
    #[serde(default)]
    pub airports: AirportsConfig,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Port to listen on for the ForeFlight broadcast
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// Telemetry port used when none is announced or given
    #[serde(default = "default_telemetry_port")]
    pub telemetry_port: u16,
    /// How long to wait for a broadcast before giving up (seconds)
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,
}

fn default_discovery_port() -> u16 {
    DISCOVERY_PORT
}

fn default_telemetry_port() -> u16 {
    DEFAULT_TELEMETRY_PORT
}

fn default_discovery_timeout() -> u64 {
    10
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            discovery_port: default_discovery_port(),
            telemetry_port: default_telemetry_port(),
            discovery_timeout_secs: default_discovery_timeout(),
        }
    }
}

/// Simulation configuration: where the flight starts and how fast it is
/// allowed to change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_lat")]
    pub initial_lat_deg: f64,
    #[serde(default = "default_lon")]
    pub initial_lon_deg: f64,
    #[serde(default = "default_altitude")]
    pub initial_altitude_ft: f64,
    #[serde(default = "default_speed")]
    pub initial_speed_kt: f64,
    #[serde(default = "default_track")]
    pub initial_track_deg: f64,

    /// Convergence rate limits
    #[serde(default)]
    pub limits: SimLimits,
}

fn default_lat() -> f64 {
    50.9010 // near Brussels
}

fn default_lon() -> f64 {
    4.4840
}

fn default_altitude() -> f64 {
    3000.0
}

fn default_speed() -> f64 {
    120.0
}

fn default_track() -> f64 {
    90.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_lat_deg: default_lat(),
            initial_lon_deg: default_lon(),
            initial_altitude_ft: default_altitude(),
            initial_speed_kt: default_speed(),
            initial_track_deg: default_track(),
            limits: SimLimits::default(),
        }
    }
}

/// Airport reference table configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirportsConfig {
    /// Optional JSON file with a larger airport list
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("ffbridge/config.toml")),
            Some(PathBuf::from("./ffbridge.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> String {
    let config = Config {
        aircraft: AircraftInfo {
            call_sign: "N825V".to_string(),
            icao_address: 0xABCDEF,
        },
        ..Default::default()
    };

    toml::to_string_pretty(&config).unwrap()
}
