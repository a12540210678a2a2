//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policy::LodPolicy;

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// View defaults.
    pub view: ViewConfig,
    /// Level-of-detail and cache budget policy.
    pub lod: LodPolicy,
    /// Texture store tuning.
    pub store: StoreConfig,
    /// Frame statistics.
    pub telemetry: TelemetryConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// View configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    /// Physical pixels per logical pixel.
    pub pixel_ratio: f64,
    /// Initial vertical field of view in radians.
    pub default_fov: f64,
    /// Maximum source resolution used by the resolution limiter (0 = none).
    pub max_resolution: u32,
}

/// Texture store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Frames an unmarked, unpinned texture is kept before it is dropped.
    pub retain_frames: u32,
    /// Worker threads used by file-backed tile sources (0 = one per core).
    pub source_workers: usize,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Nominal frame rate used for dropped-frame detection.
    pub target_fps: f64,
    /// Trailing window over which FPS is measured, in milliseconds.
    pub sample_window_ms: f64,
    /// Maximum number of frame timestamps retained.
    pub history_len: usize,
    /// Interval between emitted performance samples, in milliseconds.
    pub sample_interval_ms: f64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write a JSON log file in addition to console output.
    pub log_to_file: bool,
}

// --- Default implementations ---

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            pixel_ratio: 1.0,
            default_fov: std::f64::consts::FRAC_PI_4,
            max_resolution: 0,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retain_frames: 30,
            source_workers: 0,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            sample_window_ms: 500.0,
            history_len: 120,
            sample_interval_ms: 1000.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: cfg!(debug_assertions),
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform configuration directory for Vista (e.g. `~/.config/vista`).
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("vista"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
