//! Engine configuration.
//!
//! Provides the world parameters plus the settings of the headless driver
//! loop. Configuration can be loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use torus_common::WorldConfig;
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "torus.toml";

/// Engine configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Persistence ===
    /// World identifier scoping overlay records
    pub world_id: u64,
    /// Directory holding overlay files
    pub save_dir: PathBuf,
    /// Delete the saved world before starting
    pub reset_world: bool,

    // === Streaming ===
    /// Chunks kept around the camera before eviction
    pub keep_distance: u32,

    // === Camera ===
    /// Viewport width in pixels
    pub viewport_width: u32,
    /// Viewport height in pixels
    pub viewport_height: u32,
    /// Camera pan per tick in pixels
    pub camera_speed: f64,

    // === Loop ===
    /// Number of ticks to run
    pub ticks: u32,
    /// Ticks per second (0 = as fast as possible)
    pub tick_rate: u32,
    /// Ticks between simulated edits
    pub edit_interval: u32,

    // === World ===
    /// World geometry and seed
    pub world: WorldConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            world_id: 1,
            save_dir: PathBuf::from("saves"),
            reset_world: false,

            keep_distance: 2,

            viewport_width: 1280,
            viewport_height: 720,
            camera_speed: 24.0,

            ticks: 600,
            tick_rate: 60,
            edit_interval: 30,

            world: WorldConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `torus.toml` in the working directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp driver settings to sensible ranges.
    ///
    /// World parameters are not touched here; an invalid world is refused
    /// when the world is built.
    pub fn validate(&mut self) {
        self.keep_distance = self.keep_distance.clamp(1, 16);

        self.viewport_width = self.viewport_width.clamp(320, 7680);
        self.viewport_height = self.viewport_height.clamp(240, 4320);
        if !self.camera_speed.is_finite() {
            self.camera_speed = 0.0;
        }
        self.camera_speed = self.camera_speed.clamp(0.0, 4096.0);

        self.ticks = self.ticks.clamp(1, 1_000_000);
        self.tick_rate = self.tick_rate.min(1000);
        self.edit_interval = self.edit_interval.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.viewport_width, 1280);
        assert_eq!(config.keep_distance, 2);
        assert!(!config.reset_world);
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.world.chunk_size_tiles, 16);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.viewport_width = 10;
        config.keep_distance = 0;
        config.camera_speed = f64::NAN;
        config.edit_interval = 0;

        config.validate();

        assert_eq!(config.viewport_width, 320);
        assert_eq!(config.keep_distance, 1);
        assert_eq!(config.camera_speed, 0.0);
        assert_eq!(config.edit_interval, 1);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let mut config = EngineConfig::default();
        config.world_id = 7;
        config.world.seed = 12345;
        config.world.grid_width_tiles = 64;

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded.world_id, 7);
        assert_eq!(loaded.world.seed, 12345);
        assert_eq!(loaded.world.grid_width_tiles, 64);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = EngineConfig::load_from("/nonexistent/path/torus.toml");
        assert_eq!(config.viewport_width, 1280);
    }

    #[test]
    fn test_config_partial_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("torus.toml");
        fs::write(&config_path, "ticks = 5\n\n[world]\nseed = 99\n").expect("write");

        let config = EngineConfig::load_from(&config_path);
        assert_eq!(config.ticks, 5);
        assert_eq!(config.world.seed, 99);
        assert_eq!(config.world.tile_size_pixels, 40);
        assert_eq!(config.edit_interval, 30);
    }

    #[test]
    fn test_config_invalid_file_falls_back() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("torus.toml");
        fs::write(&config_path, "ticks = \"many\"").expect("write");

        let config = EngineConfig::load_from(&config_path);
        assert_eq!(config.ticks, 600);
    }
}
