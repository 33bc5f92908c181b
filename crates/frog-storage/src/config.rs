//! Application configuration using Figment
//!
//! Configuration is layered:
//! 1. built-in defaults ([`FrogConfig::default`])
//! 2. `config.toml` in the configuration directory
//! 3. environment variables prefixed with `FROG_`, nested with `__`
//!    (e.g. `FROG_LOGGING__LEVEL=debug`)
//!
//! On first run the configuration directory is created and the defaults are
//! written to `config.toml` so they can be edited.
//!
//! The same directory remembers the last scan parameters
//! (`last_scan.toml`) so a restarted session can offer them again.

use crate::error::{StorageError, StorageResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use frog_core::{CameraOptics, CalibrationStore, ScanConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";
const LAST_SCAN_FILE: &str = "last_scan.toml";

/// Which sensor records the spectrogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectralDevice {
    Camera,
    Spectrometer,
}

/// Device identities and stage safety settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub spectral_device: SpectralDevice,
    pub camera_model: String,
    pub camera_id: String,
    /// Serial of the spectrometer to open; first found when unset
    #[serde(default)]
    pub spectrometer_id: Option<String>,
    pub stage_port: String,
    /// Stage travel limits `[lower, upper]` (m)
    pub stage_travel_limits: [f64; 2],
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            spectral_device: SpectralDevice::Spectrometer,
            camera_model: "Manta G-234B NIR".into(),
            camera_id: "DEV_000F314E1E59".into(),
            spectrometer_id: None,
            stage_port: "/dev/ttyUSB0".into(),
            stage_travel_limits: [0.0, 20e-3],
        }
    }
}

/// Where measurements and calibration live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_root: PathBuf,
    pub calibration_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: crate::MeasurementStore::default_root(),
            calibration_dir: CalibrationStore::default_location(),
        }
    }
}

/// Logging settings consumed by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (pretty, compact, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

/// Top-level configuration, also written next to every measurement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrogConfig {
    #[serde(default)]
    pub devices: DeviceConfig,
    #[serde(default)]
    pub optics: CameraOptics,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FrogConfig {
    /// Semantic checks after loading.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid logging level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }
        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(format!(
                "Invalid logging format '{}'. Must be one of: {}",
                self.logging.format,
                valid_formats.join(", ")
            ));
        }
        let [lower, upper] = self.devices.stage_travel_limits;
        if !(lower.is_finite() && upper.is_finite() && lower <= upper) {
            return Err(format!("Invalid stage travel limits [{lower}, {upper}]"));
        }
        if self.optics.pixel_size_um <= 0.0 || self.optics.focal_length_mm <= 0.0 {
            return Err("Pixel size and focal length must be positive".into());
        }
        Ok(())
    }
}

/// Configuration directory: `config.toml` plus remembered scan settings.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.frog_config`, or a relative fallback without a home directory.
    #[must_use]
    pub fn default_location() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".frog_config"))
            .unwrap_or_else(|| PathBuf::from(".frog_config"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Load the configuration, writing the defaults first if none exists.
    pub fn load_or_init(&self) -> StorageResult<FrogConfig> {
        let path = self.config_path();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No configuration found, writing defaults");
            self.save(&FrogConfig::default())?;
        }
        let config: FrogConfig = Figment::from(Serialized::defaults(FrogConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("FROG_").split("__"))
            .extract()?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Persist `config` as `config.toml`.
    pub fn save(&self, config: &FrogConfig) -> StorageResult<()> {
        write_toml(&self.dir, &self.config_path(), config)
    }

    /// Remember scan parameters for the next session.
    pub fn save_scan_settings(&self, scan: &ScanConfig) -> StorageResult<()> {
        write_toml(&self.dir, &self.dir.join(LAST_SCAN_FILE), scan)
    }

    /// Scan parameters of the previous session, if any were saved.
    pub fn load_last_scan_settings(&self) -> StorageResult<Option<ScanConfig>> {
        let path = self.dir.join(LAST_SCAN_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(toml::from_str(&text)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(path, err)),
        }
    }
}

fn write_toml<T: Serialize>(dir: &Path, path: &Path, value: &T) -> StorageResult<()> {
    fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
    let text = toml::to_string_pretty(value)?;
    fs::write(path, text).map_err(|e| StorageError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = FrogConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.devices.camera_model, "Manta G-234B NIR");
        assert_eq!(config.optics.pixels_width, 1936);
    }

    #[test]
    fn invalid_log_level() {
        let mut config = FrogConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_travel_limits() {
        let mut config = FrogConfig::default();
        config.devices.stage_travel_limits = [1e-2, 0.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn scan_settings_absent_then_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert_eq!(store.load_last_scan_settings().unwrap(), None);

        let scan = ScanConfig::new(11.37e-3, -256e-6, 4e-6, 128).with_spectral_window(400e-9, 40e-9);
        store.save_scan_settings(&scan).unwrap();
        assert_eq!(store.load_last_scan_settings().unwrap(), Some(scan));
    }
}
