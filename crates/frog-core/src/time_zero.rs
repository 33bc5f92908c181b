//! Persisted time-zero calibration.
//!
//! Time zero is the stage position at which both pulse replicas overlap. It
//! survives restarts: each motor backend gets one small TOML record under the
//! calibration directory, keyed by the backend identity.

use crate::error::{FrogError, FrogResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// In-memory time-zero state of a motor wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TimeZero {
    /// Not read from the store yet.
    #[default]
    Unloaded,
    /// Known position (m).
    Loaded(f64),
}

impl TimeZero {
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            TimeZero::Unloaded => None,
            TimeZero::Loaded(position) => Some(*position),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CalibrationRecord {
    /// Time-zero stage position (m)
    time_zero: f64,
    updated: DateTime<Utc>,
}

/// Flat-file store of time-zero positions, one file per backend.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    dir: PathBuf,
}

impl CalibrationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/frog_daq/calibration`, or a relative fallback when the
    /// platform has no data directory.
    #[must_use]
    pub fn default_location() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("frog_daq"))
            .unwrap_or_else(|| PathBuf::from(".frog_daq"))
            .join("calibration")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, identity: &str) -> PathBuf {
        let key: String = identity
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{key}.toml"))
    }

    /// Stored time zero for `identity`, or `None` if never persisted.
    pub fn load_time_zero(&self, identity: &str) -> FrogResult<Option<f64>> {
        let path = self.record_path(identity);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: CalibrationRecord = toml::from_str(&text)
            .map_err(|e| FrogError::Calibration(format!("{}: {e}", path.display())))?;
        tracing::debug!(identity, time_zero = record.time_zero, "Loaded time zero");
        Ok(Some(record.time_zero))
    }

    /// Persist `position` as the time zero of `identity`.
    ///
    /// The record is written to a temporary file and renamed over the old one.
    pub fn store_time_zero(&self, identity: &str, position: f64) -> FrogResult<()> {
        fs::create_dir_all(&self.dir)?;
        let record = CalibrationRecord {
            time_zero: position,
            updated: Utc::now(),
        };
        let text = toml::to_string(&record).map_err(|e| FrogError::Calibration(e.to_string()))?;
        let path = self.record_path(identity);
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &path)?;
        tracing::info!(identity, time_zero = position, path = %path.display(), "Stored time zero");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path());
        assert_eq!(store.load_time_zero("stage").unwrap(), None);
    }

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("nested"));
        store.store_time_zero("kinesis:27000001", 11.37e-3).unwrap();
        assert_eq!(
            store.load_time_zero("kinesis:27000001").unwrap(),
            Some(11.37e-3)
        );
        assert_eq!(store.load_time_zero("other").unwrap(), None);
    }

    #[test]
    fn identity_is_sanitized() {
        let store = CalibrationStore::new("/calib");
        let path = store.record_path("serial:/dev/ttyUSB0");
        assert_eq!(path, PathBuf::from("/calib/serial__dev_ttyUSB0.toml"));
    }

    #[test]
    fn corrupt_record_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path());
        fs::write(dir.path().join("stage.toml"), "time_zero = [").unwrap();
        assert!(matches!(
            store.load_time_zero("stage"),
            Err(FrogError::Calibration(_))
        ));
    }
}
