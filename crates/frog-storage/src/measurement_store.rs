//! Measurement directories under a data root.
//!
//! Layout: `root/YYYYMMDD/measurement_NNN/{frog.tiff, meta.yaml, config.yaml}`.
//! Every file is first written into a hidden staging directory next to the
//! target; the rename of that directory is the commit step, so a crashed
//! save never leaves a half-written `measurement_NNN` behind. Staging
//! directories a crash left behind are swept by the next save into the same
//! day once they are older than the store's grace period.

use crate::config::FrogConfig;
use crate::error::{StorageError, StorageResult};
use crate::tiff_io::{read_spectrogram, write_spectrogram, SampleFormat};
use chrono::Local;
use frog_core::{Measurement, MeasurementMeta};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const IMAGE_FILE: &str = "frog.tiff";
pub const META_FILE: &str = "meta.yaml";
pub const CONFIG_FILE: &str = "config.yaml";

const DIR_PREFIX: &str = "measurement_";
const MAX_INDEX: u32 = 999;
const STAGING_SUFFIX: &str = ".partial";

/// Age after which an abandoned staging directory may be removed
const DEFAULT_STAGING_GRACE: Duration = Duration::from_secs(3600);

/// Saves and loads measurements below an explicit data root.
#[derive(Debug, Clone)]
pub struct MeasurementStore {
    root: PathBuf,
    staging_grace: Duration,
}

impl MeasurementStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            staging_grace: DEFAULT_STAGING_GRACE,
        }
    }

    /// Minimum age of a leftover staging directory before a save removes it.
    ///
    /// Younger ones may belong to a save still in progress elsewhere.
    #[must_use]
    pub fn with_staging_grace(mut self, grace: Duration) -> Self {
        self.staging_grace = grace;
        self
    }

    /// `~/frog_data`, or a relative fallback without a home directory.
    #[must_use]
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join("frog_data"))
            .unwrap_or_else(|| PathBuf::from("frog_data"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory collecting today's measurements.
    pub fn day_dir(&self) -> PathBuf {
        self.root.join(Local::now().format("%Y%m%d").to_string())
    }

    /// Save `measurement` with the active `config`, returning the new directory.
    pub fn save(&self, measurement: &Measurement, config: &FrogConfig) -> StorageResult<PathBuf> {
        let day = self.day_dir();
        fs::create_dir_all(&day).map_err(|e| StorageError::io(&day, e))?;
        sweep_stale_staging(&day, self.staging_grace);

        let (index, staging) = reserve_staging(&day)?;
        match write_files(&staging, measurement, config).and_then(|()| commit(&day, index, &staging)) {
            Ok(target) => {
                info!(path = %target.display(), "Measurement saved");
                Ok(target)
            }
            Err(err) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!(path = %staging.display(), error = %cleanup, "Failed to remove staging directory");
                }
                Err(err)
            }
        }
    }

    /// Load a measurement directory written by [`MeasurementStore::save`].
    pub fn load(&self, dir: &Path) -> StorageResult<Measurement> {
        if !dir.is_dir() {
            return Err(StorageError::NotFound(dir.to_path_buf()));
        }
        let meta_path = dir.join(META_FILE);
        let text = fs::read_to_string(&meta_path).map_err(|e| StorageError::io(&meta_path, e))?;
        let meta: MeasurementMeta = serde_yaml::from_str(&text)?;
        let image = read_spectrogram(&dir.join(IMAGE_FILE))?;
        debug!(path = %dir.display(), rows = image.rows(), cols = image.cols(), "Measurement loaded");
        Ok(Measurement::new(image, meta)?)
    }

    /// Configuration saved alongside a measurement.
    pub fn load_config(&self, dir: &Path) -> StorageResult<FrogConfig> {
        let path = dir.join(CONFIG_FILE);
        let text = fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

fn final_name(index: u32) -> String {
    format!("{DIR_PREFIX}{index:03}")
}

fn staging_name(index: u32) -> String {
    format!(".{DIR_PREFIX}{index:03}{STAGING_SUFFIX}")
}

fn is_staging_name(name: &str) -> bool {
    name.strip_prefix('.')
        .and_then(|rest| rest.strip_prefix(DIR_PREFIX))
        .is_some_and(|rest| rest.ends_with(STAGING_SUFFIX))
}

/// Remove staging directories in `day` older than `grace`. Failures are logged.
fn sweep_stale_staging(day: &Path, grace: Duration) {
    let entries = match fs::read_dir(day) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %day.display(), error = %err, "Cannot scan for stale staging directories");
            return;
        }
    };
    for entry in entries.flatten() {
        if !entry.file_name().to_str().is_some_and(is_staging_name) {
            continue;
        }
        let path = entry.path();
        let age = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok());
        match age {
            Some(age) if age >= grace => match fs::remove_dir_all(&path) {
                Ok(()) => warn!(path = %path.display(), ?age, "Removed abandoned staging directory"),
                Err(err) => warn!(path = %path.display(), error = %err, "Failed to remove abandoned staging directory"),
            },
            Some(_) => debug!(path = %path.display(), "Staging directory in use, kept"),
            None => warn!(path = %path.display(), "Staging directory of unknown age, kept"),
        }
    }
}

/// Claim the first index whose final and staging directories are both free.
fn reserve_staging(day: &Path) -> StorageResult<(u32, PathBuf)> {
    for index in 1..=MAX_INDEX {
        if day.join(final_name(index)).exists() {
            continue;
        }
        let staging = day.join(staging_name(index));
        match fs::create_dir(&staging) {
            Ok(()) => return Ok((index, staging)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(StorageError::io(staging, err)),
        }
    }
    Err(StorageError::Io {
        path: day.to_path_buf(),
        source: std::io::Error::new(
            ErrorKind::Other,
            format!("all {MAX_INDEX} measurement slots are taken"),
        ),
    })
}

fn write_files(staging: &Path, measurement: &Measurement, config: &FrogConfig) -> StorageResult<()> {
    let format = SampleFormat::for_pixel_format(measurement.meta().bit_depth());
    write_spectrogram(&staging.join(IMAGE_FILE), measurement.image(), format)?;

    let meta_path = staging.join(META_FILE);
    fs::write(&meta_path, serde_yaml::to_string(measurement.meta())?)
        .map_err(|e| StorageError::io(&meta_path, e))?;

    let config_path = staging.join(CONFIG_FILE);
    fs::write(&config_path, serde_yaml::to_string(config)?)
        .map_err(|e| StorageError::io(&config_path, e))?;
    Ok(())
}

fn commit(day: &Path, index: u32, staging: &Path) -> StorageResult<PathBuf> {
    let target = day.join(final_name(index));
    if target.exists() {
        return Err(StorageError::Io {
            path: target,
            source: std::io::Error::new(ErrorKind::AlreadyExists, "measurement directory appeared during save"),
        });
    }
    fs::rename(staging, &target).map_err(|e| StorageError::io(&target, e))?;
    Ok(target)
}
