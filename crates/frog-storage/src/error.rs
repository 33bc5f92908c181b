//! Storage error type.

use frog_core::FrogError;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for storage results.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    /// A measurement directory or one of its files does not exist.
    #[error("Not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// Configuration could not be extracted from file and environment.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Image layout that cannot be mapped to a spectrogram.
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    /// Stored data that does not form a valid measurement.
    #[error(transparent)]
    Measurement(#[from] FrogError),
}

impl StorageError {
    /// Wrap an I/O error, turning `NotFound` into [`StorageError::NotFound`].
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(path)
        } else {
            StorageError::Io { path, source }
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<figment::Error> for StorageError {
    fn from(err: figment::Error) -> Self {
        StorageError::Config(Box::new(err))
    }
}

impl From<StorageError> for FrogError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Measurement(inner) => inner,
            other => FrogError::Persistence(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = StorageError::io(
            "/nowhere/meta.yaml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn converts_into_persistence_error() {
        let err: FrogError = StorageError::UnsupportedImage("rgb".into()).into();
        assert!(matches!(err, FrogError::Persistence(_)));
        let err: FrogError = StorageError::Measurement(FrogError::NoDataAvailable).into();
        assert!(matches!(err, FrogError::NoDataAvailable));
    }
}
