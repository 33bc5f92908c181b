//! Persistence for frog_daq
//!
//! - [`MeasurementStore`] writes and reads measurement directories
//!   (`frog.tiff`, `meta.yaml`, `config.yaml`)
//! - [`ConfigStore`] loads the layered application configuration and
//!   remembers the last scan settings
//!
//! Storage roots are always passed in explicitly; the `default_*`
//! constructors only supply the conventional locations.

pub mod config;
pub mod error;
pub mod measurement_store;
pub mod tiff_io;

pub use config::{ConfigStore, DeviceConfig, FrogConfig, LoggingConfig, SpectralDevice, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use measurement_store::MeasurementStore;
pub use tiff_io::SampleFormat;
