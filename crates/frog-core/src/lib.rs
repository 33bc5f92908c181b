//! `frog-core`
//!
//! Device contracts and shared types for SHG FROG acquisition.
//!
//! This crate provides the building blocks used by the scan orchestrator,
//! the simulated drivers and the persistence layer:
//!
//! - **Backends** ([`capabilities`]): raw motion and readout primitives a
//!   driver must provide. Backends know nothing about limits or calibration.
//! - **Wrappers** ([`LinearMotor`], [`SpectralSensor`]): the uniform contract
//!   every caller talks to. Interlocks, fault policy and the persisted
//!   time-zero live here once, so every backend inherits them.
//! - **Values** ([`Measurement`], [`Spectrogram`], [`ScanConfig`]): data that
//!   flows from the orchestrator to storage.
//!
//! All physical quantities are SI: stage positions and wavelengths in meters,
//! delays and integration times in seconds, frequencies in hertz.
//!
//! ## Example
//!
//! ```rust,no_run
//! use frog_core::{CalibrationStore, LinearMotor};
//! # use std::sync::Arc;
//! # async fn example(backend: Arc<dyn frog_core::MotorBackend>) -> frog_core::FrogResult<()> {
//! let motor = LinearMotor::new(backend, CalibrationStore::new("/tmp/calibration"))?
//!     .with_travel_limits(0.0, 20e-3)?;
//! motor.move_absolute(11.37e-3).await?;
//! motor.wait_move_finished(std::time::Duration::from_millis(50)).await?;
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod error;
pub mod fault;
pub mod limits;
pub mod measurement;
pub mod optics;
pub mod scan;
pub mod sensor;
pub mod stage;
pub mod time_zero;
pub mod units;

pub use capabilities::{MotorBackend, PixelFormat, SpectralAxis, SpectrometerBackend};
pub use error::{DriverError, DriverErrorKind, FrogError, FrogResult};
pub use fault::{Delivery, FaultPolicy, Reading};
pub use limits::TravelLimits;
pub use measurement::{Measurement, MeasurementMeta, SensorMeta, Spectrogram};
pub use optics::CameraOptics;
pub use scan::{ScanConfig, SpectralWindow};
pub use sensor::{AveragingPolicy, SpectralSensor, Spectrum};
pub use stage::LinearMotor;
pub use time_zero::{CalibrationStore, TimeZero};
