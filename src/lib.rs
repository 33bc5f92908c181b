//! frog_daq - acquisition and device safety for SHG FROG
//!
//! The workspace is split into:
//! - [`frog_core`]: device contracts, interlocks, measurement types
//! - [`frog_experiment`]: the scan engine and spectral resampling
//! - [`frog_storage`]: measurement directories and configuration
//! - [`frog_driver_mock`]: simulated stage, spectrometer and camera
//!
//! This crate ties them together for the `frog_daq` binary.

pub mod simulation;
pub mod tracing_setup;

pub use frog_core;
pub use frog_driver_mock;
pub use frog_experiment;
pub use frog_storage;
