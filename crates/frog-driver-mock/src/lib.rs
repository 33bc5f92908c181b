//! Simulated hardware for frog_daq
//!
//! This crate provides backends that run the full acquisition path without
//! a delay stage or spectrometer attached. All devices use async-safe timing
//! (tokio::time::sleep, never std::thread::sleep).
//!
//! # Available Mock Backends
//!
//! - [`MockStage`] - delay stage with instant or distance-proportional motion
//! - [`MockSpectrometer`] - wavelength-calibrated spectrometer
//! - [`MockCamera`] - Mono8/Mono12 line camera behind a grating
//!
//! Sensors can be coupled to a stage through [`Illumination::Frog`], so the
//! simulated trace follows the stage delay the way a real FROG does.
//!
//! ```rust,ignore
//! use frog_driver_mock::*;
//!
//! let stage = MockStage::builder().initial_position(11.37e-3).build();
//! let spectrometer = MockSpectrometer::builder()
//!     .wavelength_range(380e-9, 420e-9, 512)
//!     .illumination(Illumination::Frog {
//!         pattern: FrogPattern::default(),
//!         stage: stage.clone(),
//!         time_zero: 11.37e-3,
//!     })
//!     .build();
//! ```

pub mod common;
mod mock_camera;
mod mock_spectrometer;
mod mock_stage;
mod pattern;

pub use common::{ErrorConfig, ErrorScenario, MockMode, MockRng};

pub use mock_camera::{MockCamera, MockCameraBuilder};
pub use mock_spectrometer::{MockSpectrometer, MockSpectrometerBuilder};
pub use mock_stage::{MockStage, MockStageBuilder, StageCommand};
pub use pattern::{FrogPattern, Illumination};
