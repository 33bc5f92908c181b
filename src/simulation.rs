//! Simulated FROG setup assembled from the application configuration.
//!
//! The stage and sensor are the mock backends; interlocks, calibration and
//! storage are the real ones, so a simulated session exercises the same path
//! as the lab setup.

use std::sync::Arc;

use frog_core::units::NANOMETER;
use frog_core::{CalibrationStore, FrogResult, LinearMotor, SpectralSensor, SpectrometerBackend};
use frog_driver_mock::{FrogPattern, Illumination, MockCamera, MockSpectrometer, MockStage};
use frog_experiment::ScanEngine;
use frog_storage::{FrogConfig, SpectralDevice};
use tracing::info;

/// Build a scan engine over simulated devices.
///
/// The stage starts at `park_position`. Without a stored time-zero the
/// simulated pulse overlap is seeded there, so parking at the scan center puts
/// the pulse in the middle of the trace.
pub async fn simulated_engine(config: &FrogConfig, park_position: f64) -> FrogResult<ScanEngine> {
    let stage = MockStage::builder()
        .identity("mock_stage")
        .initial_position(park_position)
        .build();
    let [lower, upper] = config.devices.stage_travel_limits;
    let motor = LinearMotor::new(
        Arc::new(stage.clone()),
        CalibrationStore::new(&config.storage.calibration_dir),
    )?
    .with_travel_limits(lower, upper)?;
    let time_zero = motor.time_zero().await?;
    info!(time_zero, "Simulated stage ready");

    // Cameras sit behind the grating, centered on the optics' wavelength
    let pattern = match config.devices.spectral_device {
        SpectralDevice::Spectrometer => FrogPattern::default(),
        SpectralDevice::Camera => FrogPattern {
            center_wavelength: config.optics.center_wavelength_nm * NANOMETER,
            ..FrogPattern::default()
        },
    };
    let illumination = Illumination::Frog {
        pattern,
        stage,
        time_zero,
    };
    let backend: Arc<dyn SpectrometerBackend> = match config.devices.spectral_device {
        SpectralDevice::Spectrometer => Arc::new(
            MockSpectrometer::builder()
                .identity(
                    config
                        .devices
                        .spectrometer_id
                        .clone()
                        .unwrap_or_else(|| "mock_spectrometer".into()),
                )
                .illumination(illumination)
                .noise(2.0, Some(7))
                .build(),
        ),
        SpectralDevice::Camera => Arc::new(
            MockCamera::builder()
                .identity(config.devices.camera_id.clone())
                .optics(config.optics)
                .illumination(illumination)
                .noise(2.0, Some(7))
                .build(),
        ),
    };

    Ok(ScanEngine::new(
        Arc::new(motor),
        Arc::new(SpectralSensor::new(backend)),
        config.optics,
    ))
}
