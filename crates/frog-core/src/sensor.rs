//! Spectral sensor wrapper.
//!
//! [`SpectralSensor`] gives spectrometers and line cameras one contract:
//! readout, spectral axis, identity, integration time bounded by the
//! hardware limits and scans-to-average with an explicit policy for hardware
//! that cannot average.

use crate::capabilities::{PixelFormat, SpectralAxis, SpectrometerBackend};
use crate::error::{FrogError, FrogResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// What to do when averaging is requested on hardware without support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AveragingPolicy {
    /// Remember the value, log a warning, leave the hardware untouched.
    #[default]
    Ignore,
    /// Fail with `AveragingUnsupported`.
    Reject,
}

/// One readout paired with its spectral axis.
///
/// `axis` holds wavelengths (m) for calibrated spectrometers and pixel
/// indices for cameras.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub axis: Vec<f64>,
    pub intensities: Vec<f64>,
}

impl Spectrum {
    #[must_use]
    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }
}

/// Uniform spectral-sensor contract over any [`SpectrometerBackend`].
pub struct SpectralSensor {
    backend: Arc<dyn SpectrometerBackend>,
    identity: String,
    axis: SpectralAxis,
    averaging: AveragingPolicy,
    integration_time: Mutex<Option<f64>>,
    scans_to_average: Mutex<u32>,
    closed: AtomicBool,
}

impl std::fmt::Debug for SpectralSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralSensor")
            .field("identity", &self.identity)
            .field("axis", &self.axis)
            .field("integration_time", &*self.integration_time.lock())
            .finish()
    }
}

impl SpectralSensor {
    pub fn new(backend: Arc<dyn SpectrometerBackend>) -> Self {
        Self {
            identity: backend.identity(),
            axis: backend.axis(),
            backend,
            averaging: AveragingPolicy::default(),
            integration_time: Mutex::new(None),
            scans_to_average: Mutex::new(1),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_averaging_policy(mut self, policy: AveragingPolicy) -> Self {
        self.averaging = policy;
        self
    }

    /// Identification string.
    pub fn idn(&self) -> &str {
        &self.identity
    }

    pub fn axis(&self) -> SpectralAxis {
        self.axis
    }

    #[must_use]
    pub fn is_wavelength_based(&self) -> bool {
        matches!(self.axis, SpectralAxis::Wavelength)
    }

    /// Pixel format of camera-style sensors.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        match self.axis {
            SpectralAxis::Pixel(format) => Some(format),
            SpectralAxis::Wavelength => None,
        }
    }

    fn ensure_open(&self) -> FrogResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(FrogError::DeviceClosed(self.identity.clone()))
        } else {
            Ok(())
        }
    }

    /// One readout.
    pub async fn intensities(&self) -> FrogResult<Vec<f64>> {
        self.ensure_open()?;
        Ok(self.backend.intensities().await?)
    }

    /// Bin wavelengths (m). Fails on pixel-axis sensors.
    pub async fn wavelengths(&self) -> FrogResult<Vec<f64>> {
        self.ensure_open()?;
        Ok(self.backend.wavelengths().await?)
    }

    /// One readout with its axis.
    pub async fn spectrum(&self) -> FrogResult<Spectrum> {
        let intensities = self.intensities().await?;
        let axis = match self.axis {
            SpectralAxis::Wavelength => self.wavelengths().await?,
            SpectralAxis::Pixel(_) => (0..intensities.len()).map(|i| i as f64).collect(),
        };
        if axis.len() != intensities.len() {
            return Err(FrogError::ShapeMismatch {
                expected: axis.len(),
                actual: intensities.len(),
            });
        }
        Ok(Spectrum { axis, intensities })
    }

    /// Supported integration time range (s).
    pub fn integration_time_limits(&self) -> (f64, f64) {
        self.backend.integration_time_limits()
    }

    /// Last integration time applied through this wrapper (s).
    pub fn integration_time(&self) -> FrogResult<f64> {
        (*self.integration_time.lock()).ok_or(FrogError::IntegrationTimeNotSet)
    }

    /// Apply an integration time (s). Out-of-range values never reach the backend.
    #[instrument(skip(self), fields(sensor = %self.identity), err)]
    pub async fn set_integration_time(&self, seconds: f64) -> FrogResult<()> {
        self.ensure_open()?;
        let (min, max) = self.integration_time_limits();
        if !(seconds >= min && seconds <= max) {
            return Err(FrogError::IntegrationOutOfRange {
                requested: seconds,
                min,
                max,
            });
        }
        self.backend.set_integration_time(seconds).await?;
        *self.integration_time.lock() = Some(seconds);
        debug!(sensor = %self.identity, seconds, "Integration time set");
        Ok(())
    }

    pub fn scans_to_average(&self) -> u32 {
        *self.scans_to_average.lock()
    }

    /// Request averaging over `count` scans.
    ///
    /// `count <= 0` fails with `InvalidAverageCount`. Hardware without
    /// averaging follows the wrapper's [`AveragingPolicy`].
    #[instrument(skip(self), fields(sensor = %self.identity), err)]
    pub async fn set_scans_to_average(&self, count: i64) -> FrogResult<()> {
        self.ensure_open()?;
        let count = u32::try_from(count)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(FrogError::InvalidAverageCount(count))?;
        if self.backend.supports_averaging() {
            self.backend.set_scans_to_average(count).await?;
        } else {
            match self.averaging {
                AveragingPolicy::Reject => {
                    return Err(FrogError::AveragingUnsupported(self.identity.clone()))
                }
                AveragingPolicy::Ignore => {
                    warn!(sensor = %self.identity, count, "Averaging not supported by hardware, value ignored");
                }
            }
        }
        *self.scans_to_average.lock() = count;
        Ok(())
    }

    /// Release the backend. Later calls are no-ops.
    pub async fn close(&self) -> FrogResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(sensor = %self.identity, "Closing spectral sensor");
        self.backend.close().await?;
        Ok(())
    }
}
