//! Simulated line camera behind a grating spectrograph.

use anyhow::Result;
use async_trait::async_trait;
use frog_core::units::NANOMETER;
use frog_core::{CameraOptics, PixelFormat, SpectralAxis, SpectrometerBackend};
use parking_lot::Mutex;

use crate::common::{ErrorConfig, MockRng};
use crate::pattern::Illumination;

/// Simulated camera read out as a single line of pixels.
///
/// The pixel axis is uncalibrated from the caller's point of view: the
/// backend reports [`SpectralAxis::Pixel`] and no wavelengths. Internally
/// pixel `i` sees `center + (i - width/2) * nm_per_pixel` so the simulated
/// illumination lands where the optics would put it. Values are integer
/// counts saturating at the pixel format's full scale.
pub struct MockCamera {
    identity: String,
    format: PixelFormat,
    pixel_wavelengths: Vec<f64>,
    exposure: Mutex<f64>,
    illumination: Illumination,
    noise: f64,
    rng: MockRng,
    error_config: ErrorConfig,
}

impl MockCamera {
    pub fn builder() -> MockCameraBuilder {
        MockCameraBuilder::new()
    }

    /// Last exposure applied (s).
    pub fn exposure(&self) -> f64 {
        *self.exposure.lock()
    }

    fn full_scale(&self) -> f64 {
        f64::from((1u32 << self.format.bit_depth()) - 1)
    }
}

#[async_trait]
impl SpectrometerBackend for MockCamera {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn axis(&self) -> SpectralAxis {
        SpectralAxis::Pixel(self.format)
    }

    async fn intensities(&self) -> Result<Vec<f64>> {
        self.error_config.check(&self.identity, "read")?;
        let full_scale = self.full_scale();
        Ok(self
            .illumination
            .sample(&self.pixel_wavelengths)
            .into_iter()
            .map(|level| (level + self.rng.symmetric(self.noise)).round().clamp(0.0, full_scale))
            .collect())
    }

    async fn set_integration_time(&self, seconds: f64) -> Result<()> {
        self.error_config.check(&self.identity, "integration")?;
        *self.exposure.lock() = seconds;
        Ok(())
    }

    fn integration_time_limits(&self) -> (f64, f64) {
        (10e-6, 10.0)
    }
}

/// Builder for [`MockCamera`].
pub struct MockCameraBuilder {
    identity: String,
    format: PixelFormat,
    optics: CameraOptics,
    width: Option<u32>,
    illumination: Illumination,
    noise: f64,
    seed: Option<u64>,
    error_config: ErrorConfig,
}

impl MockCameraBuilder {
    pub fn new() -> Self {
        Self {
            identity: "mock_camera".into(),
            format: PixelFormat::Mono12,
            optics: CameraOptics::default(),
            width: None,
            illumination: Illumination::Flat(100.0),
            noise: 0.0,
            seed: None,
            error_config: ErrorConfig::none(),
        }
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn optics(mut self, optics: CameraOptics) -> Self {
        self.optics = optics;
        self
    }

    /// Number of pixels read out; defaults to the sensor width in the optics.
    pub fn width(mut self, pixels: u32) -> Self {
        self.width = Some(pixels);
        self
    }

    pub fn illumination(mut self, illumination: Illumination) -> Self {
        self.illumination = illumination;
        self
    }

    pub fn noise(mut self, amplitude: f64, seed: Option<u64>) -> Self {
        self.noise = amplitude;
        self.seed = seed;
        self
    }

    pub fn error_config(mut self, config: ErrorConfig) -> Self {
        self.error_config = config;
        self
    }

    pub fn build(self) -> MockCamera {
        let width = self.width.unwrap_or(self.optics.pixels_width);
        let nm_per_pixel = self.optics.nm_per_pixel();
        let half = f64::from(width) / 2.0;
        let pixel_wavelengths = (0..width)
            .map(|i| {
                (self.optics.center_wavelength_nm + (f64::from(i) - half) * nm_per_pixel)
                    * NANOMETER
            })
            .collect();
        MockCamera {
            identity: self.identity,
            format: self.format,
            pixel_wavelengths,
            exposure: Mutex::new(0.01),
            illumination: self.illumination,
            noise: self.noise,
            rng: MockRng::new(self.seed),
            error_config: self.error_config,
        }
    }
}

impl Default for MockCameraBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn readout_is_integer_and_saturates() {
        let camera = MockCamera::builder()
            .width(8)
            .illumination(Illumination::Flat(5000.4))
            .build();
        assert_eq!(camera.intensities().await.unwrap(), vec![4095.0; 8]);

        let camera = MockCamera::builder()
            .width(4)
            .pixel_format(PixelFormat::Mono8)
            .illumination(Illumination::Flat(12.6))
            .build();
        assert_eq!(camera.intensities().await.unwrap(), vec![13.0; 4]);
    }

    #[tokio::test]
    async fn camera_has_no_wavelength_axis() {
        let camera = MockCamera::builder().width(4).build();
        assert_eq!(camera.axis(), SpectralAxis::Pixel(PixelFormat::Mono12));
        assert!(camera.wavelengths().await.is_err());
    }
}
