//! Simulated wavelength-calibrated spectrometer.

use anyhow::Result;
use async_trait::async_trait;
use frog_core::units::linspace;
use frog_core::{SpectralAxis, SpectrometerBackend};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::common::{ErrorConfig, MockRng};
use crate::pattern::Illumination;

/// Integration time at which the simulated counts equal the illumination level (s).
const REFERENCE_INTEGRATION: f64 = 0.1;

/// Simulated USB spectrometer.
///
/// Counts scale linearly with integration time relative to 100 ms. Noise is
/// uniform with the configured amplitude and shrinks with `1/sqrt(N)` when
/// averaging is supported and enabled.
pub struct MockSpectrometer {
    identity: String,
    wavelengths: Vec<f64>,
    limits: (f64, f64),
    integration_time: Mutex<f64>,
    averaging_supported: bool,
    scans_to_average: Mutex<u32>,
    illumination: Illumination,
    noise: f64,
    rng: MockRng,
    error_config: ErrorConfig,
    reads: AtomicUsize,
}

impl MockSpectrometer {
    /// Flat 2048-bin spectrometer from 350 nm to 450 nm.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MockSpectrometerBuilder {
        MockSpectrometerBuilder::new()
    }

    /// Readouts served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Default for MockSpectrometer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpectrometerBackend for MockSpectrometer {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn axis(&self) -> SpectralAxis {
        SpectralAxis::Wavelength
    }

    async fn wavelengths(&self) -> Result<Vec<f64>> {
        Ok(self.wavelengths.clone())
    }

    async fn intensities(&self) -> Result<Vec<f64>> {
        self.error_config.check(&self.identity, "read")?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let gain = *self.integration_time.lock() / REFERENCE_INTEGRATION;
        let averages = *self.scans_to_average.lock();
        let noise = self.noise / f64::from(averages).sqrt();
        Ok(self
            .illumination
            .sample(&self.wavelengths)
            .into_iter()
            .map(|level| level * gain + self.rng.symmetric(noise))
            .collect())
    }

    async fn set_integration_time(&self, seconds: f64) -> Result<()> {
        self.error_config.check(&self.identity, "integration")?;
        *self.integration_time.lock() = seconds;
        Ok(())
    }

    fn integration_time_limits(&self) -> (f64, f64) {
        self.limits
    }

    fn supports_averaging(&self) -> bool {
        self.averaging_supported
    }

    async fn set_scans_to_average(&self, count: u32) -> Result<()> {
        *self.scans_to_average.lock() = count.max(1);
        Ok(())
    }
}

/// Builder for [`MockSpectrometer`].
pub struct MockSpectrometerBuilder {
    identity: String,
    range: (f64, f64),
    bins: usize,
    limits: (f64, f64),
    averaging_supported: bool,
    illumination: Illumination,
    noise: f64,
    seed: Option<u64>,
    error_config: ErrorConfig,
}

impl MockSpectrometerBuilder {
    pub fn new() -> Self {
        Self {
            identity: "mock_spectrometer".into(),
            range: (350e-9, 450e-9),
            bins: 2048,
            // Same range as the StellarNet emulator: 2 ms to 65.535 s
            limits: (2e-3, 65.535),
            averaging_supported: false,
            illumination: Illumination::Flat(1.0),
            noise: 0.0,
            seed: None,
            error_config: ErrorConfig::none(),
        }
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Evenly spaced bins from `min` to `max` (m), inclusive.
    pub fn wavelength_range(mut self, min: f64, max: f64, bins: usize) -> Self {
        self.range = (min, max);
        self.bins = bins;
        self
    }

    /// Integration time range (s).
    pub fn integration_limits(mut self, min: f64, max: f64) -> Self {
        self.limits = (min, max);
        self
    }

    pub fn averaging_supported(mut self, supported: bool) -> Self {
        self.averaging_supported = supported;
        self
    }

    pub fn illumination(mut self, illumination: Illumination) -> Self {
        self.illumination = illumination;
        self
    }

    /// Uniform noise amplitude (counts) and RNG seed.
    pub fn noise(mut self, amplitude: f64, seed: Option<u64>) -> Self {
        self.noise = amplitude;
        self.seed = seed;
        self
    }

    pub fn error_config(mut self, config: ErrorConfig) -> Self {
        self.error_config = config;
        self
    }

    pub fn build(self) -> MockSpectrometer {
        MockSpectrometer {
            identity: self.identity,
            wavelengths: linspace(self.range.0, self.range.1, self.bins),
            limits: self.limits,
            integration_time: Mutex::new(REFERENCE_INTEGRATION),
            averaging_supported: self.averaging_supported,
            scans_to_average: Mutex::new(1),
            illumination: self.illumination,
            noise: self.noise,
            rng: MockRng::new(self.seed),
            error_config: self.error_config,
            reads: AtomicUsize::new(0),
        }
    }
}

impl Default for MockSpectrometerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorScenario;

    #[tokio::test]
    async fn flat_readout_scales_with_integration() {
        let spec = MockSpectrometer::builder()
            .wavelength_range(380e-9, 420e-9, 16)
            .illumination(Illumination::Flat(10.0))
            .build();
        assert_eq!(spec.wavelengths().await.unwrap().len(), 16);
        assert_eq!(spec.intensities().await.unwrap(), vec![10.0; 16]);

        spec.set_integration_time(0.2).await.unwrap();
        assert_eq!(spec.intensities().await.unwrap(), vec![20.0; 16]);
        assert_eq!(spec.read_count(), 2);
    }

    #[tokio::test]
    async fn seeded_noise_is_bounded() {
        let spec = MockSpectrometer::builder()
            .wavelength_range(380e-9, 420e-9, 64)
            .illumination(Illumination::Flat(100.0))
            .noise(5.0, Some(3))
            .build();
        let values = spec.intensities().await.unwrap();
        assert!(values.iter().all(|v| (v - 100.0).abs() <= 5.0));
        assert!(values.iter().any(|v| *v != 100.0));
    }

    #[tokio::test]
    async fn read_failures_are_injected() {
        let spec = MockSpectrometer::builder()
            .error_config(ErrorConfig::scenario(ErrorScenario::FailAfterN {
                operation: "read",
                count: 1,
            }))
            .build();
        assert!(spec.intensities().await.is_ok());
        assert!(spec.intensities().await.is_err());
    }
}
