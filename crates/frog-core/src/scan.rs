//! Scan configuration captured at scan start.

use crate::error::{FrogError, FrogResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wavelength band kept from each spectrometer readout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralWindow {
    /// Band center (m)
    pub center: f64,
    /// Full band width (m)
    pub span: f64,
}

impl SpectralWindow {
    /// Indices of `wavelengths` inside `[center - span/2, center + span/2]`.
    #[must_use]
    pub fn select(&self, wavelengths: &[f64]) -> Vec<usize> {
        let low = self.center - self.span / 2.0;
        let high = self.center + self.span / 2.0;
        wavelengths
            .iter()
            .enumerate()
            .filter(|(_, wl)| **wl >= low && **wl <= high)
            .map(|(i, _)| i)
            .collect()
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(50)
}

/// Parameters of one delay scan. Positions and steps in meters.
///
/// Step `i` moves the stage to `center_position + start_position + i * step_size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub center_position: f64,
    /// Offset of the first step from the center, usually negative
    pub start_position: f64,
    pub step_size: f64,
    pub step_count: usize,
    /// Integration time (s) applied before the scan
    #[serde(default)]
    pub integration_time: Option<f64>,
    #[serde(default)]
    pub scans_to_average: Option<u32>,
    /// Band kept from wavelength-calibrated sensors; all bins when unset
    #[serde(default)]
    pub spectral_window: Option<SpectralWindow>,
    /// Interval between motion-status polls
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Upper bound on each stage settle; unbounded when unset
    #[serde(default, with = "humantime_serde")]
    pub motion_timeout: Option<Duration>,
}

impl ScanConfig {
    pub fn new(center_position: f64, start_position: f64, step_size: f64, step_count: usize) -> Self {
        Self {
            center_position,
            start_position,
            step_size,
            step_count,
            integration_time: None,
            scans_to_average: None,
            spectral_window: None,
            poll_interval: default_poll_interval(),
            motion_timeout: None,
        }
    }

    /// Scan symmetric about the center: `step_count = round(2·|start| / step)`.
    pub fn symmetric(center_position: f64, start_position: f64, step_size: f64) -> FrogResult<Self> {
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(FrogError::InvalidScanConfig(format!(
                "step size must be positive, got {step_size}"
            )));
        }
        let steps = (2.0 * start_position.abs() / step_size).round();
        Ok(Self::new(center_position, start_position, step_size, steps as usize))
    }

    #[must_use]
    pub fn with_spectral_window(mut self, center: f64, span: f64) -> Self {
        self.spectral_window = Some(SpectralWindow { center, span });
        self
    }

    #[must_use]
    pub fn with_integration_time(mut self, seconds: f64) -> Self {
        self.integration_time = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_scans_to_average(mut self, count: u32) -> Self {
        self.scans_to_average = Some(count);
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_motion_timeout(mut self, timeout: Duration) -> Self {
        self.motion_timeout = Some(timeout);
        self
    }

    /// Stage position before the first step.
    #[must_use]
    pub fn start_target(&self) -> f64 {
        self.start_position + self.center_position
    }

    /// Stage position of step `index`.
    #[must_use]
    pub fn step_target(&self, index: usize) -> f64 {
        self.start_position + self.center_position + index as f64 * self.step_size
    }

    pub fn validate(&self) -> FrogResult<()> {
        let invalid = |msg: String| Err(FrogError::InvalidScanConfig(msg));
        if self.step_count == 0 {
            return invalid("step count must be at least 1".into());
        }
        if !self.step_size.is_finite() || self.step_size == 0.0 {
            return invalid(format!("step size must be finite and non-zero, got {}", self.step_size));
        }
        if !self.center_position.is_finite() || !self.start_position.is_finite() {
            return invalid("positions must be finite".into());
        }
        if self.poll_interval.is_zero() {
            return invalid("poll interval must be non-zero".into());
        }
        if let Some(window) = &self.spectral_window {
            if !(window.span.is_finite() && window.span > 0.0) || !window.center.is_finite() {
                return invalid(format!("invalid spectral window {window:?}"));
            }
        }
        if self.scans_to_average == Some(0) {
            return invalid("scans to average must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::micrometers;

    #[test]
    fn symmetric_step_count() {
        let config = ScanConfig::symmetric(micrometers(11370.0), micrometers(-256.0), micrometers(4.0)).unwrap();
        assert_eq!(config.step_count, 128);
        assert!(ScanConfig::symmetric(0.0, -1e-3, 0.0).is_err());
    }

    #[test]
    fn step_targets() {
        let config = ScanConfig::new(11370e-6, -256e-6, 4e-6, 128);
        assert!((config.start_target() - 11114e-6).abs() < 1e-12);
        assert!((config.step_target(127) - (11114e-6 + 508e-6)).abs() < 1e-12);
    }

    #[test]
    fn validation() {
        assert!(ScanConfig::new(0.0, 0.0, 1e-6, 1).validate().is_ok());
        assert!(ScanConfig::new(0.0, 0.0, 1e-6, 0).validate().is_err());
        assert!(ScanConfig::new(0.0, 0.0, 0.0, 4).validate().is_err());
        assert!(ScanConfig::new(0.0, 0.0, 1e-6, 4)
            .with_spectral_window(400e-9, 0.0)
            .validate()
            .is_err());
        assert!(ScanConfig::new(0.0, 0.0, 1e-6, 4)
            .with_scans_to_average(0)
            .validate()
            .is_err());
    }

    #[test]
    fn window_selection_is_inclusive() {
        let wl = [380e-9, 390e-9, 400e-9, 410e-9, 420e-9];
        let window = SpectralWindow {
            center: 400e-9,
            span: 25e-9,
        };
        assert_eq!(window.select(&wl), vec![1, 2, 3]);
    }

    #[test]
    fn toml_round_trip_with_durations() {
        let config = ScanConfig::new(1e-2, -1e-4, 1e-6, 200)
            .with_poll_interval(Duration::from_millis(20))
            .with_motion_timeout(Duration::from_secs(5));
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("poll_interval = \"20ms\""));
        let back: ScanConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
