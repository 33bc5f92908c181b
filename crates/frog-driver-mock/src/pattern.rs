//! Synthetic SHG FROG trace of a transform-limited Gaussian pulse.

use crate::mock_stage::MockStage;
use frog_core::units::{distance_to_delay, SPEED_OF_LIGHT};

/// Gaussian pulse seen through an SHG FROG.
///
/// The trace is separable: a Gaussian in delay with `1/e` half-width
/// `delay_width` times a Gaussian in second-harmonic frequency centered on
/// `c / center_wavelength` with `1/e` half-width `frequency_width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrogPattern {
    /// Second-harmonic center wavelength (m)
    pub center_wavelength: f64,
    /// Spectral `1/e` half-width (Hz)
    pub frequency_width: f64,
    /// Delay `1/e` half-width (s)
    pub delay_width: f64,
    /// Peak intensity (counts)
    pub amplitude: f64,
    /// Constant offset present in every readout, e.g. dark counts
    pub baseline: f64,
}

impl Default for FrogPattern {
    fn default() -> Self {
        Self {
            center_wavelength: 400e-9,
            frequency_width: 4e12,
            delay_width: 100e-15,
            amplitude: 1000.0,
            baseline: 50.0,
        }
    }
}

impl FrogPattern {
    /// Intensity at optical delay `delay` (s) and wavelength `wavelength` (m).
    #[must_use]
    pub fn intensity(&self, delay: f64, wavelength: f64) -> f64 {
        let nu0 = SPEED_OF_LIGHT / self.center_wavelength;
        let nu = SPEED_OF_LIGHT / wavelength;
        let spectral = (-((nu - nu0) / self.frequency_width).powi(2)).exp();
        let temporal = (-(delay / self.delay_width).powi(2)).exp();
        self.baseline + self.amplitude * spectral * temporal
    }

    /// One readout over `wavelengths` at `delay`.
    #[must_use]
    pub fn spectrum(&self, delay: f64, wavelengths: &[f64]) -> Vec<f64> {
        wavelengths
            .iter()
            .map(|wl| self.intensity(delay, *wl))
            .collect()
    }
}

/// Light reaching a simulated sensor.
#[derive(Debug, Clone)]
pub enum Illumination {
    /// Same intensity in every bin, independent of the stage.
    Flat(f64),
    /// FROG trace whose delay follows a simulated stage.
    Frog {
        pattern: FrogPattern,
        stage: MockStage,
        /// Stage position of zero delay (m)
        time_zero: f64,
    },
}

impl Illumination {
    /// Intensity per bin for the current stage position.
    #[must_use]
    pub fn sample(&self, wavelengths: &[f64]) -> Vec<f64> {
        match self {
            Illumination::Flat(level) => vec![*level; wavelengths.len()],
            Illumination::Frog {
                pattern,
                stage,
                time_zero,
            } => {
                let delay = distance_to_delay(stage.current_position() - time_zero);
                pattern.spectrum(delay, wavelengths)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_at_zero_delay_and_center() {
        let pattern = FrogPattern::default();
        let peak = pattern.intensity(0.0, 400e-9);
        assert!((peak - 1050.0).abs() < 1e-9);
        assert!(pattern.intensity(300e-15, 400e-9) < peak);
        assert!(pattern.intensity(0.0, 410e-9) < peak);
    }

    #[test]
    fn far_from_pulse_only_baseline_remains() {
        let pattern = FrogPattern::default();
        assert!((pattern.intensity(10e-12, 400e-9) - 50.0).abs() < 1e-6);
    }

    #[test]
    fn illumination_follows_stage() {
        let stage = MockStage::builder().initial_position(10e-3).build();
        let light = Illumination::Frog {
            pattern: FrogPattern::default(),
            stage: stage.clone(),
            time_zero: 10e-3,
        };
        let at_zero = light.sample(&[400e-9])[0];
        assert!((at_zero - 1050.0).abs() < 1e-9);
        assert_eq!(Illumination::Flat(2.0).sample(&[1.0, 2.0]), vec![2.0, 2.0]);
    }
}
