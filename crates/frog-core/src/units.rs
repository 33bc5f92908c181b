//! Unit conversions between stage travel, optical delay and spectral axes.
//!
//! The delay line is double-pass: moving the retro-reflector by `d` changes
//! the optical path by `2d`, so one meter of travel is `2 / c` seconds of
//! delay.

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Meters per micrometer.
pub const MICROMETER: f64 = 1e-6;

/// Meters per nanometer.
pub const NANOMETER: f64 = 1e-9;

/// Optical delay (s) produced by a stage displacement (m).
#[must_use]
pub fn distance_to_delay(distance: f64) -> f64 {
    2.0 * distance / SPEED_OF_LIGHT
}

/// Stage displacement (m) needed for an optical delay (s).
#[must_use]
pub fn delay_to_distance(delay: f64) -> f64 {
    delay * SPEED_OF_LIGHT / 2.0
}

/// Optical frequency (Hz) of a vacuum wavelength (m).
#[must_use]
pub fn wavelength_to_frequency(wavelength: f64) -> f64 {
    SPEED_OF_LIGHT / wavelength
}

/// Vacuum wavelength (m) of an optical frequency (Hz).
#[must_use]
pub fn frequency_to_wavelength(frequency: f64) -> f64 {
    SPEED_OF_LIGHT / frequency
}

/// Convert micrometers to meters.
#[must_use]
pub fn micrometers(value: f64) -> f64 {
    value * MICROMETER
}

/// `count` evenly spaced samples from `start` to `end`, both included.
///
/// The last sample is exactly `end`.
#[must_use]
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
            values[count - 1] = end;
            values
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_round_trip() {
        let distance = 4.0 * MICROMETER;
        let delay = distance_to_delay(distance);
        // 4 µm double pass is ~26.685 fs
        assert!((delay * 1e15 - 26.685).abs() < 1e-3);
        assert!((delay_to_distance(delay) - distance).abs() < 1e-18);
    }

    #[test]
    fn negative_travel_gives_negative_delay() {
        assert!(distance_to_delay(-1e-3) < 0.0);
    }

    #[test]
    fn wavelength_frequency_are_inverse() {
        let wl = 400.0 * NANOMETER;
        let f = wavelength_to_frequency(wl);
        assert!((f - 749.481_145e12).abs() < 1e6);
        assert!((frequency_to_wavelength(f) - wl).abs() < 1e-18);
    }

    #[test]
    fn linspace_hits_end_exactly() {
        let values = linspace(0.1, 0.7, 7);
        assert_eq!(values.len(), 7);
        assert_eq!(values[0], 0.1);
        assert_eq!(values[6], 0.7);
        assert!((values[3] - 0.4).abs() < 1e-15);
        assert_eq!(linspace(3.0, 5.0, 1), vec![3.0]);
        assert!(linspace(3.0, 5.0, 0).is_empty());
    }
}
