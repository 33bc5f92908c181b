//! Spectral axis conversion of recorded traces.
//!
//! Phase retrieval needs the trace on a uniform frequency grid. A
//! spectrometer samples uniformly in wavelength, so each delay column is
//! interpolated onto a linear frequency axis and divided by `ν²` (the Jacobian
//! of `λ = c/ν`, up to the constant `c`). Camera traces are only rescaled to
//! their storage container; their frequency step comes from the optics.

use frog_core::units::{linspace, NANOMETER, SPEED_OF_LIGHT};
use frog_core::{CameraOptics, FrogError, FrogResult, PixelFormat, Spectrogram};

/// Piecewise-linear interpolation of `(xp, fp)` at `x`.
///
/// `xp` must be ascending. Points left of `xp[0]` take `fp[0]`, points right of
/// the last sample take the last value.
#[must_use]
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return vec![0.0; x.len()];
    }
    x.iter()
        .map(|&xi| {
            if xi <= xp[0] {
                return fp[0];
            }
            if xi >= xp[n - 1] {
                return fp[n - 1];
            }
            // First sample strictly greater than xi; 1 <= hi < n here
            let hi = xp[..n].partition_point(|&v| v <= xi);
            let lo = hi - 1;
            let span = xp[hi] - xp[lo];
            if span == 0.0 {
                return fp[hi];
            }
            fp[lo] + (xi - xp[lo]) * (fp[hi] - fp[lo]) / span
        })
        .collect()
}

/// Resample a wavelength-sampled trace onto a uniform frequency grid.
///
/// `wavelengths` (ascending, m) labels the rows of `trace`. Each column is
/// interpolated from `c/λ` onto `linspace(c/λmax, c/λmin, rows)` and divided
/// by `ν²`; the result has ascending frequency along the rows and the delay
/// columns in reverse order.
pub fn wavelength_to_frequency(wavelengths: &[f64], trace: &Spectrogram) -> FrogResult<Spectrogram> {
    let rows = trace.rows();
    if wavelengths.len() != rows {
        return Err(FrogError::ShapeMismatch {
            expected: rows,
            actual: wavelengths.len(),
        });
    }
    if rows == 0 {
        return Ok(trace.clone());
    }

    let (wl_min, wl_max) = min_max(wavelengths);
    let mut f_lin = linspace(SPEED_OF_LIGHT / wl_min, SPEED_OF_LIGHT / wl_max, rows);
    f_lin.reverse();
    let f_hyp: Vec<f64> = wavelengths.iter().rev().map(|wl| SPEED_OF_LIGHT / wl).collect();

    let cols = trace.cols();
    let mut resampled = Spectrogram::zeros(rows, cols);
    for col in 0..cols {
        let mut column = trace.column(col);
        column.reverse();
        let values: Vec<f64> = interp(&f_lin, &f_hyp, &column)
            .into_iter()
            .zip(&f_lin)
            .map(|(value, f)| value / (f * f))
            .collect();
        resampled.set_column(cols - 1 - col, &values)?;
    }
    Ok(resampled)
}

/// Frequency step (Hz) of the uniform grid built from `wavelengths`.
///
/// Uses the full spectrometer axis, not the windowed one.
#[must_use]
pub fn frequency_bin_size(wavelengths: &[f64]) -> f64 {
    if wavelengths.len() < 2 {
        return 0.0;
    }
    let (wl_min, wl_max) = min_max(wavelengths);
    SPEED_OF_LIGHT * (1.0 / wl_min - 1.0 / wl_max) / (wavelengths.len() - 1) as f64
}

/// Frequency step (Hz) covered by one camera pixel at the center wavelength.
#[must_use]
pub fn frequency_step_per_pixel(optics: &CameraOptics) -> f64 {
    let center = optics.center_wavelength_nm * NANOMETER;
    let per_pixel = optics.nm_per_pixel() * NANOMETER;
    SPEED_OF_LIGHT * (1.0 / center - 1.0 / (center + per_pixel))
}

/// Bring camera counts to their storage container.
///
/// Mono12 counts are shifted into the 16-bit range (×16); all values are then
/// rounded half to even.
pub fn scale_pixel_values(trace: &mut Spectrogram, format: PixelFormat) {
    let factor = format.storage_scale();
    trace.map_in_place(|v| (v * factor).round_ties_even());
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}
