//! Measurement values handed from the orchestrator to storage.

use crate::capabilities::PixelFormat;
use crate::error::{FrogError, FrogResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// =============================================================================
// Spectrogram
// =============================================================================

/// Dense 2-D intensity grid: rows are spectral bins, columns are delay steps.
///
/// Stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Spectrogram {
    /// Zero-filled grid.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wrap row-major data.
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> FrogResult<Self> {
        if data.len() != rows * cols {
            return Err(FrogError::ShapeMismatch {
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    /// Copy of column `col`.
    #[must_use]
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows)
            .map(|row| self.data[row * self.cols + col])
            .collect()
    }

    /// Overwrite column `col` with `values` (one per row).
    pub fn set_column(&mut self, col: usize, values: &[f64]) -> FrogResult<()> {
        if values.len() != self.rows {
            return Err(FrogError::ShapeMismatch {
                expected: self.rows,
                actual: values.len(),
            });
        }
        if col >= self.cols {
            return Err(FrogError::ShapeMismatch {
                expected: self.cols,
                actual: col + 1,
            });
        }
        for (row, value) in values.iter().enumerate() {
            self.data[row * self.cols + col] = *value;
        }
        Ok(())
    }

    /// Apply `f` to every value.
    pub fn map_in_place(&mut self, f: impl Fn(f64) -> f64) {
        self.data.iter_mut().for_each(|v| *v = f(*v));
    }

    /// Row-major values.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Sensor-specific part of the measurement metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorMeta {
    Camera {
        camera: String,
        pixel_format: PixelFormat,
    },
    Spectrometer {
        spectrometer: String,
        /// Spectral window width (m), if one was applied
        span: Option<f64>,
        /// Spectral window center (m), if one was applied
        center: Option<f64>,
    },
}

impl SensorMeta {
    pub fn identity(&self) -> &str {
        match self {
            SensorMeta::Camera { camera, .. } => camera,
            SensorMeta::Spectrometer { spectrometer, .. } => spectrometer,
        }
    }
}

/// Scan parameters and calibration constants stored next to the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementMeta {
    pub timestamp: DateTime<Local>,
    /// Stage center position (m)
    pub center_position: f64,
    /// Offset of the first step from the center (m)
    pub start_position: f64,
    pub step_number: usize,
    /// Stage step (m)
    pub step_size: f64,
    /// Delay per step (s)
    pub ccddt: f64,
    /// Frequency per spectral bin (Hz)
    pub ccddv: f64,
    pub sensor: SensorMeta,
    #[serde(default)]
    pub comment: String,
}

impl MeasurementMeta {
    /// Pixel format when the measurement came from a camera.
    pub fn bit_depth(&self) -> Option<PixelFormat> {
        match &self.sensor {
            SensorMeta::Camera { pixel_format, .. } => Some(*pixel_format),
            SensorMeta::Spectrometer { .. } => None,
        }
    }
}

// =============================================================================
// Measurement
// =============================================================================

/// A completed spectrogram and its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    image: Spectrogram,
    meta: MeasurementMeta,
}

impl Measurement {
    /// Pair an image with its metadata.
    ///
    /// The image must have one column per delay step and at least one row.
    pub fn new(image: Spectrogram, meta: MeasurementMeta) -> FrogResult<Self> {
        if image.cols() != meta.step_number {
            return Err(FrogError::InvalidMeasurement(format!(
                "image has {} columns but step_number is {}",
                image.cols(),
                meta.step_number
            )));
        }
        if image.rows() == 0 {
            return Err(FrogError::InvalidMeasurement(
                "image has no spectral bins".into(),
            ));
        }
        Ok(Self { image, meta })
    }

    pub fn image(&self) -> &Spectrogram {
        &self.image
    }

    pub fn meta(&self) -> &MeasurementMeta {
        &self.meta
    }

    /// Copy carrying `comment`.
    #[must_use]
    pub fn annotated(&self, comment: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.meta.comment = comment.into();
        copy
    }

    #[must_use]
    pub fn into_parts(self) -> (Spectrogram, MeasurementMeta) {
        (self.image, self.meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(steps: usize) -> MeasurementMeta {
        MeasurementMeta {
            timestamp: Local::now(),
            center_position: 11.37e-3,
            start_position: -256e-6,
            step_number: steps,
            step_size: 4e-6,
            ccddt: 2.0 * 4e-6 / crate::units::SPEED_OF_LIGHT,
            ccddv: 1e11,
            sensor: SensorMeta::Camera {
                camera: "line".into(),
                pixel_format: PixelFormat::Mono12,
            },
            comment: String::new(),
        }
    }

    #[test]
    fn column_write_and_read() {
        let mut grid = Spectrogram::zeros(3, 2);
        grid.set_column(1, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(grid.column(1), vec![1.0, 2.0, 3.0]);
        assert_eq!(grid.column(0), vec![0.0; 3]);
        assert_eq!(grid.get(2, 1), Some(3.0));
        assert_eq!(grid.get(3, 0), None);
        assert_eq!(grid.as_slice(), &[0.0, 1.0, 0.0, 2.0, 0.0, 3.0]);
    }

    #[test]
    fn column_length_must_match() {
        let mut grid = Spectrogram::zeros(3, 2);
        assert!(matches!(
            grid.set_column(0, &[1.0]),
            Err(FrogError::ShapeMismatch { expected: 3, actual: 1 })
        ));
        assert!(grid.set_column(2, &[0.0; 3]).is_err());
    }

    #[test]
    fn measurement_checks_step_count() {
        assert!(Measurement::new(Spectrogram::zeros(4, 3), meta(3)).is_ok());
        assert!(matches!(
            Measurement::new(Spectrogram::zeros(4, 3), meta(5)),
            Err(FrogError::InvalidMeasurement(_))
        ));
        assert!(Measurement::new(Spectrogram::zeros(0, 3), meta(3)).is_err());
    }

    #[test]
    fn annotation_leaves_original_untouched() {
        let measurement = Measurement::new(Spectrogram::zeros(1, 1), meta(1)).unwrap();
        let annotated = measurement.annotated("first light");
        assert_eq!(annotated.meta().comment, "first light");
        assert!(measurement.meta().comment.is_empty());
        assert_eq!(annotated.meta().bit_depth(), Some(PixelFormat::Mono12));
    }
}
