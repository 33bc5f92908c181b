//! Single-page grayscale TIFF encoding of spectrograms.
//!
//! Camera traces keep their native container: Mono8 as 8-bit, Mono12 (already
//! scaled to the 16-bit range) as 16-bit. Everything else is stored as 64-bit
//! float so resampled spectrometer traces survive unchanged. Image width is the
//! number of delay steps, height the number of spectral bins.

use crate::error::{StorageError, StorageResult};
use frog_core::{PixelFormat, Spectrogram};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::ColorType;

/// Sample layout written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    U16,
    F64,
}

impl SampleFormat {
    /// Container for a measurement taken with `pixel_format` (none for spectrometers).
    pub fn for_pixel_format(pixel_format: Option<PixelFormat>) -> Self {
        match pixel_format {
            Some(PixelFormat::Mono8) => SampleFormat::U8,
            Some(PixelFormat::Mono12) => SampleFormat::U16,
            None => SampleFormat::F64,
        }
    }
}

fn dimension(value: usize, what: &str) -> StorageResult<u32> {
    u32::try_from(value)
        .map_err(|_| StorageError::UnsupportedImage(format!("{what} {value} exceeds TIFF limits")))
}

fn to_integer<T>(values: &[f64], max: f64, convert: impl Fn(f64) -> T) -> Vec<T> {
    values
        .iter()
        .map(|v| convert(v.round().clamp(0.0, max)))
        .collect()
}

/// Write `image` to `path` as `format`.
pub fn write_spectrogram(path: &Path, image: &Spectrogram, format: SampleFormat) -> StorageResult<()> {
    let width = dimension(image.cols(), "width")?;
    let height = dimension(image.rows(), "height")?;
    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;

    match format {
        SampleFormat::U8 => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let data = to_integer(image.as_slice(), f64::from(u8::MAX), |v| v as u8);
            encoder.write_image::<colortype::Gray8>(width, height, &data)?;
        }
        SampleFormat::U16 => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let data = to_integer(image.as_slice(), f64::from(u16::MAX), |v| v as u16);
            encoder.write_image::<colortype::Gray16>(width, height, &data)?;
        }
        SampleFormat::F64 => {
            encoder.write_image::<colortype::Gray64Float>(width, height, image.as_slice())?;
        }
    }
    Ok(())
}

/// Read a grayscale TIFF back into a spectrogram.
pub fn read_spectrogram(path: &Path) -> StorageResult<Spectrogram> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file))?;

    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => {
            return Err(StorageError::UnsupportedImage(format!(
                "{}: expected grayscale, found {other:?}",
                path.display()
            )))
        }
    }

    let (width, height) = decoder.dimensions()?;
    let data: Vec<f64> = match decoder.read_image()? {
        DecodingResult::U8(values) => values.into_iter().map(f64::from).collect(),
        DecodingResult::U16(values) => values.into_iter().map(f64::from).collect(),
        DecodingResult::F64(values) => values,
        DecodingResult::F32(values) => values.into_iter().map(f64::from).collect(),
        _ => {
            return Err(StorageError::UnsupportedImage(format!(
                "{}: unsupported sample type",
                path.display()
            )))
        }
    };
    Ok(Spectrogram::from_row_major(height as usize, width as usize, data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Spectrogram {
        Spectrogram::from_row_major(2, 3, vec![0.0, 1.4, 2.6, 300.0, -5.0, 4095.0 * 16.0]).unwrap()
    }

    #[test]
    fn container_per_pixel_format() {
        assert_eq!(SampleFormat::for_pixel_format(Some(PixelFormat::Mono8)), SampleFormat::U8);
        assert_eq!(SampleFormat::for_pixel_format(Some(PixelFormat::Mono12)), SampleFormat::U16);
        assert_eq!(SampleFormat::for_pixel_format(None), SampleFormat::F64);
    }

    #[test]
    fn eight_bit_values_are_rounded_and_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.tiff");
        write_spectrogram(&path, &grid(), SampleFormat::U8).unwrap();
        let back = read_spectrogram(&path).unwrap();
        assert_eq!(back.shape(), (2, 3));
        assert_eq!(back.as_slice(), &[0.0, 1.0, 3.0, 255.0, 0.0, 255.0]);
    }

    #[test]
    fn sixteen_bit_keeps_scaled_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.tiff");
        write_spectrogram(&path, &grid(), SampleFormat::U16).unwrap();
        let back = read_spectrogram(&path).unwrap();
        assert_eq!(back.as_slice(), &[0.0, 1.0, 3.0, 300.0, 0.0, 65520.0]);
    }

    #[test]
    fn float_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.tiff");
        let image = Spectrogram::from_row_major(3, 2, vec![1e-21, -0.5, 3.25, 7.0, 0.1, 1e9]).unwrap();
        write_spectrogram(&path, &image, SampleFormat::F64).unwrap();
        assert_eq!(read_spectrogram(&path).unwrap(), image);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_spectrogram(&dir.path().join("absent.tiff")).unwrap_err();
        assert!(err.is_not_found());
    }
}
