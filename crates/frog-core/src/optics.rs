//! Spectrograph geometry of camera-based setups.

use serde::{Deserialize, Serialize};

/// Optical constants needed to calibrate a camera's pixel axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraOptics {
    /// Pixel pitch (µm)
    pub pixel_size_um: f64,
    pub pixels_height: u32,
    pub pixels_width: u32,
    /// Wavelength at the sensor center (nm)
    pub center_wavelength_nm: f64,
    /// Focal length of the imaging lens (mm)
    pub focal_length_mm: f64,
    /// Grating angular dispersion (nm/mrad)
    pub grating_nm_per_mrad: f64,
}

impl Default for CameraOptics {
    fn default() -> Self {
        Self {
            pixel_size_um: 5.86,
            pixels_height: 1216,
            pixels_width: 1936,
            center_wavelength_nm: 775.0,
            focal_length_mm: 200.0,
            grating_nm_per_mrad: 0.81,
        }
    }
}

impl CameraOptics {
    /// Wavelength span covered by one pixel (nm).
    #[must_use]
    pub fn nm_per_pixel(&self) -> f64 {
        let mm_per_mrad = self.focal_length_mm / 1000.0;
        let pixels_per_mrad = mm_per_mrad / (self.pixel_size_um / 1000.0);
        self.grating_nm_per_mrad / pixels_per_mrad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dispersion() {
        // 0.2 mm/mrad over 5.86 µm pixels is ~34.13 px/mrad
        let nm = CameraOptics::default().nm_per_pixel();
        assert!((nm - 0.81 * 5.86e-3 / 0.2).abs() < 1e-12);
    }
}
