//! Backend Capabilities
//!
//! This module defines the raw primitives a hardware driver must provide.
//! Drivers implement one of two traits:
//!
//! - A delay stage implements [`MotorBackend`]
//! - A spectrometer or line camera implements [`SpectrometerBackend`]
//!
//! Backends are deliberately thin. Travel limits, time-zero calibration,
//! integration-time bounds and fault containment are enforced by the
//! wrappers in [`crate::stage`] and [`crate::sensor`], so a new driver only
//! has to translate these calls to its vendor protocol.
//!
//! # Design Philosophy
//!
//! Each backend trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors
//! - Speaks SI units (meters, seconds)
//!
//! # Example
//!
//! ```rust,ignore
//! struct SerialStage { port: SerialPort }
//!
//! #[async_trait]
//! impl MotorBackend for SerialStage {
//!     fn identity(&self) -> String { "serial_stage:/dev/ttyUSB0".into() }
//!
//!     async fn position(&self) -> Result<f64> {
//!         let reply = self.port.query("1TP?").await?;
//!         Ok(reply.parse::<f64>()? * 1e-3)
//!     }
//!
//!     async fn move_to(&self, target: f64) -> Result<()> {
//!         self.port.send(&format!("1PA{:.6}", target * 1e3)).await
//!     }
//!     // ...
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Motion
// =============================================================================

/// Raw linear-stage primitives. Positions in meters.
#[async_trait]
pub trait MotorBackend: Send + Sync {
    /// Stable identity, used as the key for persisted calibration.
    fn identity(&self) -> String;

    /// Whether the controller reports positions as physical distances.
    ///
    /// Stages configured in steps or encoder counts return false and are
    /// refused by the wrapper.
    fn is_distance_calibrated(&self) -> bool {
        true
    }

    /// Current position (m).
    async fn position(&self) -> Result<f64>;

    /// Start an absolute move. May return before motion finishes.
    async fn move_to(&self, target: f64) -> Result<()>;

    /// Start a relative move. May return before motion finishes.
    async fn move_by(&self, delta: f64) -> Result<()>;

    /// Run the homing sequence.
    async fn home(&self, blocking: bool) -> Result<()>;

    /// Halt motion.
    async fn stop(&self, blocking: bool) -> Result<()>;

    /// Whether the stage is still moving.
    async fn is_moving(&self) -> Result<bool>;

    /// Whether [`wait_native`](Self::wait_native) is implemented.
    fn has_native_wait(&self) -> bool {
        false
    }

    /// Block until motion completes using a controller-side primitive.
    async fn wait_native(&self) -> Result<()> {
        anyhow::bail!("Native wait not supported by {}", self.identity())
    }

    /// Release the connection.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Spectral readout
// =============================================================================

/// Pixel encoding of a camera-style sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Mono8,
    Mono12,
}

impl PixelFormat {
    /// Significant bits per pixel.
    #[must_use]
    pub fn bit_depth(&self) -> u8 {
        match self {
            PixelFormat::Mono8 => 8,
            PixelFormat::Mono12 => 12,
        }
    }

    /// Factor that stretches raw values onto the storage container
    /// (8-bit stays 8-bit, 12-bit fills 16-bit).
    #[must_use]
    pub fn storage_scale(&self) -> f64 {
        match self {
            PixelFormat::Mono8 => 1.0,
            PixelFormat::Mono12 => 16.0,
        }
    }

    /// Bits of the storage container.
    #[must_use]
    pub fn container_bits(&self) -> u8 {
        match self {
            PixelFormat::Mono8 => 8,
            PixelFormat::Mono12 => 16,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            PixelFormat::Mono8 => "Mono8",
            PixelFormat::Mono12 => "Mono12",
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What the spectral axis of a sensor is calibrated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralAxis {
    /// Wavelength-calibrated spectrometer; readouts are resampled to frequency.
    Wavelength,
    /// Uncalibrated pixel axis of a camera; readouts are bit-depth scaled.
    Pixel(PixelFormat),
}

/// Raw spectral-readout primitives.
#[async_trait]
pub trait SpectrometerBackend: Send + Sync {
    /// Identification string (model, serial).
    fn identity(&self) -> String;

    fn axis(&self) -> SpectralAxis;

    /// Wavelength of every bin (m), ascending.
    async fn wavelengths(&self) -> Result<Vec<f64>> {
        anyhow::bail!("{} has no wavelength calibration", self.identity())
    }

    /// One readout, one value per bin.
    async fn intensities(&self) -> Result<Vec<f64>>;

    /// Apply an integration time (s). Bounds are checked by the wrapper.
    async fn set_integration_time(&self, seconds: f64) -> Result<()>;

    /// Supported integration time range (s), inclusive.
    fn integration_time_limits(&self) -> (f64, f64);

    /// Whether the hardware can average consecutive scans.
    fn supports_averaging(&self) -> bool {
        false
    }

    /// Apply a scans-to-average count. Only called when
    /// [`supports_averaging`](Self::supports_averaging) is true.
    async fn set_scans_to_average(&self, count: u32) -> Result<()> {
        let _ = count;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono12_fills_sixteen_bits() {
        assert_eq!(PixelFormat::Mono12.bit_depth(), 12);
        assert_eq!(PixelFormat::Mono12.container_bits(), 16);
        assert_eq!(4095.0 * PixelFormat::Mono12.storage_scale(), 65520.0);
        assert_eq!(PixelFormat::Mono8.storage_scale(), 1.0);
    }

    #[test]
    fn pixel_format_display() {
        assert_eq!(PixelFormat::Mono8.to_string(), "Mono8");
    }
}
