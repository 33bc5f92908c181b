//! Error types for FROG acquisition.
//!
//! `FrogError` is the single error type returned by the device wrappers, the
//! scan orchestrator and, through a conversion, the persistence layer.
//!
//! ## Error Hierarchy
//!
//! - **Interlocks** (`StageLimitsNotSet`, `StageOutOfBounds`,
//!   `StageNotCalibrated`, `IntegrationOutOfRange`, `InvalidAverageCount`, ...):
//!   raised before any side-effecting hardware call. Values are never clamped.
//! - **Backend** (`Driver`, `Backend`, `MotionTimeout`, `DeviceClosed`):
//!   failures reported by a driver. Under the default fault policy the motor
//!   wrapper absorbs these for motion commands; see [`crate::fault`].
//! - **Orchestration** (`NoDataAvailable`, `ScanInProgress`,
//!   `InvalidScanConfig`, `ShapeMismatch`, `InvalidMeasurement`).
//! - **Persistence** (`Persistence`, `Calibration`, `Io`).
//!
//! Cancelling a scan is not an error; the orchestrator reports it as a
//! terminal outcome.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Category of a structured driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    Communication,
    Hardware,
    Timeout,
    InvalidParameter,
    Unknown,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
            DriverErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Failure reported by a backend, tagged with the backend that raised it.
#[derive(Error, Debug, Clone)]
#[error("Driver '{driver}' {kind} error: {message}")]
pub struct DriverError {
    pub driver: String,
    pub kind: DriverErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn new(driver: impl Into<String>, kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Convenience alias for results using [`FrogError`].
pub type FrogResult<T> = std::result::Result<T, FrogError>;

// =============================================================================
// FrogError
// =============================================================================

/// Primary error type for acquisition, device control and persistence.
#[derive(Error, Debug)]
pub enum FrogError {
    /// A move was requested before travel limits were configured.
    ///
    /// **Recovery Strategy**: call `LinearMotor::set_travel_limits` first.
    #[error("Stage travel limits have not been set")]
    StageLimitsNotSet,

    /// A move target lies outside the configured travel limits.
    ///
    /// The backend was not contacted.
    #[error("Stage target {target} m outside travel limits [{lower}, {upper}] m")]
    StageOutOfBounds { target: f64, lower: f64, upper: f64 },

    /// The backend cannot express positions as distances.
    ///
    /// Raised when the motor wrapper is constructed. Carries the backend identity.
    #[error("Stage '{0}' has no distance calibration")]
    StageNotCalibrated(String),

    /// Travel limits with `lower > upper` or non-finite bounds.
    #[error("Invalid travel limits [{lower}, {upper}] m")]
    InvalidTravelLimits { lower: f64, upper: f64 },

    /// Integration time outside the sensor's supported range.
    #[error("Integration time {requested} s outside [{min}, {max}] s")]
    IntegrationOutOfRange { requested: f64, min: f64, max: f64 },

    /// Integration time read before it was ever set.
    #[error("Integration time has not been set")]
    IntegrationTimeNotSet,

    /// Non-positive scans-to-average count.
    #[error("Scans to average must be positive, got {0}")]
    InvalidAverageCount(i64),

    /// Averaging requested on a sensor that cannot average, under the
    /// rejecting averaging policy.
    #[error("Spectral sensor '{0}' does not support averaging")]
    AveragingUnsupported(String),

    /// Motion did not finish within an explicitly requested bound.
    #[error("Stage motion did not finish within {0:?}")]
    MotionTimeout(Duration),

    /// Operation on a device wrapper after `close()`.
    #[error("Device '{0}' is closed")]
    DeviceClosed(String),

    /// Structured driver error.
    #[error("{0}")]
    Driver(DriverError),

    /// Unstructured backend error.
    #[error(transparent)]
    Backend(anyhow::Error),

    /// Phase retrieval or save requested before any completed scan.
    #[error("No measurement data available")]
    NoDataAvailable,

    /// Scan start, background capture or preview refused while a scan runs.
    #[error("A scan is already in progress")]
    ScanInProgress,

    /// Waiting on a scan worker that was never started.
    #[error("No scan has been started")]
    NoScanStarted,

    /// Scan parameters that cannot produce a measurement.
    #[error("Invalid scan configuration: {0}")]
    InvalidScanConfig(String),

    /// Two arrays that must line up element-wise do not.
    #[error("Shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A measurement whose image and metadata disagree.
    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// The time-zero store could not be read or written.
    #[error("Calibration store error: {0}")]
    Calibration(String),

    /// The persistence layer failed to save or load.
    #[error("Persistence error: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrogError {
    /// True for errors raised by a software interlock before touching hardware.
    #[must_use]
    pub fn is_interlock(&self) -> bool {
        matches!(
            self,
            FrogError::StageLimitsNotSet
                | FrogError::StageOutOfBounds { .. }
                | FrogError::StageNotCalibrated(_)
                | FrogError::InvalidTravelLimits { .. }
                | FrogError::IntegrationOutOfRange { .. }
                | FrogError::InvalidAverageCount(_)
                | FrogError::AveragingUnsupported(_)
        )
    }
}

impl From<DriverError> for FrogError {
    fn from(err: DriverError) -> Self {
        FrogError::Driver(err)
    }
}

impl From<anyhow::Error> for FrogError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<DriverError>() {
            Ok(driver) => FrogError::Driver(driver),
            Err(err) => FrogError::Backend(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_display() {
        let err = FrogError::Driver(DriverError::new(
            "mock_stage",
            DriverErrorKind::Communication,
            "link down",
        ));
        assert!(err
            .to_string()
            .contains("Driver 'mock_stage' communication error"));
    }

    #[test]
    fn anyhow_wrapping_driver_error_is_unpacked() {
        let source = anyhow::Error::new(DriverError::new(
            "mock_spectrometer",
            DriverErrorKind::Timeout,
            "read timed out",
        ));
        match FrogError::from(source) {
            FrogError::Driver(driver) => assert_eq!(driver.kind, DriverErrorKind::Timeout),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn plain_anyhow_is_backend() {
        let err = FrogError::from(anyhow::anyhow!("vendor SDK returned 0x13"));
        assert!(matches!(err, FrogError::Backend(_)));
        assert_eq!(err.to_string(), "vendor SDK returned 0x13");
    }

    #[test]
    fn interlock_classification() {
        assert!(FrogError::StageLimitsNotSet.is_interlock());
        assert!(FrogError::InvalidAverageCount(0).is_interlock());
        assert!(!FrogError::NoDataAvailable.is_interlock());
        assert!(!FrogError::MotionTimeout(Duration::from_secs(1)).is_interlock());
    }
}
