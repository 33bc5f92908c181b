//! Scan state and progress events.

use frog_core::{Measurement, Spectrogram, Spectrum};
use std::sync::Arc;

/// Scan engine state
///
/// ```text
/// Idle ─▶ Positioning ─▶ Scanning ─▶ Completed ─▶ Idle
///              │              │
///              └──────────────┴────▶ Aborted ───▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Ready for a scan or preview
    Idle,
    /// Moving to the first delay
    Positioning,
    /// Stepping through delays
    Scanning,
    /// Trace processed and stored
    Completed,
    /// Cancelled or failed, nothing stored
    Aborted,
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanState::Idle => write!(f, "idle"),
            ScanState::Positioning => write!(f, "positioning"),
            ScanState::Scanning => write!(f, "scanning"),
            ScanState::Completed => write!(f, "completed"),
            ScanState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Live data for display.
#[derive(Debug, Clone)]
pub enum DataEvent {
    /// Background-subtracted spectrum of the current step or preview
    Slice(Arc<Spectrum>),
    /// Accumulated raw trace so far
    Trace(Arc<Spectrogram>),
}

/// Everything the engine broadcasts to subscribers.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Number of completed steps
    Step(usize),
    Data(DataEvent),
    State(ScanState),
}

/// How a scan ended when no device error occurred.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Completed(Arc<Measurement>),
    /// Cancelled; the partial trace was discarded
    Aborted { steps_completed: usize },
}

impl ScanOutcome {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, ScanOutcome::Completed(_))
    }

    pub fn measurement(&self) -> Option<&Arc<Measurement>> {
        match self {
            ScanOutcome::Completed(measurement) => Some(measurement),
            ScanOutcome::Aborted { .. } => None,
        }
    }
}
