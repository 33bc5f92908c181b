//! FROG scan orchestration
//!
//! [`ScanEngine`] steps a delay stage through a scan, samples a spectral
//! sensor at each delay and assembles the trace. Finished traces are brought
//! onto a uniform frequency axis by [`resample`] before they become a
//! [`frog_core::Measurement`].

pub mod engine;
pub mod events;
pub mod phase;
pub mod resample;

pub use engine::ScanEngine;
pub use events::{DataEvent, ScanEvent, ScanOutcome, ScanState};
pub use phase::PhaseRetriever;
