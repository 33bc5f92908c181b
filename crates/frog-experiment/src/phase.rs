//! Hook for phase retrieval over a stored trace.

use frog_core::Measurement;

/// Phase retrieval algorithm run against a completed measurement.
///
/// Implementations are CPU-bound; the engine runs them on a blocking worker.
/// `ccddt` and `ccddv` in the measurement metadata give the delay and
/// frequency steps of the trace.
pub trait PhaseRetriever: Send + 'static {
    type Output: Send + 'static;

    fn retrieve(self, measurement: &Measurement) -> anyhow::Result<Self::Output>;
}

impl<F, T> PhaseRetriever for F
where
    F: FnOnce(&Measurement) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn retrieve(self, measurement: &Measurement) -> anyhow::Result<T> {
        self(measurement)
    }
}
