//! ScanEngine - state machine driving FROG delay scans
//!
//! The engine owns the stage and the spectral sensor for the duration of a
//! scan. Each step moves the stage, waits for it to settle, samples the sensor,
//! subtracts the background and writes one column of the trace.
//!
//! # Cancellation
//!
//! [`ScanEngine::cancel`] sets a shared flag that the worker polls at the top
//! of each step, after the stage settles and after the step's events are
//! sent. A cancelled scan discards its partial trace and ends in
//! [`ScanState::Aborted`].
//!
//! # Usage
//!
//! ```rust,ignore
//! let engine = ScanEngine::new(motor, sensor, CameraOptics::default());
//! let mut events = engine.subscribe();
//!
//! engine.start_scan(ScanConfig::symmetric(11.37e-3, -256e-6, 4e-6)?).await?;
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ScanEvent::Step(n) => println!("step {n}"),
//!         ScanEvent::State(ScanState::Idle) => break,
//!         _ => {}
//!     }
//! }
//! let outcome = engine.wait_scan().await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use frog_core::units::distance_to_delay;
use frog_core::{
    CameraOptics, Delivery, FrogError, FrogResult, LinearMotor, Measurement, MeasurementMeta,
    ScanConfig, SensorMeta, SpectralAxis, SpectralSensor, Spectrogram, Spectrum,
};
use frog_storage::{FrogConfig, MeasurementStore};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::events::{DataEvent, ScanEvent, ScanOutcome, ScanState};
use crate::phase::PhaseRetriever;
use crate::resample;

/// Pause between preview readouts
const PREVIEW_INTERVAL: Duration = Duration::from_millis(10);

/// Event channel capacity
const EVENT_CAPACITY: usize = 1024;

/// Spectral axis fixed for one scan.
enum ScanAxis {
    Wavelength {
        full: Vec<f64>,
        window: Vec<usize>,
    },
    Pixel(frog_core::PixelFormat),
}

/// Result of the stepping loop.
enum Acquired {
    Complete { trace: Spectrogram, axis: ScanAxis },
    Cancelled(usize),
}

struct PreviewWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct Inner {
    motor: Arc<LinearMotor>,
    sensor: Arc<SpectralSensor>,
    optics: CameraOptics,
    state: RwLock<ScanState>,
    events: broadcast::Sender<ScanEvent>,
    cancel: Arc<AtomicBool>,
    background: parking_lot::Mutex<Option<Arc<Vec<f64>>>>,
    measurement: parking_lot::Mutex<Option<Arc<Measurement>>>,
    scan_task: Mutex<Option<JoinHandle<FrogResult<ScanOutcome>>>>,
    preview: Mutex<Option<PreviewWorker>>,
}

/// Orchestrates stage motion and spectral sampling into a FROG trace.
///
/// Cheap to clone; clones share the same devices and state.
#[derive(Clone)]
pub struct ScanEngine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ScanEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanEngine")
            .field("motor", &self.inner.motor.identity())
            .field("sensor", &self.inner.sensor.idn())
            .finish_non_exhaustive()
    }
}

impl ScanEngine {
    /// `optics` is only used for camera sensors.
    pub fn new(motor: Arc<LinearMotor>, sensor: Arc<SpectralSensor>, optics: CameraOptics) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                motor,
                sensor,
                optics,
                state: RwLock::new(ScanState::Idle),
                events,
                cancel: Arc::new(AtomicBool::new(false)),
                background: parking_lot::Mutex::new(None),
                measurement: parking_lot::Mutex::new(None),
                scan_task: Mutex::new(None),
                preview: Mutex::new(None),
            }),
        }
    }

    pub fn motor(&self) -> &Arc<LinearMotor> {
        &self.inner.motor
    }

    pub fn sensor(&self) -> &Arc<SpectralSensor> {
        &self.inner.sensor
    }

    /// Subscribe to state, step and data events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.inner.events.subscribe()
    }

    pub async fn state(&self) -> ScanState {
        *self.inner.state.read().await
    }

    pub async fn is_scanning(&self) -> bool {
        self.state().await != ScanState::Idle
    }

    // =========================================================================
    // Background
    // =========================================================================

    /// Record one readout as the baseline subtracted from every sample.
    pub async fn measure_background(&self) -> FrogResult<()> {
        let state = self.inner.state.read().await;
        if *state != ScanState::Idle {
            return Err(FrogError::ScanInProgress);
        }
        let baseline = self.inner.sensor.intensities().await?;
        drop(state);
        info!(bins = baseline.len(), "Background recorded");
        *self.inner.background.lock() = Some(Arc::new(baseline));
        Ok(())
    }

    /// Reset the baseline to zero.
    pub fn clear_background(&self) {
        *self.inner.background.lock() = None;
        debug!("Background cleared");
    }

    pub fn background(&self) -> Option<Arc<Vec<f64>>> {
        self.inner.background.lock().clone()
    }

    // =========================================================================
    // Scan control
    // =========================================================================

    /// Run a scan to completion and return its outcome.
    ///
    /// The scan runs on its own worker; dropping this future leaves it running
    /// to the end, and [`ScanEngine::cancel`] is the way to stop it early.
    #[instrument(skip(self, config), fields(steps = config.step_count))]
    pub async fn run_scan(&self, config: ScanConfig) -> FrogResult<ScanOutcome> {
        let handle = self.spawn_scan(config).await?;
        join_worker(handle).await
    }

    /// Start a scan on a worker task; see [`ScanEngine::wait_scan`].
    ///
    /// A running preview is stopped first.
    pub async fn start_scan(&self, config: ScanConfig) -> FrogResult<()> {
        let handle = self.spawn_scan(config).await?;
        *self.inner.scan_task.lock().await = Some(handle);
        Ok(())
    }

    /// Wait for the worker started by [`ScanEngine::start_scan`].
    pub async fn wait_scan(&self) -> FrogResult<ScanOutcome> {
        let handle = self
            .inner
            .scan_task
            .lock()
            .await
            .take()
            .ok_or(FrogError::NoScanStarted)?;
        join_worker(handle).await
    }

    /// Request cancellation; the worker stops at its next check.
    pub fn cancel(&self) {
        info!("Scan cancellation requested");
        self.inner.cancel.store(true, Ordering::SeqCst);
    }

    fn cancelled(&self) -> bool {
        self.inner.cancel.load(Ordering::SeqCst)
    }

    async fn spawn_scan(&self, config: ScanConfig) -> FrogResult<JoinHandle<FrogResult<ScanOutcome>>> {
        self.claim(&config).await?;
        self.stop_preview().await;
        let engine = self.clone();
        Ok(tokio::spawn(async move { engine.execute(config).await }))
    }

    /// Move from `Idle` to `Positioning`, or refuse.
    async fn claim(&self, config: &ScanConfig) -> FrogResult<()> {
        let mut state = self.inner.state.write().await;
        if *state != ScanState::Idle {
            return Err(FrogError::ScanInProgress);
        }
        config.validate()?;
        self.inner.cancel.store(false, Ordering::SeqCst);
        *state = ScanState::Positioning;
        drop(state);
        self.emit(ScanEvent::State(ScanState::Positioning));
        Ok(())
    }

    async fn set_state(&self, state: ScanState) {
        *self.inner.state.write().await = state;
        debug!(%state, "Scan state changed");
        self.emit(ScanEvent::State(state));
    }

    fn emit(&self, event: ScanEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    async fn execute(&self, config: ScanConfig) -> FrogResult<ScanOutcome> {
        let started = Local::now();
        let background = self.inner.background.lock().clone();
        *self.inner.measurement.lock() = None;
        info!(
            center = config.center_position,
            start = config.start_position,
            step = config.step_size,
            steps = config.step_count,
            background = background.is_some(),
            "Scan started"
        );

        let result = match self.acquire(&config, background.as_deref().map(Vec::as_slice)).await {
            Ok(Acquired::Complete { trace, axis }) => self
                .package(&config, started, trace, axis)
                .map(|measurement| ScanOutcome::Completed(Arc::new(measurement))),
            Ok(Acquired::Cancelled(steps_completed)) => Ok(ScanOutcome::Aborted { steps_completed }),
            Err(err) => Err(err),
        };

        match result {
            Ok(ScanOutcome::Completed(measurement)) => {
                *self.inner.measurement.lock() = Some(Arc::clone(&measurement));
                info!("Scan completed");
                self.set_state(ScanState::Completed).await;
                self.set_state(ScanState::Idle).await;
                Ok(ScanOutcome::Completed(measurement))
            }
            Ok(aborted) => {
                warn!("Scan aborted, data discarded");
                self.set_state(ScanState::Aborted).await;
                self.set_state(ScanState::Idle).await;
                Ok(aborted)
            }
            Err(err) => {
                error!(error = %err, "Scan failed");
                self.set_state(ScanState::Aborted).await;
                self.set_state(ScanState::Idle).await;
                Err(err)
            }
        }
    }

    async fn settle(&self, config: &ScanConfig) -> FrogResult<()> {
        let motor = &self.inner.motor;
        match config.motion_timeout {
            Some(timeout) => motor.wait_move_finished_within(config.poll_interval, timeout).await,
            None => motor.wait_move_finished(config.poll_interval).await,
        }
    }

    async fn move_to(&self, target: f64) -> FrogResult<()> {
        if let Delivery::Absorbed { fault } = self.inner.motor.move_absolute(target).await? {
            warn!(target, %fault, "Move command may not have reached the stage");
        }
        Ok(())
    }

    async fn acquire(&self, config: &ScanConfig, background: Option<&[f64]>) -> FrogResult<Acquired> {
        let sensor = &self.inner.sensor;
        if let Some(seconds) = config.integration_time {
            sensor.set_integration_time(seconds).await?;
        }
        if let Some(count) = config.scans_to_average {
            sensor.set_scans_to_average(i64::from(count)).await?;
        }

        self.move_to(config.start_target()).await?;
        self.settle(config).await?;

        let axis = match sensor.axis() {
            SpectralAxis::Wavelength => {
                let full = sensor.wavelengths().await?;
                let window = match &config.spectral_window {
                    Some(window) => window.select(&full),
                    None => (0..full.len()).collect(),
                };
                if window.is_empty() {
                    return Err(FrogError::InvalidScanConfig(format!(
                        "spectral window {:?} contains none of the sensor's {} bins",
                        config.spectral_window,
                        full.len()
                    )));
                }
                ScanAxis::Wavelength { full, window }
            }
            SpectralAxis::Pixel(format) => ScanAxis::Pixel(format),
        };

        self.set_state(ScanState::Scanning).await;
        let mut trace: Option<Spectrogram> = None;

        for i in 0..config.step_count {
            if self.cancelled() {
                return Ok(Acquired::Cancelled(i));
            }
            self.move_to(config.step_target(i)).await?;
            self.settle(config).await?;
            if self.cancelled() {
                return Ok(Acquired::Cancelled(i));
            }

            let mut intensities = sensor.intensities().await?;
            if let Some(baseline) = background {
                subtract_baseline(&mut intensities, baseline)?;
            }

            let (column, slice_axis) = match &axis {
                ScanAxis::Wavelength { full, window } => {
                    if intensities.len() != full.len() {
                        return Err(FrogError::ShapeMismatch {
                            expected: full.len(),
                            actual: intensities.len(),
                        });
                    }
                    let column: Vec<f64> = window.iter().map(|&k| intensities[k]).collect();
                    (column, full.clone())
                }
                ScanAxis::Pixel(_) => {
                    let pixels = (0..intensities.len()).map(|p| p as f64).collect();
                    (intensities.clone(), pixels)
                }
            };

            let grid = trace.get_or_insert_with(|| Spectrogram::zeros(column.len(), config.step_count));
            grid.set_column(i, &column)?;
            debug!(step = i + 1, target = config.step_target(i), "Step recorded");

            self.emit(ScanEvent::Data(DataEvent::Slice(Arc::new(Spectrum {
                axis: slice_axis,
                intensities,
            }))));
            self.emit(ScanEvent::Data(DataEvent::Trace(Arc::new(grid.clone()))));
            self.emit(ScanEvent::Step(i + 1));

            if self.cancelled() {
                return Ok(Acquired::Cancelled(i + 1));
            }
        }

        let trace = trace.ok_or(FrogError::NoDataAvailable)?;
        Ok(Acquired::Complete { trace, axis })
    }

    /// Axis conversion and metadata for a finished trace.
    fn package(
        &self,
        config: &ScanConfig,
        started: DateTime<Local>,
        mut trace: Spectrogram,
        axis: ScanAxis,
    ) -> FrogResult<Measurement> {
        let identity = self.inner.sensor.idn().to_string();
        let (image, ccddv, sensor) = match axis {
            ScanAxis::Pixel(pixel_format) => {
                resample::scale_pixel_values(&mut trace, pixel_format);
                let sensor = SensorMeta::Camera {
                    camera: identity,
                    pixel_format,
                };
                (trace, resample::frequency_step_per_pixel(&self.inner.optics), sensor)
            }
            ScanAxis::Wavelength { full, window } => {
                let windowed: Vec<f64> = window.iter().map(|&k| full[k]).collect();
                let image = resample::wavelength_to_frequency(&windowed, &trace)?;
                let sensor = SensorMeta::Spectrometer {
                    spectrometer: identity,
                    span: config.spectral_window.map(|w| w.span),
                    center: config.spectral_window.map(|w| w.center),
                };
                (image, resample::frequency_bin_size(&full), sensor)
            }
        };

        let meta = MeasurementMeta {
            timestamp: started,
            center_position: config.center_position,
            start_position: config.start_position,
            step_number: config.step_count,
            step_size: config.step_size,
            ccddt: distance_to_delay(config.step_size),
            ccddv,
            sensor,
            comment: String::new(),
        };
        Measurement::new(image, meta)
    }

    // =========================================================================
    // Preview
    // =========================================================================

    /// Stream background-subtracted spectra until [`ScanEngine::stop_preview`].
    pub async fn start_preview(&self) -> FrogResult<()> {
        let state = self.inner.state.read().await;
        if *state != ScanState::Idle {
            return Err(FrogError::ScanInProgress);
        }
        let mut preview = self.inner.preview.lock().await;
        if preview.as_ref().is_some_and(|worker| !worker.handle.is_finished()) {
            return Ok(());
        }
        let stop = Arc::new(AtomicBool::new(false));
        let engine = self.clone();
        let flag = Arc::clone(&stop);
        let handle = tokio::spawn(async move { engine.preview_loop(flag).await });
        *preview = Some(PreviewWorker { stop, handle });
        info!("Preview started");
        Ok(())
    }

    pub async fn stop_preview(&self) {
        let worker = self.inner.preview.lock().await.take();
        if let Some(worker) = worker {
            worker.stop.store(true, Ordering::SeqCst);
            if let Err(err) = worker.handle.await {
                warn!(error = %err, "Preview worker ended abnormally");
            }
            info!("Preview stopped");
        }
    }

    pub async fn is_previewing(&self) -> bool {
        self.inner
            .preview
            .lock()
            .await
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    async fn preview_loop(&self, stop: Arc<AtomicBool>) {
        while !stop.load(Ordering::SeqCst) {
            match self.preview_once().await {
                Ok(spectrum) => self.emit(ScanEvent::Data(DataEvent::Slice(Arc::new(spectrum)))),
                Err(err) => {
                    warn!(error = %err, "Preview readout failed, stopping preview");
                    return;
                }
            }
            tokio::time::sleep(PREVIEW_INTERVAL).await;
        }
    }

    async fn preview_once(&self) -> FrogResult<Spectrum> {
        let mut spectrum = self.inner.sensor.spectrum().await?;
        if let Some(baseline) = self.background() {
            subtract_baseline(&mut spectrum.intensities, &baseline)?;
        }
        Ok(spectrum)
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// Last completed (or loaded) measurement.
    pub fn measurement(&self) -> Option<Arc<Measurement>> {
        self.inner.measurement.lock().clone()
    }

    pub fn data_available(&self) -> bool {
        self.inner.measurement.lock().is_some()
    }

    /// Save the current measurement with `comment`, returning its directory.
    pub async fn save_measurement(
        &self,
        store: &MeasurementStore,
        comment: &str,
        config: &FrogConfig,
    ) -> FrogResult<PathBuf> {
        let measurement = self.measurement().ok_or(FrogError::NoDataAvailable)?;
        let annotated = Arc::new(measurement.annotated(comment));
        let store = store.clone();
        let config = config.clone();
        let to_save = Arc::clone(&annotated);
        let path = tokio::task::spawn_blocking(move || store.save(&to_save, &config))
            .await
            .map_err(|err| FrogError::Backend(anyhow::anyhow!("Save worker failed: {err}")))??;
        *self.inner.measurement.lock() = Some(annotated);
        Ok(path)
    }

    /// Load a stored measurement and make it the current one.
    pub async fn load_measurement(&self, store: &MeasurementStore, path: &Path) -> FrogResult<Arc<Measurement>> {
        if self.is_scanning().await {
            return Err(FrogError::ScanInProgress);
        }
        let store = store.clone();
        let path = path.to_path_buf();
        let measurement = tokio::task::spawn_blocking(move || store.load(&path))
            .await
            .map_err(|err| FrogError::Backend(anyhow::anyhow!("Load worker failed: {err}")))??;
        let measurement = Arc::new(measurement);
        *self.inner.measurement.lock() = Some(Arc::clone(&measurement));
        Ok(measurement)
    }

    /// Run `retriever` over the current measurement on a blocking worker.
    pub async fn retrieve_phase<R: PhaseRetriever>(&self, retriever: R) -> FrogResult<R::Output> {
        let measurement = self.measurement().ok_or(FrogError::NoDataAvailable)?;
        let output = tokio::task::spawn_blocking(move || retriever.retrieve(&measurement))
            .await
            .map_err(|err| FrogError::Backend(anyhow::anyhow!("Phase retrieval worker failed: {err}")))??;
        Ok(output)
    }
}

async fn join_worker(handle: JoinHandle<FrogResult<ScanOutcome>>) -> FrogResult<ScanOutcome> {
    handle
        .await
        .map_err(|err| FrogError::Backend(anyhow::anyhow!("Scan worker failed: {err}")))?
}

fn subtract_baseline(intensities: &mut [f64], baseline: &[f64]) -> FrogResult<()> {
    if intensities.len() != baseline.len() {
        return Err(FrogError::ShapeMismatch {
            expected: baseline.len(),
            actual: intensities.len(),
        });
    }
    intensities
        .iter_mut()
        .zip(baseline)
        .for_each(|(value, base)| *value -= base);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_subtraction() {
        let mut values = vec![5.0, 7.0, 9.0];
        subtract_baseline(&mut values, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(values, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn baseline_length_must_match() {
        let mut values = vec![5.0, 7.0];
        assert!(matches!(
            subtract_baseline(&mut values, &[1.0, 2.0, 3.0]),
            Err(FrogError::ShapeMismatch { expected: 3, actual: 2 })
        ));
    }
}
