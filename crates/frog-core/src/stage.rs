//! Linear delay-stage wrapper with interlocks and persisted time zero.
//!
//! [`LinearMotor`] is the only way the rest of the system talks to a stage.
//! It owns:
//!
//! - **Travel limits**: unset until configured; every move target is checked
//!   before the backend sees the command.
//! - **Fault policy**: backend faults on motion commands and status queries
//!   are absorbed (logged, last good value reused) or propagated, per
//!   [`FaultPolicy`].
//! - **Time zero**: loaded from the [`CalibrationStore`] on first use, seeded
//!   with the current position when absent.
//!
//! # Example
//!
//! ```rust,ignore
//! let motor = LinearMotor::new(backend, CalibrationStore::new(dir))?
//!     .with_travel_limits(0.0, 20e-3)?;
//!
//! motor.move_absolute(11.114e-3).await?;
//! motor.wait_move_finished(Duration::from_millis(50)).await?;
//! let delay = motor.position_as_delay().await?;
//! ```

use crate::capabilities::MotorBackend;
use crate::error::{FrogError, FrogResult};
use crate::fault::{Delivery, FaultPolicy, Reading};
use crate::limits::TravelLimits;
use crate::time_zero::{CalibrationStore, TimeZero};
use crate::units::distance_to_delay;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Uniform linear-stage contract over any [`MotorBackend`].
pub struct LinearMotor {
    backend: Arc<dyn MotorBackend>,
    identity: String,
    policy: FaultPolicy,
    limits: RwLock<Option<TravelLimits>>,
    /// Last position the backend reported successfully
    last_position: Mutex<Option<f64>>,
    calibration: CalibrationStore,
    time_zero: tokio::sync::Mutex<TimeZero>,
    closed: AtomicBool,
}

impl std::fmt::Debug for LinearMotor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearMotor")
            .field("identity", &self.identity)
            .field("policy", &self.policy)
            .field("limits", &*self.limits.read())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl LinearMotor {
    /// Wrap a backend. Fails with `StageNotCalibrated` when the backend does
    /// not report positions as distances.
    pub fn new(backend: Arc<dyn MotorBackend>, calibration: CalibrationStore) -> FrogResult<Self> {
        let identity = backend.identity();
        if !backend.is_distance_calibrated() {
            return Err(FrogError::StageNotCalibrated(identity));
        }
        Ok(Self {
            backend,
            identity,
            policy: FaultPolicy::default(),
            limits: RwLock::new(None),
            last_position: Mutex::new(None),
            calibration,
            time_zero: tokio::sync::Mutex::new(TimeZero::Unloaded),
            closed: AtomicBool::new(false),
        })
    }

    /// Replace the fault policy (default: [`FaultPolicy::Absorb`]).
    #[must_use]
    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Configure travel limits while building the wrapper.
    pub fn with_travel_limits(self, lower: f64, upper: f64) -> FrogResult<Self> {
        self.set_travel_limits(lower, upper)?;
        Ok(self)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.policy
    }

    // =========================================================================
    // Interlocks
    // =========================================================================

    /// Configured travel limits.
    pub fn travel_limits(&self) -> FrogResult<TravelLimits> {
        (*self.limits.read()).ok_or(FrogError::StageLimitsNotSet)
    }

    /// Set travel limits (m).
    pub fn set_travel_limits(&self, lower: f64, upper: f64) -> FrogResult<()> {
        let limits = TravelLimits::new(lower, upper)?;
        *self.limits.write() = Some(limits);
        debug!(motor = %self.identity, lower, upper, "Travel limits set");
        Ok(())
    }

    fn check_target(&self, target: f64) -> FrogResult<()> {
        let limits = self.travel_limits()?;
        limits.check(target).inspect_err(|_| {
            warn!(
                motor = %self.identity,
                target,
                lower = limits.lower,
                upper = limits.upper,
                "Move rejected by travel limits"
            );
        })
    }

    fn ensure_open(&self) -> FrogResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(FrogError::DeviceClosed(self.identity.clone()))
        } else {
            Ok(())
        }
    }

    fn contain(&self, operation: &'static str, result: anyhow::Result<()>) -> FrogResult<Delivery> {
        match result {
            Ok(()) => Ok(Delivery::Delivered),
            Err(err) => match self.policy {
                FaultPolicy::Strict => Err(err.into()),
                FaultPolicy::Absorb => {
                    warn!(motor = %self.identity, operation, error = %err, "Backend fault absorbed");
                    Ok(Delivery::Absorbed {
                        fault: err.to_string(),
                    })
                }
            },
        }
    }

    // =========================================================================
    // Position & motion
    // =========================================================================

    /// Position with its freshness.
    ///
    /// Under `Absorb`, a failing backend yields the last good position as
    /// [`Reading::Stale`]. Without any prior good reading the fault propagates.
    pub async fn read_position(&self) -> FrogResult<Reading<f64>> {
        self.ensure_open()?;
        match self.backend.position().await {
            Ok(position) => {
                *self.last_position.lock() = Some(position);
                Ok(Reading::Fresh(position))
            }
            Err(err) => {
                let cached = *self.last_position.lock();
                match (self.policy, cached) {
                    (FaultPolicy::Absorb, Some(value)) => {
                        warn!(motor = %self.identity, error = %err, cached = value, "Position query failed, using cached value");
                        Ok(Reading::Stale {
                            value,
                            fault: err.to_string(),
                        })
                    }
                    _ => Err(err.into()),
                }
            }
        }
    }

    /// Best-effort position (m). May be stale under fault; see [`Self::read_position`].
    pub async fn position(&self) -> FrogResult<f64> {
        self.read_position().await.map(Reading::into_value)
    }

    /// Move to an absolute position (m).
    #[instrument(skip(self), fields(motor = %self.identity), err)]
    pub async fn move_absolute(&self, target: f64) -> FrogResult<Delivery> {
        self.ensure_open()?;
        self.check_target(target)?;
        let result = self.backend.move_to(target).await;
        self.contain("move_absolute", result)
    }

    /// Move by `delta` (m) relative to the current position.
    #[instrument(skip(self), fields(motor = %self.identity), err)]
    pub async fn move_by(&self, delta: f64) -> FrogResult<Delivery> {
        self.ensure_open()?;
        // Limits are checked before the position query so an unconfigured
        // stage never reaches the backend.
        self.travel_limits()?;
        let current = self.position().await?;
        self.check_target(current + delta)?;
        let result = self.backend.move_by(delta).await;
        self.contain("move_by", result)
    }

    /// Run the homing sequence.
    #[instrument(skip(self), fields(motor = %self.identity), err)]
    pub async fn home(&self, blocking: bool) -> FrogResult<Delivery> {
        self.ensure_open()?;
        let result = self.backend.home(blocking).await;
        self.contain("home", result)
    }

    /// Halt motion.
    #[instrument(skip(self), fields(motor = %self.identity), err)]
    pub async fn stop(&self, blocking: bool) -> FrogResult<Delivery> {
        self.ensure_open()?;
        let result = self.backend.stop(blocking).await;
        self.contain("stop", result)
    }

    /// Whether the stage is moving. A failed query reports `true` under `Absorb`.
    pub async fn is_in_motion(&self) -> FrogResult<bool> {
        self.ensure_open()?;
        match self.backend.is_moving().await {
            Ok(moving) => Ok(moving),
            Err(err) => match self.policy {
                FaultPolicy::Strict => Err(err.into()),
                FaultPolicy::Absorb => {
                    warn!(motor = %self.identity, error = %err, "Motion query failed, assuming in motion");
                    Ok(true)
                }
            },
        }
    }

    /// Block until motion completes.
    ///
    /// Uses the backend's native wait when available, otherwise polls
    /// [`Self::is_in_motion`] every `poll_interval`. There is no timeout; a
    /// backend that never settles blocks the caller.
    pub async fn wait_move_finished(&self, poll_interval: Duration) -> FrogResult<()> {
        self.ensure_open()?;
        if self.backend.has_native_wait() {
            match self.backend.wait_native().await {
                Ok(()) => return Ok(()),
                Err(err) if self.policy == FaultPolicy::Absorb => {
                    warn!(motor = %self.identity, error = %err, "Native wait failed, falling back to polling");
                }
                Err(err) => return Err(err.into()),
            }
        }
        while self.is_in_motion().await? {
            tokio::time::sleep(poll_interval).await;
        }
        Ok(())
    }

    /// [`Self::wait_move_finished`] bounded by `timeout`.
    pub async fn wait_move_finished_within(
        &self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> FrogResult<()> {
        tokio::time::timeout(timeout, self.wait_move_finished(poll_interval))
            .await
            .map_err(|_| FrogError::MotionTimeout(timeout))?
    }

    /// Release the backend. Later calls are no-ops.
    pub async fn close(&self) -> FrogResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(motor = %self.identity, "Closing stage");
        self.backend.close().await?;
        Ok(())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Time zero
    // =========================================================================

    /// Stage position of zero delay (m).
    ///
    /// Read from the calibration store on first access. If nothing is stored
    /// the current position becomes time zero and is persisted.
    pub async fn time_zero(&self) -> FrogResult<f64> {
        let mut state = self.time_zero.lock().await;
        if let TimeZero::Loaded(position) = *state {
            return Ok(position);
        }
        let position = match self.calibration.load_time_zero(&self.identity)? {
            Some(stored) => stored,
            None => {
                let current = self.position().await?;
                self.calibration.store_time_zero(&self.identity, current)?;
                current
            }
        };
        *state = TimeZero::Loaded(position);
        Ok(position)
    }

    /// Overwrite time zero and persist it immediately.
    pub async fn set_time_zero(&self, position: f64) -> FrogResult<()> {
        let mut state = self.time_zero.lock().await;
        self.calibration.store_time_zero(&self.identity, position)?;
        *state = TimeZero::Loaded(position);
        Ok(())
    }

    /// Optical delay (s) of the current position relative to time zero.
    pub async fn position_as_delay(&self) -> FrogResult<f64> {
        let zero = self.time_zero().await?;
        let position = self.position().await?;
        Ok(distance_to_delay(position - zero))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tracing_test::traced_test;

    /// Minimal backend that records calls and fails on demand.
    #[derive(Default)]
    struct ScriptedStage {
        position: Mutex<f64>,
        fail: AtomicBool,
        calls: AtomicUsize,
        uncalibrated: bool,
    }

    impl ScriptedStage {
        fn failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn call(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                bail!("controller did not answer");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MotorBackend for ScriptedStage {
        fn identity(&self) -> String {
            "scripted".into()
        }

        fn is_distance_calibrated(&self) -> bool {
            !self.uncalibrated
        }

        async fn position(&self) -> Result<f64> {
            self.call()?;
            Ok(*self.position.lock())
        }

        async fn move_to(&self, target: f64) -> Result<()> {
            self.call()?;
            *self.position.lock() = target;
            Ok(())
        }

        async fn move_by(&self, delta: f64) -> Result<()> {
            self.call()?;
            *self.position.lock() += delta;
            Ok(())
        }

        async fn home(&self, _blocking: bool) -> Result<()> {
            self.call()
        }

        async fn stop(&self, _blocking: bool) -> Result<()> {
            self.call()
        }

        async fn is_moving(&self) -> Result<bool> {
            self.call()?;
            Ok(false)
        }
    }

    fn motor(backend: Arc<ScriptedStage>) -> (LinearMotor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let motor = LinearMotor::new(backend, CalibrationStore::new(dir.path())).unwrap();
        (motor, dir)
    }

    #[tokio::test]
    async fn move_without_limits_is_rejected_before_backend() {
        let backend = Arc::new(ScriptedStage::default());
        let (motor, _dir) = motor(backend.clone());

        assert!(matches!(
            motor.move_absolute(1e-3).await,
            Err(FrogError::StageLimitsNotSet)
        ));
        assert!(matches!(
            motor.move_by(1e-3).await,
            Err(FrogError::StageLimitsNotSet)
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn relative_move_checks_resulting_position() {
        let backend = Arc::new(ScriptedStage::default());
        *backend.position.lock() = 19e-3;
        let (motor, _dir) = motor(backend.clone());
        motor.set_travel_limits(0.0, 20e-3).unwrap();

        let err = motor.move_by(2e-3).await.unwrap_err();
        assert!(matches!(err, FrogError::StageOutOfBounds { .. }));
        // Only the position query reached the backend
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        assert!(motor.move_by(-1e-3).await.unwrap().is_delivered());
        assert!((*backend.position.lock() - 18e-3).abs() < 1e-12);
    }

    #[tokio::test]
    async fn uncalibrated_backend_is_refused() {
        let backend = Arc::new(ScriptedStage {
            uncalibrated: true,
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let err = LinearMotor::new(backend, CalibrationStore::new(dir.path())).unwrap_err();
        assert!(matches!(err, FrogError::StageNotCalibrated(id) if id == "scripted"));
    }

    #[traced_test]
    #[tokio::test]
    async fn absorbed_faults_are_logged_and_reported() {
        let backend = Arc::new(ScriptedStage::default());
        let (motor, _dir) = motor(backend.clone());
        motor.set_travel_limits(0.0, 20e-3).unwrap();
        motor.move_absolute(5e-3).await.unwrap();
        assert_eq!(motor.position().await.unwrap(), 5e-3);

        backend.failing(true);
        let delivery = motor.move_absolute(6e-3).await.unwrap();
        assert!(matches!(delivery, Delivery::Absorbed { .. }));

        let reading = motor.read_position().await.unwrap();
        assert_eq!(reading.fault(), Some("controller did not answer"));
        assert_eq!(*reading.value(), 5e-3);

        assert!(motor.is_in_motion().await.unwrap());
        assert!(logs_contain("Backend fault absorbed"));
    }

    #[tokio::test]
    async fn strict_policy_propagates() {
        let backend = Arc::new(ScriptedStage::default());
        let (motor, _dir) = motor(backend.clone());
        let motor = motor.with_fault_policy(FaultPolicy::Strict);
        motor.set_travel_limits(0.0, 20e-3).unwrap();

        backend.failing(true);
        assert!(matches!(
            motor.move_absolute(1e-3).await,
            Err(FrogError::Backend(_))
        ));
        assert!(motor.is_in_motion().await.is_err());
        assert!(motor.position().await.is_err());
    }

    #[tokio::test]
    async fn position_fault_without_cache_propagates() {
        let backend = Arc::new(ScriptedStage::default());
        let (motor, _dir) = motor(backend.clone());
        backend.failing(true);
        assert!(motor.position().await.is_err());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_further_use() {
        let backend = Arc::new(ScriptedStage::default());
        let (motor, _dir) = motor(backend);
        motor.close().await.unwrap();
        motor.close().await.unwrap();
        assert!(motor.is_closed());
        assert!(matches!(
            motor.position().await,
            Err(FrogError::DeviceClosed(_))
        ));
    }

    #[tokio::test]
    async fn time_zero_seeds_from_position_and_delay_follows() {
        let backend = Arc::new(ScriptedStage::default());
        *backend.position.lock() = 10e-3;
        let (motor, dir) = motor(backend.clone());

        assert_eq!(motor.time_zero().await.unwrap(), 10e-3);
        let store = CalibrationStore::new(dir.path());
        assert_eq!(store.load_time_zero("scripted").unwrap(), Some(10e-3));

        *backend.position.lock() = 10e-3 + 3e-6;
        let delay = motor.position_as_delay().await.unwrap();
        assert!((delay - distance_to_delay(3e-6)).abs() < 1e-22);

        motor.set_time_zero(11e-3).await.unwrap();
        assert_eq!(motor.time_zero().await.unwrap(), 11e-3);
        assert_eq!(store.load_time_zero("scripted").unwrap(), Some(11e-3));
    }

    #[tokio::test]
    async fn bounded_wait_times_out_on_stuck_query() {
        let backend = Arc::new(ScriptedStage::default());
        let (motor, _dir) = motor(backend.clone());
        backend.failing(true);
        let err = motor
            .wait_move_finished_within(Duration::from_millis(1), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, FrogError::MotionTimeout(_)));
    }
}
