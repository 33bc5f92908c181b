//! Simulated linear delay stage.

use anyhow::Result;
use async_trait::async_trait;
use frog_core::MotorBackend;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::common::{ErrorConfig, MockMode};

/// Command as received by the simulated controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageCommand {
    MoveTo(f64),
    MoveBy(f64),
    Home,
    Stop,
    Close,
}

#[derive(Debug)]
struct StageState {
    /// Current position (m)
    position: f64,
    moving: bool,
    /// Bumped by every motion command so a superseded move never lands
    generation: u64,
}

/// Simulated delay stage.
///
/// Positions are in meters. In [`MockMode::Realistic`] a move returns as soon
/// as it is accepted and completes in the background after
/// `distance / speed + settle`, so callers have to poll `is_moving`.
///
/// Every command that reaches the simulated controller is recorded, which
/// lets tests assert that an interlock stopped a command before it got here.
///
/// # Example
///
/// ```rust,ignore
/// let stage = MockStage::builder()
///     .initial_position(10e-3)
///     .mode(MockMode::Realistic)
///     .speed(5e-3)
///     .build();
/// ```
#[derive(Clone)]
pub struct MockStage {
    identity: String,
    state: Arc<Mutex<StageState>>,
    /// Travel speed (m/s)
    speed: f64,
    settle: Duration,
    mode: MockMode,
    calibrated: bool,
    native_wait: bool,
    error_config: ErrorConfig,
    commands: Arc<Mutex<Vec<StageCommand>>>,
}

impl std::fmt::Debug for MockStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStage")
            .field("identity", &self.identity)
            .field("mode", &self.mode)
            .field("position", &self.current_position())
            .finish_non_exhaustive()
    }
}

impl MockStage {
    /// Instant stage at 0 m.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MockStageBuilder {
        MockStageBuilder::new()
    }

    /// Position without fault injection, for simulations and assertions.
    pub fn current_position(&self) -> f64 {
        self.state.lock().position
    }

    /// Every command received so far.
    pub fn commands(&self) -> Vec<StageCommand> {
        self.commands.lock().clone()
    }

    /// Targets of all absolute moves received so far.
    pub fn move_targets(&self) -> Vec<f64> {
        self.commands
            .lock()
            .iter()
            .filter_map(|cmd| match cmd {
                StageCommand::MoveTo(target) => Some(*target),
                _ => None,
            })
            .collect()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().clear();
    }

    fn record(&self, command: StageCommand) {
        self.commands.lock().push(command);
    }

    fn motion_duration(&self, distance: f64) -> Duration {
        match self.mode {
            MockMode::Instant => Duration::ZERO,
            MockMode::Realistic => {
                Duration::from_secs_f64(distance.abs() / self.speed) + self.settle
            }
        }
    }

    fn start_motion(&self, target: f64) {
        let mut state = self.state.lock();
        state.generation += 1;
        let duration = self.motion_duration(target - state.position);
        if duration.is_zero() {
            state.position = target;
            state.moving = false;
            return;
        }
        state.moving = true;
        let generation = state.generation;
        drop(state);

        tracing::trace!(stage = %self.identity, target, ?duration, "Motion started");
        let shared = self.state.clone();
        tokio::spawn(async move {
            sleep(duration).await;
            let mut state = shared.lock();
            if state.generation == generation {
                state.position = target;
                state.moving = false;
            }
        });
    }

    async fn wait_idle(&self) {
        loop {
            let moving = self.state.lock().moving;
            if !moving {
                break;
            }
            sleep(Duration::from_millis(1)).await;
        }
    }
}

impl Default for MockStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MotorBackend for MockStage {
    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn is_distance_calibrated(&self) -> bool {
        self.calibrated
    }

    async fn position(&self) -> Result<f64> {
        self.error_config.check(&self.identity, "position")?;
        Ok(self.current_position())
    }

    async fn move_to(&self, target: f64) -> Result<()> {
        self.error_config.check(&self.identity, "move")?;
        self.record(StageCommand::MoveTo(target));
        self.start_motion(target);
        Ok(())
    }

    async fn move_by(&self, delta: f64) -> Result<()> {
        self.error_config.check(&self.identity, "move")?;
        self.record(StageCommand::MoveBy(delta));
        let target = self.current_position() + delta;
        self.start_motion(target);
        Ok(())
    }

    async fn home(&self, blocking: bool) -> Result<()> {
        self.error_config.check(&self.identity, "home")?;
        self.record(StageCommand::Home);
        self.start_motion(0.0);
        if blocking {
            self.wait_idle().await;
        }
        Ok(())
    }

    async fn stop(&self, _blocking: bool) -> Result<()> {
        self.error_config.check(&self.identity, "stop")?;
        self.record(StageCommand::Stop);
        let mut state = self.state.lock();
        state.generation += 1;
        state.moving = false;
        Ok(())
    }

    async fn is_moving(&self) -> Result<bool> {
        self.error_config.check(&self.identity, "is_moving")?;
        Ok(self.state.lock().moving)
    }

    fn has_native_wait(&self) -> bool {
        self.native_wait
    }

    async fn wait_native(&self) -> Result<()> {
        self.error_config.check(&self.identity, "wait")?;
        self.wait_idle().await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(StageCommand::Close);
        Ok(())
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for [`MockStage`].
pub struct MockStageBuilder {
    identity: String,
    initial_position: f64,
    speed: f64,
    settle: Duration,
    mode: MockMode,
    calibrated: bool,
    native_wait: bool,
    error_config: ErrorConfig,
}

impl MockStageBuilder {
    pub fn new() -> Self {
        Self {
            identity: "mock_stage".into(),
            initial_position: 0.0,
            speed: 2e-3,
            settle: Duration::from_millis(5),
            mode: MockMode::Instant,
            calibrated: true,
            native_wait: false,
            error_config: ErrorConfig::none(),
        }
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Starting position (m).
    pub fn initial_position(mut self, position: f64) -> Self {
        self.initial_position = position;
        self
    }

    /// Travel speed (m/s) in realistic mode.
    pub fn speed(mut self, meters_per_second: f64) -> Self {
        self.speed = meters_per_second;
        self
    }

    /// Settling time added to every realistic move.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Simulate a controller configured in steps rather than distance.
    pub fn uncalibrated(mut self) -> Self {
        self.calibrated = false;
        self
    }

    /// Advertise a controller-side blocking wait.
    pub fn native_wait(mut self, enabled: bool) -> Self {
        self.native_wait = enabled;
        self
    }

    pub fn error_config(mut self, config: ErrorConfig) -> Self {
        self.error_config = config;
        self
    }

    pub fn build(self) -> MockStage {
        MockStage {
            identity: self.identity,
            state: Arc::new(Mutex::new(StageState {
                position: self.initial_position,
                moving: false,
                generation: 0,
            })),
            speed: self.speed,
            settle: self.settle,
            mode: self.mode,
            calibrated: self.calibrated,
            native_wait: self.native_wait,
            error_config: self.error_config,
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for MockStageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorScenario;

    #[tokio::test]
    async fn instant_moves_land_immediately() {
        let stage = MockStage::new();
        stage.move_to(1e-3).await.unwrap();
        assert!(!stage.is_moving().await.unwrap());
        assert_eq!(stage.position().await.unwrap(), 1e-3);
        stage.move_by(-0.5e-3).await.unwrap();
        assert!((stage.current_position() - 0.5e-3).abs() < 1e-15);
        assert_eq!(
            stage.commands(),
            vec![StageCommand::MoveTo(1e-3), StageCommand::MoveBy(-0.5e-3)]
        );
    }

    #[tokio::test]
    async fn realistic_moves_complete_in_background() {
        let stage = MockStage::builder()
            .mode(MockMode::Realistic)
            .speed(1e-3)
            .settle(Duration::from_millis(5))
            .build();
        // 10 µm at 1 mm/s is 10 ms plus settle
        stage.move_to(10e-6).await.unwrap();
        assert!(stage.is_moving().await.unwrap());
        assert_eq!(stage.current_position(), 0.0);

        stage.wait_idle().await;
        assert!(!stage.is_moving().await.unwrap());
        assert_eq!(stage.current_position(), 10e-6);
    }

    #[tokio::test]
    async fn stop_cancels_pending_move() {
        let stage = MockStage::builder()
            .mode(MockMode::Realistic)
            .speed(1e-3)
            .build();
        stage.move_to(50e-6).await.unwrap();
        stage.stop(true).await.unwrap();
        assert!(!stage.is_moving().await.unwrap());
        sleep(Duration::from_millis(80)).await;
        assert_eq!(stage.current_position(), 0.0);
    }

    #[tokio::test]
    async fn blocking_home_returns_at_zero() {
        let stage = MockStage::builder()
            .initial_position(20e-6)
            .mode(MockMode::Realistic)
            .speed(1e-3)
            .build();
        stage.home(true).await.unwrap();
        assert_eq!(stage.current_position(), 0.0);
    }

    #[tokio::test]
    async fn injected_fault_skips_command_log() {
        let stage = MockStage::builder()
            .error_config(ErrorConfig::scenario(ErrorScenario::Timeout { operation: "move" }))
            .build();
        assert!(stage.move_to(1e-3).await.is_err());
        assert!(stage.commands().is_empty());
    }
}
