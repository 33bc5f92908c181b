//! Fault injection for simulated devices.
//!
//! Each backend call names an operation (`"move"`, `"position"`,
//! `"is_moving"`, `"read"`, ...) and asks [`ErrorConfig::check`] whether it
//! should fail. Failures are structured [`DriverError`]s so the device
//! wrappers see the same error shape a real driver would produce.

use super::rng::MockRng;
use frog_core::{DriverError, DriverErrorKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Scripted failure.
#[derive(Debug, Clone)]
pub enum ErrorScenario {
    /// Let `count` calls of `operation` succeed, fail every later one.
    FailAfterN {
        operation: &'static str,
        count: u32,
    },
    /// Fail exactly the `nth` call (1-based) of `operation`, then recover.
    FailOnce { operation: &'static str, nth: u32 },
    /// Every call of `operation` times out.
    Timeout { operation: &'static str },
    /// First call of anything loses the link; all later calls fail.
    CommunicationLoss,
}

#[derive(Default, Debug)]
struct ErrorState {
    operation_counts: HashMap<&'static str, u32>,
    communication_lost: bool,
}

/// Failure configuration shared by clones of one simulated device.
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    failure_rates: Arc<HashMap<&'static str, f64>>,
    scenarios: Arc<Vec<ErrorScenario>>,
    rng: Arc<MockRng>,
    state: Arc<Mutex<ErrorState>>,
}

impl ErrorConfig {
    /// No injected failures.
    pub fn none() -> Self {
        Self::build(HashMap::new(), Vec::new(), None)
    }

    /// Every operation fails with probability `rate`.
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        Self::build(HashMap::from([("*", rate)]), Vec::new(), seed)
    }

    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self::build(HashMap::new(), scenarios, None)
    }

    /// Per-operation failure probabilities.
    pub fn with_rates(rates: HashMap<&'static str, f64>, seed: Option<u64>) -> Self {
        Self::build(rates, Vec::new(), seed)
    }

    fn build(
        rates: HashMap<&'static str, f64>,
        scenarios: Vec<ErrorScenario>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            failure_rates: Arc::new(rates),
            scenarios: Arc::new(scenarios),
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Decide whether this call of `operation` on `driver` fails.
    pub fn check(&self, driver: &str, operation: &'static str) -> Result<(), DriverError> {
        let mut state = self.state.lock();

        if state.communication_lost {
            return Err(DriverError::new(
                driver,
                DriverErrorKind::Communication,
                "Communication lost",
            ));
        }

        let call = {
            let counter = state.operation_counts.entry(operation).or_insert(0);
            *counter += 1;
            *counter
        };

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN { operation: op, count } if *op == operation => {
                    if call > *count {
                        return Err(DriverError::new(
                            driver,
                            DriverErrorKind::Hardware,
                            format!("Injected '{operation}' failure after {count} calls"),
                        ));
                    }
                }
                ErrorScenario::FailOnce { operation: op, nth } if *op == operation => {
                    if call == *nth {
                        return Err(DriverError::new(
                            driver,
                            DriverErrorKind::Communication,
                            format!("Injected transient '{operation}' failure"),
                        ));
                    }
                }
                ErrorScenario::Timeout { operation: op } if *op == operation => {
                    return Err(DriverError::new(
                        driver,
                        DriverErrorKind::Timeout,
                        format!("Operation '{operation}' timed out"),
                    ));
                }
                ErrorScenario::CommunicationLoss => {
                    state.communication_lost = true;
                    return Err(DriverError::new(
                        driver,
                        DriverErrorKind::Communication,
                        "Communication lost",
                    ));
                }
                _ => {}
            }
        }

        let rate = self
            .failure_rates
            .get(operation)
            .or_else(|| self.failure_rates.get("*"))
            .copied()
            .unwrap_or(0.0);
        if self.rng.should_fail(rate) {
            return Err(DriverError::new(
                driver,
                DriverErrorKind::Hardware,
                format!("Random failure on operation '{operation}'"),
            ));
        }

        Ok(())
    }

    /// Clear counters and recover lost communication.
    pub fn reset(&self) {
        *self.state.lock() = ErrorState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_errors() {
        let config = ErrorConfig::none();
        for _ in 0..100 {
            assert!(config.check("mock", "read").is_ok());
        }
    }

    #[test]
    fn fail_after_n() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: "read",
            count: 3,
        });
        for _ in 0..3 {
            assert!(config.check("mock", "read").is_ok());
        }
        assert!(config.check("mock", "read").is_err());
        assert!(config.check("mock", "move").is_ok());

        config.reset();
        assert!(config.check("mock", "read").is_ok());
    }

    #[test]
    fn fail_once_recovers() {
        let config = ErrorConfig::scenario(ErrorScenario::FailOnce {
            operation: "position",
            nth: 2,
        });
        assert!(config.check("mock", "position").is_ok());
        let err = config.check("mock", "position").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Communication);
        assert!(config.check("mock", "position").is_ok());
    }

    #[test]
    fn timeout_is_tagged() {
        let config = ErrorConfig::scenario(ErrorScenario::Timeout { operation: "move" });
        let err = config.check("mock_stage", "move").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Timeout);
        assert_eq!(err.driver, "mock_stage");
    }

    #[test]
    fn communication_loss_is_sticky() {
        let config = ErrorConfig::scenario(ErrorScenario::CommunicationLoss);
        assert!(config.check("mock", "read").is_err());
        assert!(config.check("mock", "move").is_err());
    }

    #[test]
    fn seeded_random_failures() {
        let config = ErrorConfig::random_failures_seeded(0.5, Some(42));
        let failures = (0..1000)
            .filter(|_| config.check("mock", "read").is_err())
            .count();
        assert!(failures > 400 && failures < 600, "got {failures} failures");
    }
}
