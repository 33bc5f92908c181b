//! Fault containment for motion backends.
//!
//! Stage controllers occasionally drop a command or fail a status query and
//! recover on the next poll. Rather than catching and ignoring these faults
//! invisibly, the motor wrapper applies a named [`FaultPolicy`] and reports
//! what happened:
//!
//! - queries return a [`Reading`], either fresh or a stale cached value plus
//!   the fault that prevented a fresh one;
//! - commands return a [`Delivery`], either delivered or absorbed.
//!
//! Interlock violations are never subject to the policy.

use serde::{Deserialize, Serialize};

/// How a device wrapper treats a failing backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Log the fault, keep going with the last known value.
    #[default]
    Absorb,
    /// Propagate every backend fault to the caller.
    Strict,
}

/// Result of a fault-contained query.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading<T> {
    /// Value just returned by the backend.
    Fresh(T),
    /// Last good value; the backend query failed.
    Stale {
        /// Cached value.
        value: T,
        /// Description of the backend fault.
        fault: String,
    },
}

impl<T> Reading<T> {
    /// The value regardless of freshness.
    pub fn value(&self) -> &T {
        match self {
            Reading::Fresh(value) | Reading::Stale { value, .. } => value,
        }
    }

    /// Consume the reading, keeping only the value.
    pub fn into_value(self) -> T {
        match self {
            Reading::Fresh(value) | Reading::Stale { value, .. } => value,
        }
    }

    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self, Reading::Fresh(_))
    }

    /// The absorbed fault, if any.
    pub fn fault(&self) -> Option<&str> {
        match self {
            Reading::Fresh(_) => None,
            Reading::Stale { fault, .. } => Some(fault),
        }
    }
}

/// Result of a fault-contained command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The backend accepted the command.
    Delivered,
    /// The backend failed; the fault was logged and swallowed.
    Absorbed {
        /// Description of the backend fault.
        fault: String,
    },
}

impl Delivery {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_reading_keeps_value_and_fault() {
        let reading = Reading::Stale {
            value: 1.5e-3,
            fault: "link down".to_string(),
        };
        assert!(!reading.is_fresh());
        assert_eq!(reading.fault(), Some("link down"));
        assert_eq!(reading.into_value(), 1.5e-3);
    }

    #[test]
    fn default_policy_absorbs() {
        assert_eq!(FaultPolicy::default(), FaultPolicy::Absorb);
    }
}
