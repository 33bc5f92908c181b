//! Stage travel limits.

use crate::error::{FrogError, FrogResult};
use serde::{Deserialize, Serialize};

/// Closed interval `[lower, upper]` of allowed stage positions (m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelLimits {
    pub lower: f64,
    pub upper: f64,
}

impl TravelLimits {
    /// Build limits, rejecting `lower > upper` and non-finite bounds.
    pub fn new(lower: f64, upper: f64) -> FrogResult<Self> {
        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(FrogError::InvalidTravelLimits { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    #[must_use]
    pub fn contains(&self, position: f64) -> bool {
        position >= self.lower && position <= self.upper
    }

    /// Ok when `target` is inside the interval, otherwise `StageOutOfBounds`.
    pub fn check(&self, target: f64) -> FrogResult<()> {
        if self.contains(target) {
            Ok(())
        } else {
            Err(FrogError::StageOutOfBounds {
                target,
                lower: self.lower,
                upper: self.upper,
            })
        }
    }
}
