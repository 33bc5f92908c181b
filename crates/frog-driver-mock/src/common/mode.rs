//! Timing modes for simulated devices.

/// How a simulated device spends time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    /// Commands complete immediately. Deterministic, for unit tests.
    #[default]
    Instant,
    /// Motion takes time proportional to distance and completes in the
    /// background, so status polling is exercised.
    Realistic,
}

impl MockMode {
    #[must_use]
    pub fn is_instant(&self) -> bool {
        matches!(self, MockMode::Instant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_instant() {
        assert_eq!(MockMode::default(), MockMode::Instant);
        assert!(!MockMode::Realistic.is_instant());
    }
}
