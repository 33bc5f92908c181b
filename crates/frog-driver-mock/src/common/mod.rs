//! Common infrastructure for simulated devices.
//!
//! - **mode**: timing modes (Instant, Realistic)
//! - **errors**: per-operation fault injection
//! - **rng**: seeded random number generator

pub mod errors;
pub mod mode;
pub mod rng;

pub use errors::{ErrorConfig, ErrorScenario};
pub use mode::MockMode;
pub use rng::MockRng;
