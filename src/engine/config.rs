//! Engine configuration options.

use crate::pricing::ChargeSchedule;

/// Engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Exchange/statutory exit charge rates applied on the close path.
    pub charges: ChargeSchedule,
}

impl EngineConfig {
    /// No exit charges at all. Keeps round-trip arithmetic exact in tests.
    pub fn zero_charges() -> Self {
        Self {
            charges: ChargeSchedule::free(),
        }
    }
}
