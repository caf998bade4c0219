//! Risk stage: sizes a signal as a fraction of portfolio value.

use tracing::debug;

use super::event::{Direction, Signal, SizedSignal};

pub const DEFAULT_MAX_ALLOCATION: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskStage {
    max_allocation: f64,
}

impl Default for RiskStage {
    fn default() -> Self {
        RiskStage {
            max_allocation: DEFAULT_MAX_ALLOCATION,
        }
    }
}

impl RiskStage {
    pub fn new(max_allocation: f64) -> Self {
        RiskStage { max_allocation }
    }

    pub fn max_allocation(&self) -> f64 {
        self.max_allocation
    }

    /// target = min(max_allocation * strength, max_allocation).
    ///
    /// Hold signals are not sized.
    pub fn assess_risk(&self, signal: &Signal) -> Option<SizedSignal> {
        if signal.direction == Direction::Hold {
            return None;
        }

        let strength = signal.strength.clamp(0.0, 1.0);
        let proposed = self.max_allocation * strength;
        let adjusted = proposed.min(self.max_allocation);

        debug!(
            symbol = %signal.symbol,
            target_allocation = adjusted,
            "signal sized"
        );

        Some(SizedSignal {
            timestamp: signal.timestamp,
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            target_allocation: adjusted,
        })
    }
}
