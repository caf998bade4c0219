//! Immutable event records flowing through the pipeline.
//!
//! MarketObservation -> Signal -> SizedSignal -> Decision -> Fill. Each
//! record is produced once per tick and never mutated afterwards.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketObservation {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl MarketObservation {
    /// Rejects bars that cannot be priced: non-finite or non-positive
    /// prices, negative volume, or a high/low range that does not contain
    /// open and close.
    pub fn check(&self) -> Result<(), String> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err("prices must be finite and positive".into());
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err("volume must be finite and non-negative".into());
        }
        if self.high < self.low {
            return Err(format!("high {} below low {}", self.high, self.low));
        }
        let in_range = |p: f64| p >= self.low && p <= self.high;
        if !in_range(self.open) || !in_range(self.close) {
            return Err("open/close outside high-low range".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    /// Trade side for a directional signal; `Hold` has none.
    pub fn action(self) -> Option<Action> {
        match self {
            Direction::Buy => Some(Action::Buy),
            Direction::Sell => Some(Action::Sell),
            Direction::Hold => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
            Direction::Hold => write!(f, "hold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Buy,
    Sell,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStatus {
    Filled,
    PartiallyFilled,
    Rejected,
}

impl fmt::Display for FillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillStatus::Filled => write!(f, "filled"),
            FillStatus::PartiallyFilled => write!(f, "partially_filled"),
            FillStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Directional view on one observation; `strength` is in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub direction: Direction,
    pub strength: f64,
}

/// Signal sized to a fraction of total portfolio value.
#[derive(Debug, Clone, PartialEq)]
pub struct SizedSignal {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub direction: Direction,
    pub target_allocation: f64,
}

/// Concrete order intent. `quantity` is in asset units and always positive.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub action: Action,
    pub quantity: f64,
}

/// Terminal record of one decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub action: Action,
    pub quantity: f64,
    pub fill_price: f64,
    pub commission: f64,
    pub status: FillStatus,
}

impl Fill {
    /// A rejected fill for `decision`: nothing traded, nothing charged.
    pub fn rejected(decision: &Decision, price: f64) -> Self {
        Fill {
            timestamp: decision.timestamp,
            symbol: decision.symbol.clone(),
            action: decision.action,
            quantity: 0.0,
            fill_price: price,
            commission: 0.0,
            status: FillStatus::Rejected,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.status == FillStatus::Rejected
    }

    /// quantity * fill_price
    pub fn notional(&self) -> f64 {
        self.quantity * self.fill_price
    }
}
