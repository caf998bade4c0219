//! Execution stage: decision to fill.
//!
//! `simulate` fills every decision in full at the observed price and charges
//! a proportional commission. `live` routes through an [`ExecutionVenue`]
//! when one is attached; venue failures become rejected fills and never
//! escape this stage.

use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use super::error::CmfError;
use super::event::{Decision, Fill, FillStatus};
use crate::ports::execution_port::{ExecutionVenue, OrderHandle, VenueStatus};

pub const DEFAULT_COMMISSION_RATE: f64 = 0.001;
pub const DEFAULT_MAX_STATUS_POLLS: u32 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Simulate,
    Live,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simulate" => Ok(ExecutionMode::Simulate),
            "live" => Ok(ExecutionMode::Live),
            other => Err(format!("unknown execution mode '{other}' (expected simulate or live)")),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Simulate => write!(f, "simulate"),
            ExecutionMode::Live => write!(f, "live"),
        }
    }
}

/// commission = trade_value * rate
pub fn calculate_commission(trade_value: f64, rate: f64) -> f64 {
    trade_value * rate
}

pub struct ExecutionStage {
    mode: ExecutionMode,
    commission_rate: f64,
    max_status_polls: u32,
    venue: Option<Box<dyn ExecutionVenue>>,
    warned_missing_venue: bool,
}

impl ExecutionStage {
    pub fn new(mode: ExecutionMode, commission_rate: f64) -> Self {
        ExecutionStage {
            mode,
            commission_rate,
            max_status_polls: DEFAULT_MAX_STATUS_POLLS,
            venue: None,
            warned_missing_venue: false,
        }
    }

    pub fn simulated(commission_rate: f64) -> Self {
        Self::new(ExecutionMode::Simulate, commission_rate)
    }

    pub fn with_venue(mut self, venue: Box<dyn ExecutionVenue>) -> Self {
        self.venue = Some(venue);
        self
    }

    pub fn with_max_status_polls(mut self, polls: u32) -> Self {
        self.max_status_polls = polls.max(1);
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn commission_rate(&self) -> f64 {
        self.commission_rate
    }

    /// Execute `decision` at the observed `price`.
    ///
    /// Returns `None` only when there is nothing executable (non-positive
    /// quantity or price).
    pub fn execute_order(&mut self, decision: &Decision, price: f64) -> Option<Fill> {
        if !decision.quantity.is_finite() || decision.quantity <= 0.0 {
            return None;
        }
        if !price.is_finite() || price <= 0.0 {
            return None;
        }

        if self.mode == ExecutionMode::Live {
            if self.venue.is_some() {
                return Some(match self.route(decision) {
                    Ok(fill) => fill,
                    Err(e) => {
                        warn!(symbol = %decision.symbol, error = %e, "order rejected");
                        Fill::rejected(decision, price)
                    }
                });
            }
            if !self.warned_missing_venue {
                warn!("live execution requested without a venue, simulating fills");
                self.warned_missing_venue = true;
            }
        }

        Some(build_fill(
            decision,
            decision.quantity,
            price,
            FillStatus::Filled,
            self.commission_rate,
        ))
    }

    fn route(&mut self, decision: &Decision) -> Result<Fill, CmfError> {
        let polls = self.max_status_polls;
        let rate = self.commission_rate;
        let venue = self.venue.as_mut().ok_or_else(|| CmfError::Venue {
            reason: "no venue attached".into(),
        })?;

        let handle: OrderHandle =
            venue.submit_order(&decision.symbol, decision.action, decision.quantity, None)?;

        for _ in 0..polls {
            match venue.query_status(&handle)? {
                VenueStatus::Pending => continue,
                VenueStatus::Filled { price } => {
                    let price = check_venue_price(price)?;
                    let quantity = decision.quantity;
                    return Ok(build_fill(decision, quantity, price, FillStatus::Filled, rate));
                }
                VenueStatus::PartiallyFilled { quantity, price } => {
                    let price = check_venue_price(price)?;
                    if !quantity.is_finite() || quantity <= 0.0 {
                        return Err(CmfError::Venue {
                            reason: format!("order {} filled non-positive quantity {quantity}", handle.0),
                        });
                    }
                    let quantity = quantity.min(decision.quantity);
                    return Ok(build_fill(
                        decision,
                        quantity,
                        price,
                        FillStatus::PartiallyFilled,
                        rate,
                    ));
                }
                VenueStatus::Rejected { reason } => {
                    return Err(CmfError::Venue { reason });
                }
            }
        }

        Err(CmfError::Venue {
            reason: format!("order {} still pending after {polls} status checks", handle.0),
        })
    }
}

fn build_fill(
    decision: &Decision,
    quantity: f64,
    price: f64,
    status: FillStatus,
    commission_rate: f64,
) -> Fill {
    let commission = calculate_commission(quantity * price, commission_rate);
    debug!(
        symbol = %decision.symbol,
        action = %decision.action,
        quantity,
        price,
        commission,
        %status,
        "order executed"
    );
    Fill {
        timestamp: decision.timestamp,
        symbol: decision.symbol.clone(),
        action: decision.action,
        quantity,
        fill_price: price,
        commission,
        status,
    }
}

fn check_venue_price(price: f64) -> Result<f64, CmfError> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(CmfError::Venue {
            reason: format!("venue reported invalid fill price {price}"),
        })
    }
}
