//! Portfolio state and the portfolio stage.
//!
//! [`PortfolioStage::make_decision`] turns a sized signal into a concrete
//! quantity under the no-short and no-margin constraints;
//! [`PortfolioStage::apply_fill`] is the only code path that mutates
//! [`PortfolioState`].

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::{debug, error, info};

use super::error::CmfError;
use super::event::{Action, Decision, Direction, Fill, SizedSignal};
use super::execution::calculate_commission;

/// Holdings at or below this are treated as flat.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Cash rounding tolerance applied after a fill.
pub const CASH_EPSILON: f64 = 1e-9;

/// Upper bound on one-ulp reductions when clipping a buy to cash.
const MAX_CLIP_STEPS: u32 = 64;

/// Largest f64 below a positive finite `x`.
fn next_below(x: f64) -> f64 {
    f64::from_bits(x.to_bits() - 1)
}

/// What to do with a buy the portfolio cannot afford in full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CashPolicy {
    /// Drop the decision entirely.
    #[default]
    Drop,
    /// Scale the quantity down to what cash covers.
    Clip,
}

impl FromStr for CashPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(CashPolicy::Drop),
            "clip" => Ok(CashPolicy::Clip),
            other => Err(format!("unknown cash policy '{other}' (expected drop or clip)")),
        }
    }
}

/// How total value is computed when sizing a decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Valuation {
    /// cash + held(symbol) * price; other holdings are ignored.
    #[default]
    SingleAsset,
    /// cash + every holding at its last known price.
    MarkToMarket,
}

impl FromStr for Valuation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single_asset" => Ok(Valuation::SingleAsset),
            "mark_to_market" => Ok(Valuation::MarkToMarket),
            other => Err(format!(
                "unknown valuation '{other}' (expected single_asset or mark_to_market)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub cash: f64,
    pub holdings: BTreeMap<String, f64>,
    pub total_value: f64,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        PortfolioState {
            cash: initial_capital,
            holdings: BTreeMap::new(),
            total_value: initial_capital,
        }
    }

    pub fn quantity(&self, symbol: &str) -> f64 {
        self.holdings.get(symbol).copied().unwrap_or(0.0)
    }

    /// Sum of holdings valued at `prices`; symbols without a price count as zero.
    pub fn holdings_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.holdings
            .iter()
            .map(|(symbol, qty)| qty * prices.get(symbol).copied().unwrap_or(0.0))
            .sum()
    }

    pub fn value_at(&self, prices: &HashMap<String, f64>) -> f64 {
        self.cash + self.holdings_value(prices)
    }
}

/// Per-tick audit record of the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub timestamp: NaiveDateTime,
    pub cash: f64,
    pub holdings_value: f64,
    pub total_value: f64,
}

#[derive(Debug, Clone)]
pub struct PortfolioStage {
    state: PortfolioState,
    initial_capital: f64,
    last_prices: HashMap<String, f64>,
    cash_policy: CashPolicy,
    valuation: Valuation,
    commission_rate: f64,
}

impl PortfolioStage {
    pub fn new(initial_capital: f64) -> Self {
        PortfolioStage {
            state: PortfolioState::new(initial_capital),
            initial_capital,
            last_prices: HashMap::new(),
            cash_policy: CashPolicy::default(),
            valuation: Valuation::default(),
            commission_rate: 0.0,
        }
    }

    pub fn with_cash_policy(mut self, policy: CashPolicy) -> Self {
        self.cash_policy = policy;
        self
    }

    pub fn with_valuation(mut self, valuation: Valuation) -> Self {
        self.valuation = valuation;
        self
    }

    /// Commission rate reserved on top of the notional when checking a buy.
    pub fn with_commission_rate(mut self, rate: f64) -> Self {
        self.commission_rate = rate;
        self
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn last_prices(&self) -> &HashMap<String, f64> {
        &self.last_prices
    }

    /// Record the latest market price for `symbol`. Does not touch the ledger.
    pub fn observe_price(&mut self, symbol: &str, price: f64) {
        self.last_prices.insert(symbol.to_string(), price);
    }

    /// cash + all holdings at last known prices, with `price` for `symbol`.
    fn mark_to_market(&self, symbol: &str, price: f64) -> f64 {
        let others: f64 = self
            .state
            .holdings
            .iter()
            .filter(|(s, _)| s.as_str() != symbol)
            .map(|(s, qty)| qty * self.last_prices.get(s).copied().unwrap_or(0.0))
            .sum();
        self.state.cash + others + self.state.quantity(symbol) * price
    }

    /// Size a concrete order for `sized` at `price`.
    ///
    /// Buys top the position up to the target value and must be affordable
    /// (notional plus commission within cash). Sells liquidate the whole
    /// holding. Anything else emits nothing.
    pub fn make_decision(&self, sized: &SizedSignal, price: f64) -> Option<Decision> {
        if !price.is_finite() || price <= 0.0 {
            return None;
        }

        let held = self.state.quantity(&sized.symbol);
        let total_value = match self.valuation {
            Valuation::SingleAsset => self.state.cash + held * price,
            Valuation::MarkToMarket => self.mark_to_market(&sized.symbol, price),
        };
        let target_value = total_value * sized.target_allocation;
        let target_quantity = target_value / price;

        let (action, quantity) = match sized.direction {
            Direction::Buy if held * price < target_value => {
                let proposed = target_quantity - held;
                (Action::Buy, self.affordable(&sized.symbol, proposed, price)?)
            }
            Direction::Sell if held > QUANTITY_EPSILON => (Action::Sell, held),
            _ => return None,
        };

        debug!(
            symbol = %sized.symbol,
            %action,
            quantity,
            price,
            "decision made"
        );

        Some(Decision {
            timestamp: sized.timestamp,
            symbol: sized.symbol.clone(),
            action,
            quantity,
        })
    }

    /// Cash a buy of `quantity` at `price` debits, computed the way the
    /// execution stage prices it.
    fn buy_cost(&self, quantity: f64, price: f64) -> f64 {
        let notional = quantity * price;
        notional + calculate_commission(notional, self.commission_rate)
    }

    fn affordable(&self, symbol: &str, proposed: f64, price: f64) -> Option<f64> {
        if proposed <= QUANTITY_EPSILON {
            return None;
        }
        let cash = self.state.cash;
        if self.buy_cost(proposed, price) <= cash {
            return Some(proposed);
        }
        match self.cash_policy {
            CashPolicy::Drop => {
                debug!(symbol, proposed, cash, "buy dropped: insufficient cash");
                None
            }
            CashPolicy::Clip => {
                let mut clipped = cash / (price * (1.0 + self.commission_rate));
                let mut steps = 0;
                while clipped > QUANTITY_EPSILON && self.buy_cost(clipped, price) > cash {
                    if steps == MAX_CLIP_STEPS {
                        debug!(symbol, clipped, cash, "buy dropped: clip did not converge");
                        return None;
                    }
                    clipped = next_below(clipped);
                    steps += 1;
                }
                (clipped > QUANTITY_EPSILON).then_some(clipped)
            }
        }
    }

    /// Apply a fill to the ledger.
    ///
    /// Rejected fills leave the state untouched. A fill that would make cash
    /// or a holding negative is an invariant violation: the state is left
    /// as it was and the error carries the attempted mutation.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<(), CmfError> {
        if fill.is_rejected() {
            debug!(symbol = %fill.symbol, "rejected fill, portfolio unchanged");
            return Ok(());
        }

        let violation = |reason: String| {
            error!(symbol = %fill.symbol, timestamp = %fill.timestamp, %reason, "invariant violation");
            CmfError::InvariantViolation {
                timestamp: fill.timestamp,
                symbol: fill.symbol.clone(),
                reason,
            }
        };

        if !fill.quantity.is_finite() || fill.quantity <= 0.0 {
            return Err(violation(format!("fill quantity {} is not positive", fill.quantity)));
        }
        if !fill.fill_price.is_finite() || fill.fill_price <= 0.0 {
            return Err(violation(format!("fill price {} is not positive", fill.fill_price)));
        }
        if !fill.commission.is_finite() || fill.commission < 0.0 {
            return Err(violation(format!("commission {} is negative", fill.commission)));
        }

        let held = self.state.quantity(&fill.symbol);
        let notional = fill.notional();

        let (cash, remaining) = match fill.action {
            Action::Buy => (self.state.cash - (notional + fill.commission), held + fill.quantity),
            Action::Sell => (self.state.cash + notional - fill.commission, held - fill.quantity),
        };

        if cash < -CASH_EPSILON {
            return Err(violation(format!(
                "{} {} @ {} would leave cash at {:.2}",
                fill.action, fill.quantity, fill.fill_price, cash
            )));
        }
        if remaining < -QUANTITY_EPSILON {
            return Err(violation(format!(
                "selling {} with {} held would leave {}",
                fill.quantity, held, remaining
            )));
        }

        self.state.cash = cash.max(0.0);
        if remaining <= QUANTITY_EPSILON {
            self.state.holdings.remove(&fill.symbol);
        } else {
            self.state.holdings.insert(fill.symbol.clone(), remaining);
        }
        self.last_prices
            .entry(fill.symbol.clone())
            .or_insert(fill.fill_price);
        self.state.total_value = self.state.value_at(&self.last_prices);

        info!(
            symbol = %fill.symbol,
            action = %fill.action,
            quantity = fill.quantity,
            price = fill.fill_price,
            commission = fill.commission,
            cash = self.state.cash,
            "fill applied"
        );
        Ok(())
    }

    /// Current valuation at last known prices.
    pub fn snapshot(&self, timestamp: NaiveDateTime) -> PortfolioSnapshot {
        let holdings_value = self.state.holdings_value(&self.last_prices);
        PortfolioSnapshot {
            timestamp,
            cash: self.state.cash,
            holdings_value,
            total_value: self.state.cash + holdings_value,
        }
    }
}
