//! End-of-run summary record.

use std::collections::{BTreeMap, HashMap};

use super::event::Fill;
use super::portfolio::{PortfolioSnapshot, PortfolioState};

/// Counters gathered by the driver while consuming the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: usize,
    pub observations: usize,
    pub skipped_observations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub initial_capital: f64,
    pub base_currency: String,
    pub final_cash: f64,
    pub holdings: BTreeMap<String, f64>,
    pub total_value: f64,
    pub pnl: f64,
    /// P&L as a percentage of initial capital.
    pub pnl_pct: f64,
    /// Largest peak-to-trough fall of the per-tick total value, as a fraction.
    pub max_drawdown: f64,
    pub max_drawdown_ticks: usize,
    pub fills: usize,
    pub rejected_fills: usize,
    pub total_commission: f64,
    pub ticks: usize,
    pub observations: usize,
    pub skipped_observations: usize,
}

impl Summary {
    pub fn compute(
        state: &PortfolioState,
        last_prices: &HashMap<String, f64>,
        initial_capital: f64,
        base_currency: &str,
        history: &[PortfolioSnapshot],
        fills: &[Fill],
        stats: RunStats,
    ) -> Self {
        let total_value = state.value_at(last_prices);
        let pnl = total_value - initial_capital;
        let pnl_pct = if initial_capital > 0.0 {
            pnl / initial_capital * 100.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_ticks) = compute_drawdown(history);

        let rejected_fills = fills.iter().filter(|f| f.is_rejected()).count();
        let total_commission = fills.iter().map(|f| f.commission).sum();

        Summary {
            initial_capital,
            base_currency: base_currency.to_string(),
            final_cash: state.cash,
            holdings: state.holdings.clone(),
            total_value,
            pnl,
            pnl_pct,
            max_drawdown,
            max_drawdown_ticks,
            fills: fills.len() - rejected_fills,
            rejected_fills,
            total_commission,
            ticks: stats.ticks,
            observations: stats.observations,
            skipped_observations: stats.skipped_observations,
        }
    }
}

fn compute_drawdown(history: &[PortfolioSnapshot]) -> (f64, usize) {
    let Some(first) = history.first() else {
        return (0.0, 0);
    };

    let mut peak = first.total_value;
    let mut max_dd = 0.0_f64;
    let mut max_dd_ticks = 0usize;
    let mut current_dd_ticks = 0usize;

    for point in history {
        if point.total_value > peak {
            peak = point.total_value;
            current_dd_ticks = 0;
        } else if peak > 0.0 && point.total_value < peak {
            let dd = (peak - point.total_value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_ticks += 1;
            if current_dd_ticks > max_dd_ticks {
                max_dd_ticks = current_dd_ticks;
            }
        }
    }

    (max_dd, max_dd_ticks)
}
