//! Simulation driver.
//!
//! Each observation runs through signal -> risk -> decision -> execution ->
//! apply-fill in strict sequence. A stage that emits nothing ends the
//! pipeline for that observation; nothing downstream runs and the portfolio
//! is untouched.
//!
//! SimulationConfig holds every run parameter, built once at startup.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::{info, warn};

use super::error::CmfError;
use super::event::{Fill, MarketObservation};
use super::execution::{ExecutionMode, ExecutionStage};
use super::metrics::{RunStats, Summary};
use super::portfolio::{CashPolicy, PortfolioSnapshot, PortfolioStage, PortfolioState, Valuation};
use super::risk::RiskStage;
use super::signal::{ObservationToSignal, ScorerKind, build_signal_policy};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub base_currency: String,
    pub symbols: Vec<String>,
    pub max_allocation: f64,
    pub commission_rate: f64,
    pub execution_mode: ExecutionMode,
    pub max_status_polls: u32,
    pub cash_policy: CashPolicy,
    pub valuation: Valuation,
    pub scorer: ScorerKind,
    pub signal_seed: Option<u64>,
    pub record_history: bool,
}

/// Where the pipeline stopped for one observation.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    NoSignal,
    NoSizing,
    NoDecision,
    NoFill,
    Rejected(Fill),
    Filled(Fill),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub final_state: PortfolioState,
    pub last_prices: HashMap<String, f64>,
    pub history: Vec<PortfolioSnapshot>,
    pub fills: Vec<Fill>,
    pub summary: Summary,
}

pub struct Simulation {
    signal: Box<dyn ObservationToSignal>,
    risk: RiskStage,
    portfolio: PortfolioStage,
    execution: ExecutionStage,
    base_currency: String,
    record_history: bool,
    history: Vec<PortfolioSnapshot>,
    fills: Vec<Fill>,
    current_tick: Option<NaiveDateTime>,
    stats: RunStats,
}

impl Simulation {
    pub fn new(
        signal: Box<dyn ObservationToSignal>,
        risk: RiskStage,
        portfolio: PortfolioStage,
        execution: ExecutionStage,
    ) -> Self {
        Simulation {
            signal,
            risk,
            portfolio,
            execution,
            base_currency: "USD".to_string(),
            record_history: true,
            history: Vec::new(),
            fills: Vec::new(),
            current_tick: None,
            stats: RunStats::default(),
        }
    }

    /// Wire the four stages from configuration, with the configured signal
    /// scorer and a simulated (or venue-less live) execution stage.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let signal = build_signal_policy(config.scorer, config.signal_seed);
        let execution = ExecutionStage::new(config.execution_mode, config.commission_rate)
            .with_max_status_polls(config.max_status_polls);
        Self::from_config_with(config, signal, execution)
    }

    /// Like [`Simulation::from_config`] with caller-supplied signal policy and execution stage.
    pub fn from_config_with(
        config: &SimulationConfig,
        signal: Box<dyn ObservationToSignal>,
        execution: ExecutionStage,
    ) -> Self {
        let portfolio = PortfolioStage::new(config.initial_capital)
            .with_cash_policy(config.cash_policy)
            .with_valuation(config.valuation)
            .with_commission_rate(config.commission_rate);
        Self::new(signal, RiskStage::new(config.max_allocation), portfolio, execution)
            .with_base_currency(&config.base_currency)
            .with_history(config.record_history)
    }

    pub fn with_base_currency(mut self, currency: &str) -> Self {
        self.base_currency = currency.to_string();
        self
    }

    pub fn with_history(mut self, record: bool) -> Self {
        self.record_history = record;
        self
    }

    pub fn portfolio(&self) -> &PortfolioStage {
        &self.portfolio
    }

    pub fn history(&self) -> &[PortfolioSnapshot] {
        &self.history
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    /// Run one observation through the pipeline.
    ///
    /// Malformed observations are returned as recoverable errors; an
    /// invariant violation from apply-fill is not recoverable.
    pub fn process(&mut self, observation: &MarketObservation) -> Result<TickOutcome, CmfError> {
        observation
            .check()
            .map_err(|reason| CmfError::MalformedObservation {
                symbol: observation.symbol.clone(),
                reason,
            })?;

        let price = observation.close;
        self.portfolio.observe_price(&observation.symbol, price);

        let Some(signal) = self.signal.derive_signal(observation) else {
            return Ok(TickOutcome::NoSignal);
        };
        let Some(sized) = self.risk.assess_risk(&signal) else {
            return Ok(TickOutcome::NoSizing);
        };
        let Some(decision) = self.portfolio.make_decision(&sized, price) else {
            return Ok(TickOutcome::NoDecision);
        };
        let Some(fill) = self.execution.execute_order(&decision, price) else {
            return Ok(TickOutcome::NoFill);
        };

        self.portfolio.apply_fill(&fill)?;
        self.fills.push(fill.clone());

        if fill.is_rejected() {
            Ok(TickOutcome::Rejected(fill))
        } else {
            Ok(TickOutcome::Filled(fill))
        }
    }

    /// Consume `stream` to exhaustion.
    pub fn run<I>(self, stream: I) -> Result<SimulationResult, CmfError>
    where
        I: IntoIterator<Item = Result<MarketObservation, CmfError>>,
    {
        self.run_until(stream, || false)
    }

    /// Consume `stream` until it is exhausted or `stop` returns true.
    /// `stop` is checked before each item is pulled from the stream.
    pub fn run_until<I, F>(mut self, stream: I, mut stop: F) -> Result<SimulationResult, CmfError>
    where
        I: IntoIterator<Item = Result<MarketObservation, CmfError>>,
        F: FnMut() -> bool,
    {
        info!(
            capital = self.portfolio.initial_capital(),
            currency = %self.base_currency,
            mode = %self.execution.mode(),
            "simulation started"
        );

        let mut items = stream.into_iter();
        loop {
            if stop() {
                info!("stop requested, ending simulation");
                break;
            }
            let Some(item) = items.next() else {
                break;
            };

            let observation = match item {
                Ok(observation) => observation,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "skipping observation");
                    self.stats.skipped_observations += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.begin_tick(observation.timestamp);
            self.stats.observations += 1;

            match self.process(&observation) {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "skipping observation");
                    self.stats.skipped_observations += 1;
                }
                Err(e) => return Err(e),
            }
        }
        self.close_tick();

        let result = self.finish();
        info!(
            total_value = result.summary.total_value,
            pnl = result.summary.pnl,
            fills = result.summary.fills,
            "simulation finished"
        );
        Ok(result)
    }

    fn begin_tick(&mut self, timestamp: NaiveDateTime) {
        if self.current_tick != Some(timestamp) {
            self.close_tick();
            self.current_tick = Some(timestamp);
            self.stats.ticks += 1;
        }
    }

    fn close_tick(&mut self) {
        if let Some(timestamp) = self.current_tick.take() {
            if self.record_history {
                self.history.push(self.portfolio.snapshot(timestamp));
            }
        }
    }

    fn finish(self) -> SimulationResult {
        let state = self.portfolio.state().clone();
        let last_prices = self.portfolio.last_prices().clone();
        let summary = Summary::compute(
            &state,
            &last_prices,
            self.portfolio.initial_capital(),
            &self.base_currency,
            &self.history,
            &self.fills,
            self.stats,
        );
        SimulationResult {
            final_state: state,
            last_prices,
            history: self.history,
            fills: self.fills,
            summary,
        }
    }
}
