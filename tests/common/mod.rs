#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use cmftrader::domain::backtest::{Simulation, SimulationConfig};
use cmftrader::domain::error::CmfError;
use cmftrader::domain::event::{Action, MarketObservation};
use cmftrader::domain::execution::{ExecutionMode, ExecutionStage};
use cmftrader::domain::portfolio::{CashPolicy, Valuation};
use cmftrader::domain::signal::{CandleSignal, FixedStrength, ScorerKind};
use cmftrader::ports::data_port::{DataPort, ObservationStream};
use cmftrader::ports::execution_port::{ExecutionVenue, OrderHandle, VenueStatus};
use std::collections::{HashMap, VecDeque};

/// In-memory data port; observations are emitted in insertion order.
pub struct MockDataPort {
    pub observations: Vec<Result<MarketObservation, String>>,
    pub open_error: Option<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            observations: Vec::new(),
            open_error: None,
        }
    }

    pub fn with_obs(mut self, obs: MarketObservation) -> Self {
        self.observations.push(Ok(obs));
        self
    }

    pub fn with_bad_item(mut self, reason: &str) -> Self {
        self.observations.push(Err(reason.to_string()));
        self
    }

    pub fn with_open_error(mut self, reason: &str) -> Self {
        self.open_error = Some(reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn stream(
        &self,
        symbols: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<ObservationStream<'_>, CmfError> {
        if let Some(reason) = &self.open_error {
            return Err(CmfError::DataSource {
                reason: reason.clone(),
            });
        }
        let symbols = symbols.to_vec();
        Ok(Box::new(self.observations.iter().filter_map(
            move |item| match item {
                Ok(o) => {
                    let in_range = o.timestamp.date() >= start_date
                        && o.timestamp.date() <= end_date
                        && symbols.contains(&o.symbol);
                    in_range.then(|| Ok(o.clone()))
                }
                Err(reason) => Some(Err(CmfError::MalformedObservation {
                    symbol: "?".into(),
                    reason: reason.clone(),
                })),
            },
        )))
    }
}

/// Venue that answers `query_status` from a script, one entry per poll.
pub struct ScriptedVenue {
    pub submit_error: Option<String>,
    pub statuses: VecDeque<Result<VenueStatus, CmfError>>,
    pub submitted: usize,
}

impl ScriptedVenue {
    pub fn new(statuses: Vec<Result<VenueStatus, CmfError>>) -> Self {
        Self {
            submit_error: None,
            statuses: statuses.into(),
            submitted: 0,
        }
    }

    pub fn failing_submit(reason: &str) -> Self {
        Self {
            submit_error: Some(reason.to_string()),
            statuses: VecDeque::new(),
            submitted: 0,
        }
    }
}

impl ExecutionVenue for ScriptedVenue {
    fn submit_order(
        &mut self,
        symbol: &str,
        _side: Action,
        _quantity: f64,
        _limit_price: Option<f64>,
    ) -> Result<OrderHandle, CmfError> {
        if let Some(reason) = &self.submit_error {
            return Err(CmfError::Venue {
                reason: reason.clone(),
            });
        }
        self.submitted += 1;
        Ok(OrderHandle(format!("{symbol}-{}", self.submitted)))
    }

    fn query_status(&mut self, _handle: &OrderHandle) -> Result<VenueStatus, CmfError> {
        self.statuses.pop_front().unwrap_or(Ok(VenueStatus::Pending))
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn ts(s: &str) -> NaiveDateTime {
    date(s).and_hms_opt(0, 0, 0).unwrap()
}

/// Bar whose high/low just bracket open and close.
pub fn make_obs(symbol: &str, day: &str, open: f64, close: f64) -> MarketObservation {
    MarketObservation {
        timestamp: ts(day),
        symbol: symbol.to_string(),
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        volume: 1_000.0,
    }
}

pub fn sample_config() -> SimulationConfig {
    SimulationConfig {
        start_date: date("2024-01-01"),
        end_date: date("2024-12-31"),
        initial_capital: 10_000.0,
        base_currency: "USD".to_string(),
        symbols: vec!["BTC".to_string()],
        max_allocation: 0.25,
        commission_rate: 0.001,
        execution_mode: ExecutionMode::Simulate,
        max_status_polls: 3,
        cash_policy: CashPolicy::Drop,
        valuation: Valuation::SingleAsset,
        scorer: ScorerKind::Random,
        signal_seed: Some(7),
        record_history: true,
    }
}

/// Simulation whose signal strength is always `strength`.
pub fn fixed_sim(config: &SimulationConfig, strength: f64) -> Simulation {
    let execution = ExecutionStage::new(config.execution_mode, config.commission_rate)
        .with_max_status_polls(config.max_status_polls);
    Simulation::from_config_with(
        config,
        Box::new(CandleSignal::new(FixedStrength(strength))),
        execution,
    )
}

/// Live-mode simulation routing orders to `venue`.
pub fn venue_sim(config: &SimulationConfig, strength: f64, venue: ScriptedVenue) -> Simulation {
    let execution = ExecutionStage::new(ExecutionMode::Live, config.commission_rate)
        .with_max_status_polls(config.max_status_polls)
        .with_venue(Box::new(venue));
    Simulation::from_config_with(
        config,
        Box::new(CandleSignal::new(FixedStrength(strength))),
        execution,
    )
}

pub fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
}
