//! Configuration validation.
//!
//! Validates every config key before a run starts. Malformed values are
//! errors here even though the raw [`ConfigPort`] getters fall back to
//! defaults.

use crate::domain::error::CmfError;
use crate::domain::execution::ExecutionMode;
use crate::domain::portfolio::{CashPolicy, Valuation};
use crate::domain::signal::ScorerKind;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), CmfError> {
    validate_trading_mode(config)?;
    validate_initial_capital(config)?;
    validate_base_currency(config)?;
    validate_symbols(config)?;
    validate_dates(config)?;
    validate_max_allocation(config)?;
    validate_execution(config)?;
    validate_portfolio(config)?;
    validate_signal(config)?;
    validate_data(config)?;
    Ok(())
}

fn invalid(key: &str, reason: impl Into<String>) -> CmfError {
    CmfError::ConfigInvalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parse `key` as a number; `None` when the key is absent.
pub fn number(config: &dyn ConfigPort, key: &str) -> Result<Option<f64>, CmfError> {
    match config.get_string(key) {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(key, format!("'{s}' is not a number"))),
    }
}

/// Parse `key` as a non-negative integer; `None` when the key is absent.
pub fn unsigned(config: &dyn ConfigPort, key: &str) -> Result<Option<u64>, CmfError> {
    match config.get_string(key) {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| invalid(key, format!("'{s}' is not a non-negative integer"))),
    }
}

/// Parse `key` with `FromStr`, falling back to `T::default()` when absent.
pub fn choice<T>(config: &dyn ConfigPort, key: &str) -> Result<T, CmfError>
where
    T: FromStr<Err = String> + Default,
{
    match config.get_string(key) {
        None => Ok(T::default()),
        Some(s) => s.parse::<T>().map_err(|reason| invalid(key, reason)),
    }
}

pub fn parse_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, CmfError> {
    let value = config.get_string(key).ok_or_else(|| CmfError::ConfigMissing {
        key: key.to_string(),
    })?;
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| invalid(key, "invalid date format, expected YYYY-MM-DD"))
}

/// Split a comma-separated symbol list, trimming and upper-casing entries.
/// Duplicates keep their first position.
pub fn parse_symbols(input: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for s in input.split(',').map(|s| s.trim().to_uppercase()) {
        if !s.is_empty() && !symbols.contains(&s) {
            symbols.push(s);
        }
    }
    symbols
}

/// `backtest.symbols`, falling back to the single `backtest.symbol`.
pub fn resolve_symbols(config: &dyn ConfigPort) -> Vec<String> {
    config
        .get_string("backtest.symbols")
        .or_else(|| config.get_string("backtest.symbol"))
        .map(|s| parse_symbols(&s))
        .unwrap_or_default()
}

fn validate_trading_mode(config: &dyn ConfigPort) -> Result<(), CmfError> {
    match config.get_string("trading.mode") {
        None => Ok(()),
        Some(mode) => match mode.trim().to_lowercase().as_str() {
            "backtest" | "live" => Ok(()),
            other => Err(invalid(
                "trading.mode",
                format!("unknown trading mode '{other}' (expected backtest or live)"),
            )),
        },
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), CmfError> {
    if let Some(value) = number(config, "backtest.initial_capital")? {
        if value <= 0.0 {
            return Err(invalid(
                "backtest.initial_capital",
                "initial_capital must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_base_currency(config: &dyn ConfigPort) -> Result<(), CmfError> {
    match config.get_string("backtest.base_currency") {
        Some(s) if s.trim().is_empty() => Err(invalid(
            "backtest.base_currency",
            "base_currency must not be empty",
        )),
        _ => Ok(()),
    }
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), CmfError> {
    if resolve_symbols(config).is_empty() {
        return Err(CmfError::ConfigMissing {
            key: "backtest.symbols".to_string(),
        });
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), CmfError> {
    let start_date = parse_date(config, "backtest.start_date")?;
    let end_date = parse_date(config, "backtest.end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "backtest.start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

fn validate_max_allocation(config: &dyn ConfigPort) -> Result<(), CmfError> {
    if let Some(value) = number(config, "risk.max_position_allocation")? {
        if value <= 0.0 || value > 1.0 {
            return Err(invalid(
                "risk.max_position_allocation",
                "max_position_allocation must be in (0, 1]",
            ));
        }
    }
    Ok(())
}

fn validate_execution(config: &dyn ConfigPort) -> Result<(), CmfError> {
    choice::<ExecutionMode>(config, "execution.mode")?;

    if let Some(rate) = number(config, "execution.commission_rate")? {
        if !(0.0..1.0).contains(&rate) {
            return Err(invalid(
                "execution.commission_rate",
                "commission_rate must be in [0, 1)",
            ));
        }
    }

    if let Some(polls) = unsigned(config, "execution.max_status_polls")? {
        if polls == 0 || polls > u64::from(u32::MAX) {
            return Err(invalid(
                "execution.max_status_polls",
                "max_status_polls must be at least 1",
            ));
        }
    }
    Ok(())
}

fn validate_portfolio(config: &dyn ConfigPort) -> Result<(), CmfError> {
    choice::<CashPolicy>(config, "portfolio.cash_policy")?;
    choice::<Valuation>(config, "portfolio.valuation")?;
    Ok(())
}

fn validate_signal(config: &dyn ConfigPort) -> Result<(), CmfError> {
    choice::<ScorerKind>(config, "signal.scorer")?;
    unsigned(config, "signal.seed")?;
    Ok(())
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), CmfError> {
    match config.get_string("data.source") {
        None => {}
        Some(source) => match source.trim().to_lowercase().as_str() {
            "csv" | "mock" => {}
            other => {
                return Err(invalid(
                    "data.source",
                    format!("unknown data source '{other}' (expected csv or mock)"),
                ));
            }
        },
    }

    if let Some(price) = number(config, "data.mock_start_price")? {
        if price <= 0.0 {
            return Err(invalid(
                "data.mock_start_price",
                "mock_start_price must be positive",
            ));
        }
    }
    if let Some(vol) = number(config, "data.mock_volatility")? {
        if !(0.0..1.0).contains(&vol) {
            return Err(invalid(
                "data.mock_volatility",
                "mock_volatility must be in [0, 1)",
            ));
        }
    }
    unsigned(config, "data.mock_seed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<String, String>);

    impl MapConfig {
        fn valid() -> Self {
            let mut m = HashMap::new();
            m.insert("backtest.initial_capital".into(), "10000".into());
            m.insert("backtest.symbols".into(), "btc, eth".into());
            m.insert("backtest.start_date".into(), "2024-01-01".into());
            m.insert("backtest.end_date".into(), "2024-06-30".into());
            MapConfig(m)
        }

        fn with(mut self, key: &str, value: &str) -> Self {
            self.0.insert(key.into(), value.into());
            self
        }

        fn without(mut self, key: &str) -> Self {
            self.0.remove(key);
            self
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }
        fn get_bool(&self, key: &str, default: bool) -> bool {
            self.0.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        }
    }

    fn invalid_key(result: Result<(), CmfError>) -> String {
        match result {
            Err(CmfError::ConfigInvalid { key, .. }) => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn valid_minimal_config() {
        assert!(validate_config(&MapConfig::valid()).is_ok());
    }

    #[test]
    fn missing_symbols() {
        let config = MapConfig::valid().without("backtest.symbols");
        assert!(matches!(
            validate_config(&config),
            Err(CmfError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn single_symbol_fallback() {
        let config = MapConfig::valid()
            .without("backtest.symbols")
            .with("backtest.symbol", "sol");
        assert!(validate_config(&config).is_ok());
        assert_eq!(resolve_symbols(&config), vec!["SOL"]);
    }

    #[test]
    fn missing_start_date() {
        let config = MapConfig::valid().without("backtest.start_date");
        match validate_config(&config) {
            Err(CmfError::ConfigMissing { key }) => assert_eq!(key, "backtest.start_date"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reversed_dates() {
        let config = MapConfig::valid().with("backtest.end_date", "2023-12-31");
        assert_eq!(invalid_key(validate_config(&config)), "backtest.start_date");
    }

    #[test]
    fn malformed_date() {
        let config = MapConfig::valid().with("backtest.end_date", "30/06/2024");
        assert_eq!(invalid_key(validate_config(&config)), "backtest.end_date");
    }

    #[test]
    fn non_positive_capital() {
        let config = MapConfig::valid().with("backtest.initial_capital", "0");
        assert_eq!(
            invalid_key(validate_config(&config)),
            "backtest.initial_capital"
        );
    }

    #[test]
    fn malformed_number_is_rejected() {
        let config = MapConfig::valid().with("backtest.initial_capital", "ten thousand");
        assert_eq!(
            invalid_key(validate_config(&config)),
            "backtest.initial_capital"
        );
    }

    #[test]
    fn allocation_bounds() {
        for bad in ["0", "-0.1", "1.5"] {
            let config = MapConfig::valid().with("risk.max_position_allocation", bad);
            assert_eq!(
                invalid_key(validate_config(&config)),
                "risk.max_position_allocation"
            );
        }
        let config = MapConfig::valid().with("risk.max_position_allocation", "1.0");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn commission_bounds() {
        let config = MapConfig::valid().with("execution.commission_rate", "-0.001");
        assert_eq!(
            invalid_key(validate_config(&config)),
            "execution.commission_rate"
        );
    }

    #[test]
    fn zero_status_polls() {
        let config = MapConfig::valid().with("execution.max_status_polls", "0");
        assert_eq!(
            invalid_key(validate_config(&config)),
            "execution.max_status_polls"
        );
    }

    #[test]
    fn unknown_enums() {
        let cases = [
            ("trading.mode", "paper"),
            ("execution.mode", "dma"),
            ("portfolio.cash_policy", "borrow"),
            ("portfolio.valuation", "fifo"),
            ("signal.scorer", "lstm"),
            ("data.source", "kafka"),
        ];
        for (key, value) in cases {
            let config = MapConfig::valid().with(key, value);
            assert_eq!(invalid_key(validate_config(&config)), key);
        }
    }

    #[test]
    fn negative_seed() {
        let config = MapConfig::valid().with("signal.seed", "-4");
        assert_eq!(invalid_key(validate_config(&config)), "signal.seed");
    }

    #[test]
    fn mock_bounds() {
        let config = MapConfig::valid().with("data.mock_volatility", "1.2");
        assert_eq!(invalid_key(validate_config(&config)), "data.mock_volatility");
        let config = MapConfig::valid().with("data.mock_start_price", "0");
        assert_eq!(invalid_key(validate_config(&config)), "data.mock_start_price");
    }

    #[test]
    fn parse_symbols_normalises() {
        assert_eq!(parse_symbols(" btc,ETH ,, btc "), vec!["BTC", "ETH"]);
        assert!(parse_symbols(" , ").is_empty());
    }
}
