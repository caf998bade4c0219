//! CSV report adapter: summary, equity curve and fill log.

use crate::domain::backtest::SimulationResult;
use crate::domain::error::CmfError;
use crate::domain::metrics::Summary;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;
use tracing::info;

pub const SUMMARY_FILE: &str = "summary.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const FILLS_FILE: &str = "fills.csv";

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn summary_rows(summary: &Summary) -> Vec<(String, String)> {
        let mut rows = vec![
            ("base_currency".to_string(), summary.base_currency.clone()),
            ("initial_capital".to_string(), summary.initial_capital.to_string()),
            ("final_cash".to_string(), summary.final_cash.to_string()),
            ("total_value".to_string(), summary.total_value.to_string()),
            ("pnl".to_string(), summary.pnl.to_string()),
            ("pnl_pct".to_string(), summary.pnl_pct.to_string()),
            ("max_drawdown".to_string(), summary.max_drawdown.to_string()),
            (
                "max_drawdown_ticks".to_string(),
                summary.max_drawdown_ticks.to_string(),
            ),
            ("fills".to_string(), summary.fills.to_string()),
            ("rejected_fills".to_string(), summary.rejected_fills.to_string()),
            (
                "total_commission".to_string(),
                summary.total_commission.to_string(),
            ),
            ("ticks".to_string(), summary.ticks.to_string()),
            ("observations".to_string(), summary.observations.to_string()),
            (
                "skipped_observations".to_string(),
                summary.skipped_observations.to_string(),
            ),
        ];
        for (symbol, quantity) in &summary.holdings {
            rows.push((format!("holding.{symbol}"), quantity.to_string()));
        }
        rows
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &SimulationResult, output_dir: &Path) -> Result<(), CmfError> {
        fs::create_dir_all(output_dir)?;

        let mut summary = csv::Writer::from_path(output_dir.join(SUMMARY_FILE))?;
        summary.write_record(["key", "value"])?;
        for (key, value) in Self::summary_rows(&result.summary) {
            summary.write_record([key, value])?;
        }
        summary.flush()?;

        let mut equity = csv::Writer::from_path(output_dir.join(EQUITY_FILE))?;
        if result.history.is_empty() {
            equity.write_record(["timestamp", "cash", "holdings_value", "total_value"])?;
        }
        for snapshot in &result.history {
            equity.serialize(snapshot)?;
        }
        equity.flush()?;

        let mut fills = csv::Writer::from_path(output_dir.join(FILLS_FILE))?;
        if result.fills.is_empty() {
            fills.write_record([
                "timestamp",
                "symbol",
                "action",
                "quantity",
                "fill_price",
                "commission",
                "status",
            ])?;
        }
        for fill in &result.fills {
            fills.serialize(fill)?;
        }
        fills.flush()?;

        info!(
            dir = %output_dir.display(),
            snapshots = result.history.len(),
            fills = result.fills.len(),
            "report written"
        );
        Ok(())
    }
}
