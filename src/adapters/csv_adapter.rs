//! CSV file data adapter.
//!
//! One file per symbol, `<dir>/<SYMBOL>.csv`, with header
//! `timestamp,open,high,low,close,volume`. Rows from all symbols are merged
//! into a single timestamp-ordered stream; ties keep the configured symbol order.

use crate::domain::error::CmfError;
use crate::domain::event::MarketObservation;
use crate::ports::data_port::{DataPort, ObservationStream};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Accepts `YYYY-MM-DD HH:MM:SS` or a bare date (midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

struct Entry {
    key: NaiveDateTime,
    symbol_index: usize,
    item: Result<MarketObservation, CmfError>,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn load_symbol(
        &self,
        symbol: &str,
        symbol_index: usize,
        start: NaiveDateTime,
        end_date: NaiveDate,
        out: &mut Vec<Entry>,
    ) -> Result<(), CmfError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| CmfError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        // Rows that cannot be placed in time sort next to their predecessor,
        // and are dropped with it when that predecessor is outside the window.
        let in_window = |t: NaiveDateTime| t >= start && t.date() <= end_date;
        let mut last_key = start;
        let before = out.len();

        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let parsed = result
                .map_err(|e| format!("row {}: {}", line + 1, e))
                .and_then(|row| match parse_timestamp(&row.timestamp) {
                    Some(timestamp) => Ok((timestamp, row)),
                    None => Err(format!(
                        "row {}: invalid timestamp '{}'",
                        line + 1,
                        row.timestamp
                    )),
                });

            let (timestamp, row) = match parsed {
                Ok(parsed) => parsed,
                Err(reason) => {
                    if in_window(last_key) {
                        out.push(Entry {
                            key: last_key,
                            symbol_index,
                            item: Err(malformed(symbol, reason)),
                        });
                    }
                    continue;
                }
            };
            last_key = timestamp;

            if !in_window(timestamp) {
                continue;
            }

            out.push(Entry {
                key: timestamp,
                symbol_index,
                item: Ok(MarketObservation {
                    timestamp,
                    symbol: symbol.to_string(),
                    open: row.open,
                    high: row.high,
                    low: row.low,
                    close: row.close,
                    volume: row.volume,
                }),
            });
        }

        debug!(symbol, rows = out.len() - before, path = %path.display(), "loaded csv");
        Ok(())
    }
}

fn malformed(symbol: &str, reason: String) -> CmfError {
    CmfError::MalformedObservation {
        symbol: symbol.to_string(),
        reason,
    }
}

impl DataPort for CsvAdapter {
    fn stream(
        &self,
        symbols: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<ObservationStream<'_>, CmfError> {
        let start = start_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| CmfError::DataSource {
                reason: format!("invalid start date {}", start_date),
            })?;

        let mut entries = Vec::new();
        for (index, symbol) in symbols.iter().enumerate() {
            self.load_symbol(symbol, index, start, end_date, &mut entries)?;
        }

        // Stable: rows of one symbol at the same instant stay in file order.
        entries.sort_by(|a, b| {
            a.key
                .cmp(&b.key)
                .then(a.symbol_index.cmp(&b.symbol_index))
        });

        Ok(Box::new(entries.into_iter().map(|e| e.item)))
    }
}
