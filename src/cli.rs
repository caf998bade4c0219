//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::mock_data_adapter::{
    DEFAULT_START_PRICE, DEFAULT_VOLATILITY, MockDataAdapter,
};
use crate::domain::backtest::{Simulation, SimulationConfig, SimulationResult};
use crate::domain::config_validation::{
    choice, number, parse_date, resolve_symbols, unsigned, validate_config,
};
use crate::domain::error::CmfError;
use crate::domain::execution::{DEFAULT_COMMISSION_RATE, DEFAULT_MAX_STATUS_POLLS};
use crate::domain::metrics::Summary;
use crate::domain::risk::DEFAULT_MAX_ALLOCATION;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "cmftrader", about = "Event-pipeline trading simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for summary/equity/fills CSV reports
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Seed for the signal scorer (overrides signal.seed)
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            seed,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, seed)
            } else {
                run_backtest(&config, output.as_deref(), seed)
            }
        }
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, CmfError> {
    FileConfigAdapter::from_file(path).map_err(|e| CmfError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn fail(err: &CmfError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

/// Only `trading.mode = backtest` can run; there is no live market feed.
pub fn check_trading_mode(adapter: &dyn ConfigPort) -> Result<(), CmfError> {
    let mode = adapter
        .get_string("trading.mode")
        .unwrap_or_else(|| "backtest".to_string());
    match mode.trim().to_lowercase().as_str() {
        "backtest" => Ok(()),
        "live" => Err(CmfError::Unsupported {
            reason: "live trading mode is not implemented".into(),
        }),
        other => Err(CmfError::ConfigInvalid {
            key: "trading.mode".into(),
            reason: format!("unknown trading mode '{other}'"),
        }),
    }
}

pub fn build_simulation_config(
    adapter: &dyn ConfigPort,
    seed_override: Option<u64>,
) -> Result<SimulationConfig, CmfError> {
    let symbols = resolve_symbols(adapter);
    if symbols.is_empty() {
        return Err(CmfError::ConfigMissing {
            key: "backtest.symbols".into(),
        });
    }

    let max_status_polls = unsigned(adapter, "execution.max_status_polls")?
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(DEFAULT_MAX_STATUS_POLLS);

    Ok(SimulationConfig {
        start_date: parse_date(adapter, "backtest.start_date")?,
        end_date: parse_date(adapter, "backtest.end_date")?,
        initial_capital: number(adapter, "backtest.initial_capital")?.unwrap_or(100_000.0),
        base_currency: adapter
            .get_string("backtest.base_currency")
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| "USD".to_string()),
        symbols,
        max_allocation: number(adapter, "risk.max_position_allocation")?
            .unwrap_or(DEFAULT_MAX_ALLOCATION),
        commission_rate: number(adapter, "execution.commission_rate")?
            .unwrap_or(DEFAULT_COMMISSION_RATE),
        execution_mode: choice(adapter, "execution.mode")?,
        max_status_polls,
        cash_policy: choice(adapter, "portfolio.cash_policy")?,
        valuation: choice(adapter, "portfolio.valuation")?,
        scorer: choice(adapter, "signal.scorer")?,
        signal_seed: match seed_override {
            Some(seed) => Some(seed),
            None => unsigned(adapter, "signal.seed")?,
        },
        record_history: adapter.get_bool("backtest.record_history", true),
    })
}

pub fn build_data_port(
    adapter: &dyn ConfigPort,
    seed_override: Option<u64>,
) -> Result<Box<dyn DataPort>, CmfError> {
    let source = adapter
        .get_string("data.source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim().to_lowercase().as_str() {
        "csv" => {
            let dir = adapter
                .get_string("data.dir")
                .unwrap_or_else(|| "data".to_string());
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        "mock" => {
            let seed = match unsigned(adapter, "data.mock_seed")? {
                Some(seed) => Some(seed),
                None => seed_override,
            };
            Ok(Box::new(MockDataAdapter::new(
                number(adapter, "data.mock_start_price")?.unwrap_or(DEFAULT_START_PRICE),
                number(adapter, "data.mock_volatility")?.unwrap_or(DEFAULT_VOLATILITY),
                seed,
            )))
        }
        other => Err(CmfError::ConfigInvalid {
            key: "data.source".into(),
            reason: format!("unknown data source '{other}'"),
        }),
    }
}

/// Validate, build and run a full simulation from configuration.
pub fn execute_backtest(
    adapter: &dyn ConfigPort,
    seed_override: Option<u64>,
) -> Result<(SimulationConfig, SimulationResult), CmfError> {
    validate_config(adapter)?;
    check_trading_mode(adapter)?;

    let sim_config = build_simulation_config(adapter, seed_override)?;
    let data_port = build_data_port(adapter, seed_override)?;
    let stream = data_port.stream(
        &sim_config.symbols,
        sim_config.start_date,
        sim_config.end_date,
    )?;

    let result = Simulation::from_config(&sim_config).run(stream)?;
    Ok((sim_config, result))
}

pub fn run_backtest(config_path: &Path, output: Option<&Path>, seed: Option<u64>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };

    let (sim_config, result) = match execute_backtest(&adapter, seed) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    eprintln!(
        "Ran backtest: {} symbols, {} to {}",
        sim_config.symbols.len(),
        sim_config.start_date,
        sim_config.end_date,
    );
    print_summary(&result.summary);

    let output_dir = output
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_string("report.output_dir").map(PathBuf::from));
    if let Some(dir) = output_dir {
        if let Err(e) = CsvReportAdapter::new().write(&result, &dir) {
            return fail(&e);
        }
        eprintln!("\nReport written to: {}", dir.display());
    }

    ExitCode::SUCCESS
}

pub fn print_summary(summary: &Summary) {
    let ccy = &summary.base_currency;
    eprintln!("\n=== Results ===");
    eprintln!("Initial Capital:  {:.2} {ccy}", summary.initial_capital);
    eprintln!("Final Cash:       {:.2} {ccy}", summary.final_cash);
    eprintln!("Total Value:      {:.2} {ccy}", summary.total_value);
    let sign = if summary.pnl >= 0.0 { "+" } else { "" };
    eprintln!(
        "P&L:              {sign}{:.2} {ccy} ({sign}{:.2}%)",
        summary.pnl, summary.pnl_pct
    );
    eprintln!("Max Drawdown:     -{:.1}%", summary.max_drawdown * 100.0);
    eprintln!("Fills:            {}", summary.fills);
    eprintln!("Rejected:         {}", summary.rejected_fills);
    eprintln!("Commission:       {:.2} {ccy}", summary.total_commission);
    eprintln!(
        "Ticks:            {} ({} observations, {} skipped)",
        summary.ticks, summary.observations, summary.skipped_observations
    );

    if !summary.holdings.is_empty() {
        eprintln!("\n=== Holdings ===");
        for (symbol, quantity) in &summary.holdings {
            eprintln!("  {symbol}:  {quantity:.6}");
        }
    }
}

pub fn run_dry_run(config_path: &Path, seed: Option<u64>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };

    let sim_config = match validate_config(&adapter)
        .and_then(|()| check_trading_mode(&adapter))
        .and_then(|()| build_simulation_config(&adapter, seed))
    {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    eprintln!("Config validated successfully");

    eprintln!("\nResolved configuration:");
    eprintln!("  Symbols:          {}", sim_config.symbols.join(", "));
    eprintln!(
        "  Date range:       {} to {}",
        sim_config.start_date, sim_config.end_date
    );
    eprintln!(
        "  Initial capital:  {:.2} {}",
        sim_config.initial_capital, sim_config.base_currency
    );
    eprintln!("  Max allocation:   {}", sim_config.max_allocation);
    eprintln!("  Commission rate:  {}", sim_config.commission_rate);
    eprintln!(
        "  Execution:        {} (max {} status polls)",
        sim_config.execution_mode, sim_config.max_status_polls
    );
    eprintln!("  Cash policy:      {:?}", sim_config.cash_policy);
    eprintln!("  Valuation:        {:?}", sim_config.valuation);
    eprintln!("  Signal scorer:    {:?}", sim_config.scorer);
    match sim_config.signal_seed {
        Some(seed) => eprintln!("  Signal seed:      {seed}"),
        None => eprintln!("  Signal seed:      (entropy)"),
    }
    eprintln!(
        "  Data source:      {}",
        adapter
            .get_string("data.source")
            .unwrap_or_else(|| "csv".to_string())
    );

    eprintln!("\nDry run complete.");
    ExitCode::SUCCESS
}

pub fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };

    match validate_config(&adapter) {
        Ok(()) => {
            let symbols = resolve_symbols(&adapter);
            eprintln!("Config is valid ({} symbols)", symbols.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}
