//! CLI definition and dispatch.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig};
use crate::domain::config_validation::{parse_datetime, validate_config};
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorConfig;
use crate::domain::metrics::Summary;
use crate::domain::position::ExitReason;
use crate::domain::simulator::{SimulationConfig, SimulationEvent};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_OUTPUT: &str = "trades.csv";

#[derive(Parser, Debug)]
#[command(name = "rsitrend", about = "RSI + Supertrend long-only backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log every position transition
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Candle CSV, overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Trade log CSV, overrides [report] output
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show bar count and time range of a candle file
    Info {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);

    match cli.command {
        Command::Backtest {
            config,
            data,
            output,
        } => run_backtest(&config, data.as_ref(), output.as_ref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { data } => run_info(&data),
    }
}

/// Install the stderr logger. `RUST_LOG` still narrows or widens per module.
/// Later calls are no-ops.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .format_timestamp(None)
        .try_init();
}

fn log_event(event: &SimulationEvent) {
    if let SimulationEvent::Exited(trade) = event {
        log::info!(
            "{} -> {}  {:.2} -> {:.2}  {} {:+.2}% ({})",
            trade.entry_time,
            trade.exit_time,
            trade.entry_price,
            trade.exit_price,
            trade.result,
            trade.pl_pct * 100.0,
            trade.exit_reason
        );
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_backtest(
    config_path: &PathBuf,
    data_override: Option<&PathBuf>,
    output_override: Option<&PathBuf>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let bt_config = match validate_config(&adapter).and_then(|()| build_backtest_config(&adapter)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let (start, end) = match resolve_date_range(&adapter) {
        Ok(range) => range,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let data_path = match resolve_data_path(data_override, &adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let output = resolve_output_path(output_override, &adapter);

    eprintln!("Loading candles from {}", data_path.display());
    let data_port = CsvAdapter::new(data_path);
    let report_port = CsvReportAdapter::new();

    run_backtest_pipeline(&data_port, &report_port, &bt_config, start, end, &output)
}

/// Fetch, simulate, summarize and write the trade log.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    bt_config: &BacktestConfig,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    output: &Path,
) -> ExitCode {
    let bars = match data_port.fetch_bars(start, end) {
        Ok(bars) => bars,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Running backtest: {} bars", bars.len());

    let result =
        match backtest_engine::run_backtest_with_observer(&bars, bt_config, Box::new(log_event)) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

    eprintln!(
        "  Period: {} to {}",
        result.first_bar_time, result.last_bar_time
    );
    eprintln!(
        "  Warm-up: {} bars skipped",
        result.bars_skipped_warmup
    );

    print_summary(&Summary::compute(&result));

    let output_str = output.to_string_lossy();
    match report_port.write(&result, &output_str) {
        Ok(()) => {
            eprintln!("\nTrade log written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to write trade log: {e}");
            (&e).into()
        }
    }
}

fn print_summary(summary: &Summary) {
    eprintln!("\n=== Results ===");
    eprintln!("Initial Balance:  {:.2}", summary.starting_balance);
    eprintln!("Final Balance:    {:.2}", summary.final_balance);
    eprintln!("Total Return:     {:.2}%", summary.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.2}%", summary.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", summary.total_trades);
    eprintln!(
        "Wins / Losses:    {} / {}",
        summary.winning_trades, summary.losing_trades
    );
    eprintln!("Win Rate:         {:.1}%", summary.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", summary.profit_factor);
    eprintln!("Avg Holding:      {:.1}h", summary.avg_holding_hours);

    if summary.total_trades > 0 {
        eprintln!("\n=== Exits ===");
        for reason in ExitReason::ALL {
            eprintln!("  {:<16}{}", format!("{}:", reason), summary.exits(reason));
        }
    }
}

fn period(adapter: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, TraderError> {
    let value = adapter.get_int("indicators", key, default as i64);
    usize::try_from(value)
        .map_err(|_| TraderError::invalid("indicators", key, format!("{} must be positive", key)))
}

/// Build the typed config; absent keys take the stock defaults.
pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TraderError> {
    let ind = IndicatorConfig::default();
    let sim = SimulationConfig::default();

    let config = BacktestConfig {
        indicators: IndicatorConfig {
            rsi_period: period(adapter, "rsi_period", ind.rsi_period)?,
            ma_period: period(adapter, "ma_period", ind.ma_period)?,
            fast_period: period(adapter, "fast_period", ind.fast_period)?,
            slow_period: period(adapter, "slow_period", ind.slow_period)?,
            supertrend_atr_period: period(
                adapter,
                "supertrend_atr_period",
                ind.supertrend_atr_period,
            )?,
            supertrend_multiplier: adapter.get_double(
                "indicators",
                "supertrend_multiplier",
                ind.supertrend_multiplier,
            ),
        },
        simulation: SimulationConfig {
            initial_balance: adapter.get_double("backtest", "initial_balance", sim.initial_balance),
            stop_loss_pct: adapter.get_double("backtest", "stop_loss_pct", sim.stop_loss_pct),
            profit_target_pct: adapter.get_double(
                "backtest",
                "profit_target_pct",
                sim.profit_target_pct,
            ),
            sell_price_hold_hours: adapter.get_double(
                "backtest",
                "sell_price_hold_hours",
                sim.sell_price_hold_hours,
            ),
            rsi_oversold: adapter.get_double("strategy", "rsi_oversold", sim.rsi_oversold),
            rsi_overbought: adapter.get_double("strategy", "rsi_overbought", sim.rsi_overbought),
        },
    };

    config.validate()?;
    Ok(config)
}

pub fn resolve_date_range(
    adapter: &dyn ConfigPort,
) -> Result<(Option<NaiveDateTime>, Option<NaiveDateTime>), TraderError> {
    let bound = |key: &str| -> Result<Option<NaiveDateTime>, TraderError> {
        match adapter.get_string("backtest", key) {
            Some(s) if !s.trim().is_empty() => parse_datetime(&s).map(Some).ok_or_else(|| {
                TraderError::invalid("backtest", key, format!("invalid {} format", key))
            }),
            _ => Ok(None),
        }
    };
    Ok((bound("start")?, bound("end")?))
}

pub fn resolve_data_path(
    data_override: Option<&PathBuf>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, TraderError> {
    if let Some(p) = data_override {
        return Ok(p.clone());
    }
    config
        .get_string("data", "path")
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()))
        .ok_or_else(|| TraderError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })
}

pub fn resolve_output_path(output_override: Option<&PathBuf>, config: &dyn ConfigPort) -> PathBuf {
    if let Some(p) = output_override {
        return p.clone();
    }
    config
        .get_string("report", "output")
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
}

pub fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let bt_config = match validate_config(&adapter).and_then(|()| build_backtest_config(&adapter)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let ind = &bt_config.indicators;
    let sim = &bt_config.simulation;
    eprintln!("\nIndicators:");
    eprintln!("  RSI({})", ind.rsi_period);
    eprintln!("  SMA({})", ind.ma_period);
    eprintln!("  EMA fast({}) / slow({})", ind.fast_period, ind.slow_period);
    eprintln!(
        "  Supertrend(ATR {}, x{})",
        ind.supertrend_atr_period, ind.supertrend_multiplier
    );
    eprintln!("  Warm-up: {} bars", ind.warmup_bars());

    eprintln!("\nSimulation:");
    eprintln!("  initial balance:   {}", sim.initial_balance);
    eprintln!("  stop loss:         {:.2}%", sim.stop_loss_pct * 100.0);
    eprintln!("  profit target:     {:.2}%", sim.profit_target_pct * 100.0);
    eprintln!("  re-entry hold:     {}h", sim.sell_price_hold_hours);
    eprintln!(
        "  RSI bands:         {} / {}",
        sim.rsi_oversold, sim.rsi_overbought
    );

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

pub fn run_info(data_path: &Path) -> ExitCode {
    let adapter = CsvAdapter::new(data_path.to_path_buf());
    match adapter.data_range() {
        Ok(Some((first, last, count))) => {
            println!("{}: {} bars, {} to {}", data_path.display(), count, first, last);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!("{}: no data found", data_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
