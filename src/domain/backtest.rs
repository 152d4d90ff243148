//! Backtest pipeline: indicators, warm-up discard, simulation.
//!
//! BacktestConfig bundles every recognised option; `Default` carries the
//! stock strategy parameters.

use chrono::NaiveDateTime;

use super::error::TraderError;
use super::indicator::{self, IndicatorConfig};
use super::ohlcv::Bar;
use super::position::Trade;
use super::simulator::{BalancePoint, SimulationConfig, SimulationObserver, TradeSimulator};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BacktestConfig {
    pub indicators: IndicatorConfig,
    pub simulation: SimulationConfig,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        self.simulation.validate()?;
        self.indicators.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub balance_curve: Vec<BalancePoint>,
    pub bars_total: usize,
    pub bars_skipped_warmup: usize,
    pub first_bar_time: NaiveDateTime,
    pub last_bar_time: NaiveDateTime,
}

pub fn run_backtest(bars: &[Bar], config: &BacktestConfig) -> Result<BacktestResult, TraderError> {
    run(bars, config, None)
}

pub fn run_backtest_with_observer(
    bars: &[Bar],
    config: &BacktestConfig,
    observer: Box<dyn SimulationObserver>,
) -> Result<BacktestResult, TraderError> {
    run(bars, config, Some(observer))
}

fn run(
    bars: &[Bar],
    config: &BacktestConfig,
    observer: Option<Box<dyn SimulationObserver>>,
) -> Result<BacktestResult, TraderError> {
    config.validate()?;

    let frames = indicator::compute(bars, &config.indicators)?;

    let mut simulator = TradeSimulator::new(config.simulation.clone())?;
    if let Some(observer) = observer {
        simulator = simulator.with_observer(observer);
    }
    let outcome = simulator.run(bars, &frames);

    log::info!(
        "simulated {} bars ({} warm-up bars skipped), {} trades",
        outcome.bars_processed,
        outcome.bars_skipped,
        outcome.trades.len()
    );

    // compute() rejects empty input, so both ends exist
    let first_bar_time = bars[0].close_time;
    let last_bar_time = bars[bars.len() - 1].close_time;

    Ok(BacktestResult {
        trades: outcome.trades,
        initial_balance: outcome.initial_balance,
        final_balance: outcome.final_balance,
        balance_curve: outcome.balance_curve,
        bars_total: bars.len(),
        bars_skipped_warmup: outcome.bars_skipped,
        first_bar_time,
        last_bar_time,
    })
}
