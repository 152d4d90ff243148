//! Single-position, long-only trade simulation.
//!
//! A strict left-to-right fold over (bar, frame) pairs. State carried from
//! one bar to the next is owned by [`TradeSimulator`]: the position, the
//! account balance, the re-entry cooldown and the trade log. The balance only
//! changes when a position is closed.

use chrono::{Duration, NaiveDateTime};

use super::error::TraderError;
use super::indicator::{IndicatorFrame, TrendDirection};
use super::ohlcv::Bar;
use super::position::{CooldownState, ExitReason, OpenPosition, PositionState, Trade};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub initial_balance: f64,
    pub stop_loss_pct: f64,
    pub profit_target_pct: f64,
    pub sell_price_hold_hours: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            initial_balance: 100.0,
            stop_loss_pct: 0.01,
            profit_target_pct: 0.05,
            sell_price_hold_hours: 8.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(TraderError::invalid(
                "backtest",
                "initial_balance",
                "initial_balance must be positive",
            ));
        }
        if !(self.stop_loss_pct > 0.0 && self.stop_loss_pct < 1.0) {
            return Err(TraderError::invalid(
                "backtest",
                "stop_loss_pct",
                "stop_loss_pct must be between 0 and 1 (exclusive)",
            ));
        }
        if !(self.profit_target_pct > 0.0 && self.profit_target_pct < 1.0) {
            return Err(TraderError::invalid(
                "backtest",
                "profit_target_pct",
                "profit_target_pct must be between 0 and 1 (exclusive)",
            ));
        }
        if !(self.sell_price_hold_hours.is_finite() && self.sell_price_hold_hours >= 0.0) {
            return Err(TraderError::invalid(
                "backtest",
                "sell_price_hold_hours",
                "sell_price_hold_hours must be non-negative",
            ));
        }
        for (key, value) in [
            ("rsi_oversold", self.rsi_oversold),
            ("rsi_overbought", self.rsi_overbought),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(TraderError::invalid(
                    "strategy",
                    key,
                    format!("{} must be between 0 and 100", key),
                ));
            }
        }
        Ok(())
    }

    /// Hold window as a duration. Windows too long to represent are clamped
    /// to `Duration::MAX`.
    pub fn hold_duration(&self) -> Duration {
        let millis = (self.sell_price_hold_hours * MILLIS_PER_HOUR).round();
        if millis >= i64::MAX as f64 {
            return Duration::MAX;
        }
        Duration::try_milliseconds(millis as i64).unwrap_or(Duration::MAX)
    }
}

/// State transitions reported to an observer as they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    Entered {
        time: NaiveDateTime,
        price: f64,
        stop_loss_price: f64,
    },
    Exited(Trade),
}

pub trait SimulationObserver {
    fn on_event(&mut self, event: &SimulationEvent);
}

impl<F: FnMut(&SimulationEvent)> SimulationObserver for F {
    fn on_event(&mut self, event: &SimulationEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalancePoint {
    pub time: NaiveDateTime,
    pub balance: f64,
}

/// Everything a finished simulation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub trades: Vec<Trade>,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub balance_curve: Vec<BalancePoint>,
    pub bars_processed: usize,
    pub bars_skipped: usize,
}

pub struct TradeSimulator {
    config: SimulationConfig,
    hold: Duration,
    state: PositionState,
    balance: f64,
    cooldown: CooldownState,
    trades: Vec<Trade>,
    balance_curve: Vec<BalancePoint>,
    observer: Option<Box<dyn SimulationObserver>>,
}

impl TradeSimulator {
    pub fn new(config: SimulationConfig) -> Result<Self, TraderError> {
        config.validate()?;
        Ok(TradeSimulator {
            hold: config.hold_duration(),
            balance: config.initial_balance,
            config,
            state: PositionState::Flat,
            cooldown: CooldownState::default(),
            trades: Vec::new(),
            balance_curve: Vec::new(),
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Box<dyn SimulationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn cooldown(&self) -> &CooldownState {
        &self.cooldown
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Evaluate one bar. Frames with an undefined decision field are ignored.
    /// Returns whether the bar was evaluated.
    pub fn step(&mut self, bar: &Bar, frame: &IndicatorFrame) -> bool {
        let (Some(rsi), Some(ma), Some(ema_fast), Some(ema_slow)) =
            (frame.rsi, frame.ma, frame.ema_fast, frame.ema_slow)
        else {
            return false;
        };
        if frame.supertrend_value.is_none() {
            return false;
        }
        let direction = frame.supertrend_direction;

        match &self.state {
            PositionState::Flat => {
                let signal = rsi < self.config.rsi_oversold
                    && direction == TrendDirection::Up
                    && bar.close > ma
                    && ema_fast > ema_slow;
                if signal && !self.cooldown.blocks_entry(bar.close_time, bar.close, self.hold) {
                    self.open_position(bar);
                } else if signal {
                    log::debug!(
                        "[{}] entry suppressed by cooldown at {:.4}",
                        bar.close_time,
                        bar.close
                    );
                }
            }
            PositionState::Long(position) => {
                if let Some((price, reason)) =
                    exit_decision(position, &self.config, bar.close, rsi, direction)
                {
                    self.close_position(price, bar.close_time, reason);
                }
            }
        }
        true
    }

    /// Force-close an open position at the last bar's close.
    pub fn finish(&mut self, last_bar: &Bar) {
        if self.state.is_long() {
            self.close_position(last_bar.close, last_bar.close_time, ExitReason::EndOfData);
        }
    }

    /// Run the whole scan: skip warm-up frames, fold the rest, flush at the end.
    pub fn run(mut self, bars: &[Bar], frames: &[IndicatorFrame]) -> SimulationOutcome {
        let mut processed = 0usize;
        let mut skipped = 0usize;
        let mut last_bar: Option<&Bar> = None;

        for (bar, frame) in bars.iter().zip(frames) {
            if self.step(bar, frame) {
                processed += 1;
                last_bar = Some(bar);
            } else {
                skipped += 1;
            }
        }

        if let Some(bar) = last_bar {
            self.finish(bar);
        }

        SimulationOutcome {
            trades: self.trades,
            initial_balance: self.config.initial_balance,
            final_balance: self.balance,
            balance_curve: self.balance_curve,
            bars_processed: processed,
            bars_skipped: skipped,
        }
    }

    fn open_position(&mut self, bar: &Bar) {
        let position = OpenPosition::new(
            bar.close,
            bar.close_time,
            self.config.stop_loss_pct,
            self.balance,
        );
        log::debug!(
            "[{}] BUY at {:.4} (stop {:.4})",
            bar.close_time,
            position.entry_price,
            position.stop_loss_price
        );
        self.emit(SimulationEvent::Entered {
            time: position.entry_time,
            price: position.entry_price,
            stop_loss_price: position.stop_loss_price,
        });
        self.state = PositionState::Long(position);
    }

    fn close_position(&mut self, exit_price: f64, exit_time: NaiveDateTime, reason: ExitReason) {
        let PositionState::Long(position) = std::mem::take(&mut self.state) else {
            return;
        };
        let trade = position.close(exit_price, exit_time, reason);

        self.balance = position.balance_at_entry + trade.pl_value;
        self.cooldown.record_exit(exit_time, exit_price);
        self.balance_curve.push(BalancePoint {
            time: exit_time,
            balance: self.balance,
        });

        log::debug!(
            "[{}] SELL at {:.4} ({}) - P/L: {:.2}%",
            exit_time,
            exit_price,
            reason,
            trade.pl_pct * 100.0
        );
        self.emit(SimulationEvent::Exited(trade.clone()));
        self.trades.push(trade);
    }

    fn emit(&mut self, event: SimulationEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_event(&event);
        }
    }
}

/// Exit rules in priority order; the first match wins.
fn exit_decision(
    position: &OpenPosition,
    config: &SimulationConfig,
    close: f64,
    rsi: f64,
    direction: TrendDirection,
) -> Option<(f64, ExitReason)> {
    let in_profit = position.unrealized_pl_pct(close) >= config.profit_target_pct;

    if rsi > config.rsi_overbought && in_profit {
        Some((close, ExitReason::RsiExit))
    } else if direction == TrendDirection::Down && in_profit {
        Some((close, ExitReason::SupertrendExit))
    } else if position.should_stop_loss(close) {
        Some((position.stop_loss_price, ExitReason::StopLoss))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn at(h: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(h)
    }

    fn bar(h: i64, close: f64) -> Bar {
        Bar {
            open: close,
            high: close,
            low: close,
            close,
            close_time: at(h),
        }
    }

    /// Frame that satisfies every entry filter except RSI, which is supplied.
    fn frame(rsi: f64, direction: TrendDirection) -> IndicatorFrame {
        IndicatorFrame {
            ma: Some(1.0),
            ema_fast: Some(2.0),
            ema_slow: Some(1.0),
            supertrend_value: Some(1.0),
            supertrend_direction: direction,
            rsi: Some(rsi),
        }
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            initial_balance: 1_000.0,
            ..SimulationConfig::default()
        }
    }

    fn simulator() -> TradeSimulator {
        TradeSimulator::new(config()).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn non_positive_stop_loss_is_invalid() {
        let cfg = SimulationConfig {
            stop_loss_pct: 0.0,
            ..config()
        };
        match TradeSimulator::new(cfg) {
            Err(TraderError::InvalidConfig { key, .. }) => assert_eq!(key, "stop_loss_pct"),
            _ => panic!("expected InvalidConfig"),
        }
    }

    #[test]
    fn non_positive_profit_target_is_invalid() {
        let cfg = SimulationConfig {
            profit_target_pct: -0.01,
            ..config()
        };
        assert!(matches!(
            TradeSimulator::new(cfg),
            Err(TraderError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn negative_hold_hours_is_invalid() {
        let cfg = SimulationConfig {
            sell_price_hold_hours: -1.0,
            ..config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn hold_duration_from_fractional_hours() {
        let cfg = SimulationConfig {
            sell_price_hold_hours: 1.5,
            ..config()
        };
        assert_eq!(cfg.hold_duration(), Duration::minutes(90));
    }

    #[test]
    fn huge_hold_clamps_to_max_duration() {
        let cfg = SimulationConfig {
            sell_price_hold_hours: 1e16,
            ..config()
        };
        assert_eq!(cfg.hold_duration(), Duration::MAX);
    }

    #[test]
    fn enters_when_all_filters_pass() {
        let mut sim = simulator();
        sim.step(&bar(0, 100.0), &frame(25.0, TrendDirection::Up));

        match sim.state() {
            PositionState::Long(pos) => {
                assert_eq!(pos.entry_price, 100.0);
                assert_eq!(pos.entry_time, at(0));
                assert_eq!(pos.stop_loss_price, 99.0);
                assert_eq!(pos.balance_at_entry, 1_000.0);
            }
            PositionState::Flat => panic!("expected Long"),
        }
        assert_eq!(sim.balance(), 1_000.0);
    }

    #[test]
    fn each_entry_filter_is_required() {
        let mut not_oversold = frame(30.0, TrendDirection::Up);
        let mut sim = simulator();
        sim.step(&bar(0, 100.0), &not_oversold);
        assert!(!sim.state().is_long());

        not_oversold.rsi = Some(20.0);
        not_oversold.supertrend_direction = TrendDirection::Down;
        sim.step(&bar(1, 100.0), &not_oversold);
        assert!(!sim.state().is_long());

        let mut below_ma = frame(20.0, TrendDirection::Up);
        below_ma.ma = Some(100.0);
        sim.step(&bar(2, 100.0), &below_ma);
        assert!(!sim.state().is_long());

        let mut weak_momentum = frame(20.0, TrendDirection::Up);
        weak_momentum.ema_fast = Some(1.0);
        sim.step(&bar(3, 100.0), &weak_momentum);
        assert!(!sim.state().is_long());
    }

    #[test]
    fn incomplete_frame_is_skipped() {
        let mut sim = simulator();
        let mut warmup = frame(10.0, TrendDirection::Up);
        warmup.ma = None;
        assert!(!sim.step(&bar(0, 100.0), &warmup));
        assert!(!sim.state().is_long());
    }

    #[test]
    fn rsi_exit_takes_priority() {
        let mut sim = simulator();
        sim.step(&bar(0, 100.0), &frame(25.0, TrendDirection::Up));
        // both RSI and Supertrend rules match; RSI wins
        sim.step(&bar(1, 106.0), &frame(75.0, TrendDirection::Down));

        let trade = &sim.trades()[0];
        assert_eq!(trade.exit_reason, ExitReason::RsiExit);
        assert_eq!(trade.exit_price, 106.0);
        assert!((trade.pl_value - 60.0).abs() < 1e-9);
        assert!((sim.balance() - 1_060.0).abs() < 1e-9);
    }

    #[test]
    fn supertrend_exit_requires_profit_target() {
        let mut sim = simulator();
        sim.step(&bar(0, 100.0), &frame(25.0, TrendDirection::Up));
        sim.step(&bar(1, 103.0), &frame(50.0, TrendDirection::Down));
        assert!(sim.state().is_long());

        sim.step(&bar(2, 105.0), &frame(50.0, TrendDirection::Down));
        assert_eq!(sim.trades()[0].exit_reason, ExitReason::SupertrendExit);
    }

    #[test]
    fn overbought_at_a_loss_does_not_exit() {
        let mut sim = simulator();
        sim.step(&bar(0, 100.0), &frame(25.0, TrendDirection::Up));
        sim.step(&bar(1, 99.5), &frame(90.0, TrendDirection::Down));
        assert!(sim.state().is_long());
        assert!(sim.trades().is_empty());
    }

    #[test]
    fn stop_loss_exits_at_stop_price() {
        let mut sim = simulator();
        sim.step(&bar(0, 100.0), &frame(25.0, TrendDirection::Up));
        sim.step(&bar(1, 95.0), &frame(50.0, TrendDirection::Up));

        let trade = &sim.trades()[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_price, 99.0);
        assert!((trade.pl_value + 10.0).abs() < 1e-9);
        assert_eq!(trade.result, crate::domain::position::TradeResult::Loss);
        assert!(!sim.state().is_long());
    }

    #[test]
    fn cooldown_blocks_reentry_above_last_exit() {
        let mut sim = simulator();
        sim.step(&bar(0, 100.0), &frame(25.0, TrendDirection::Up));
        sim.step(&bar(1, 106.0), &frame(75.0, TrendDirection::Up));
        assert_eq!(sim.cooldown().last_exit_price, Some(106.0));

        // within 8h and not below 106 => blocked
        sim.step(&bar(2, 107.0), &frame(25.0, TrendDirection::Up));
        assert!(!sim.state().is_long());

        // within 8h but below the last exit => allowed
        sim.step(&bar(3, 105.0), &frame(25.0, TrendDirection::Up));
        assert!(sim.state().is_long());
    }

    #[test]
    fn cooldown_expires_after_hold_window() {
        let mut sim = simulator();
        sim.step(&bar(0, 100.0), &frame(25.0, TrendDirection::Up));
        sim.step(&bar(1, 106.0), &frame(75.0, TrendDirection::Up));

        // exactly at exit + 8h is still cooling
        sim.step(&bar(9, 110.0), &frame(25.0, TrendDirection::Up));
        assert!(!sim.state().is_long());

        sim.step(&bar(10, 110.0), &frame(25.0, TrendDirection::Up));
        assert!(sim.state().is_long());
    }

    #[test]
    fn huge_hold_keeps_cooling_without_overflow() {
        let cfg = SimulationConfig {
            sell_price_hold_hours: 1e10,
            ..config()
        };
        let mut sim = TradeSimulator::new(cfg).unwrap();
        sim.step(&bar(0, 100.0), &frame(25.0, TrendDirection::Up));
        sim.step(&bar(1, 106.0), &frame(75.0, TrendDirection::Up));
        assert_eq!(sim.trades().len(), 1);

        sim.step(&bar(2, 107.0), &frame(25.0, TrendDirection::Up));
        assert!(!sim.state().is_long());
    }

    #[test]
    fn finish_flushes_open_position() {
        let mut sim = simulator();
        sim.step(&bar(0, 100.0), &frame(25.0, TrendDirection::Up));
        sim.finish(&bar(5, 102.0));

        let trade = &sim.trades()[0];
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert_eq!(trade.exit_price, 102.0);
        assert_eq!(trade.exit_time, at(5));
    }

    #[test]
    fn finish_when_flat_is_noop() {
        let mut sim = simulator();
        sim.finish(&bar(5, 102.0));
        assert!(sim.trades().is_empty());
        assert_eq!(sim.balance(), 1_000.0);
    }

    #[test]
    fn run_compounds_balance() {
        let bars = vec![
            bar(0, 100.0),
            bar(1, 110.0),
            bar(20, 100.0),
            bar(21, 99.0),
        ];
        let frames = vec![
            frame(25.0, TrendDirection::Up),
            frame(75.0, TrendDirection::Up),
            frame(25.0, TrendDirection::Up),
            frame(50.0, TrendDirection::Up),
        ];
        let outcome = simulator().run(&bars, &frames);

        assert_eq!(outcome.trades.len(), 2);
        // +10% on 1000 then -1% on 1100
        assert!((outcome.trades[0].pl_value - 100.0).abs() < 1e-9);
        assert!((outcome.trades[1].pl_value + 11.0).abs() < 1e-9);
        assert!((outcome.final_balance - 1_089.0).abs() < 1e-9);
        assert_eq!(outcome.balance_curve.len(), 2);
        assert_eq!(outcome.bars_processed, 4);
        assert_eq!(outcome.bars_skipped, 0);
    }

    #[test]
    fn run_flushes_at_last_evaluated_bar() {
        let bars = vec![bar(0, 100.0), bar(1, 101.0)];
        let frames = vec![frame(25.0, TrendDirection::Up), frame(50.0, TrendDirection::Up)];
        let outcome = simulator().run(&bars, &frames);

        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].exit_reason, ExitReason::EndOfData);
        assert_eq!(outcome.trades[0].exit_price, 101.0);
    }

    #[test]
    fn observer_sees_every_transition() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let sim = simulator().with_observer(Box::new(move |e: &SimulationEvent| {
            sink.borrow_mut().push(e.clone());
        }));

        let bars = vec![bar(0, 100.0), bar(1, 95.0)];
        let frames = vec![frame(25.0, TrendDirection::Up), frame(50.0, TrendDirection::Up)];
        let outcome = sim.run(&bars, &frames);

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SimulationEvent::Entered { price, .. } if price == 100.0));
        assert_eq!(events[1], SimulationEvent::Exited(outcome.trades[0].clone()));
    }
}
