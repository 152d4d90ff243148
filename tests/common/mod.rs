#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rsitrend::domain::backtest::BacktestResult;
use rsitrend::domain::error::TraderError;
pub use rsitrend::domain::indicator::{IndicatorFrame, TrendDirection};
pub use rsitrend::domain::ohlcv::Bar;
use rsitrend::ports::data_port::DataPort;
use rsitrend::ports::report_port::ReportPort;
use std::cell::RefCell;

pub struct MockDataPort {
    pub bars: Vec<Bar>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars, error: None }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            bars: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, TraderError> {
        if let Some(reason) = &self.error {
            return Err(TraderError::DataRead {
                reason: reason.clone(),
            });
        }
        Ok(self
            .bars
            .iter()
            .filter(|b| start.is_none_or(|s| b.close_time >= s))
            .filter(|b| end.is_none_or(|e| b.close_time <= e))
            .cloned()
            .collect())
    }

    fn data_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TraderError> {
        Ok(match (self.bars.first(), self.bars.last()) {
            (Some(first), Some(last)) => Some((first.close_time, last.close_time, self.bars.len())),
            _ => None,
        })
    }
}

pub struct MockReportPort {
    pub calls: RefCell<Vec<(BacktestResult, String)>>,
}

impl MockReportPort {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ReportPort for MockReportPort {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), TraderError> {
        self.calls
            .borrow_mut()
            .push((result.clone(), output_path.to_string()));
        Ok(())
    }
}

pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_milli_opt(0, 0, 59, 999)
        .unwrap()
}

/// One-minute bar `i` minutes after the base time.
pub fn bar(i: i64, close: f64) -> Bar {
    Bar {
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        close_time: base_time() + Duration::minutes(i),
    }
}

/// Bar `i` hours after the base time.
pub fn hourly_bar(i: i64, close: f64) -> Bar {
    Bar {
        close_time: base_time() + Duration::hours(i),
        ..bar(0, close)
    }
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| bar(i as i64, c))
        .collect()
}

/// A frame where every entry filter passes except possibly RSI.
pub fn frame(rsi: f64) -> IndicatorFrame {
    IndicatorFrame {
        ma: Some(1.0),
        ema_fast: Some(2.0),
        ema_slow: Some(1.0),
        supertrend_value: Some(0.5),
        supertrend_direction: TrendDirection::Up,
        rsi: Some(rsi),
    }
}

pub fn down_frame(rsi: f64) -> IndicatorFrame {
    IndicatorFrame {
        supertrend_direction: TrendDirection::Down,
        ..frame(rsi)
    }
}

pub fn warmup_frame() -> IndicatorFrame {
    IndicatorFrame {
        ma: None,
        ema_fast: Some(1.0),
        ema_slow: Some(1.0),
        supertrend_value: Some(1.0),
        supertrend_direction: TrendDirection::Up,
        rsi: None,
    }
}

/// Deterministic zig-zag price path with a slow drift.
pub fn zigzag_closes(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let swing = match i % 7 {
                0 => 0.0,
                1 => 1.5,
                2 => -2.0,
                3 => 0.8,
                4 => -3.1,
                5 => 2.4,
                _ => -0.6,
            };
            100.0 + (i as f64) * 0.05 + swing
        })
        .collect()
}
