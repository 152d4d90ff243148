//! Technical indicator implementations.
//!
//! This module provides the types shared by every indicator and the
//! [`compute`] entry point that enriches a bar sequence with the full signal
//! set consumed by the simulator:
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: an index-aligned series, `None` during warm-up
//! - `IndicatorFrame`: one row of signals per bar

pub mod ema;
pub mod rsi;
pub mod sma;
pub mod supertrend;

use std::fmt;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Supertrend { period: usize, multiplier_x100: u32 },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Supertrend {
                period,
                multiplier_x100,
            } => {
                let mult = *multiplier_x100 as f64 / 100.0;
                write!(f, "SUPERTREND({},{})", period, mult)
            }
        }
    }
}

/// Supertrend regime. Entries are only taken while `Up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub ma_period: usize,
    pub fast_period: usize,
    pub slow_period: usize,
    pub supertrend_atr_period: usize,
    pub supertrend_multiplier: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            rsi_period: 7,
            ma_period: 500,
            fast_period: 11,
            slow_period: 9,
            supertrend_atr_period: 10,
            supertrend_multiplier: 3.0,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        let periods = [
            ("rsi_period", self.rsi_period),
            ("ma_period", self.ma_period),
            ("fast_period", self.fast_period),
            ("slow_period", self.slow_period),
            ("supertrend_atr_period", self.supertrend_atr_period),
        ];
        for (key, period) in periods {
            if period == 0 {
                return Err(TraderError::invalid(
                    "indicators",
                    key,
                    format!("{} must be a positive integer", key),
                ));
            }
        }
        if !(self.supertrend_multiplier.is_finite() && self.supertrend_multiplier > 0.0) {
            return Err(TraderError::invalid(
                "indicators",
                "supertrend_multiplier",
                "supertrend_multiplier must be positive",
            ));
        }
        Ok(())
    }

    /// Number of leading bars on which at least one decision field is
    /// undefined: the SMA window, or the single RSI bar without a delta.
    pub fn warmup_bars(&self) -> usize {
        self.ma_period.saturating_sub(1).max(1)
    }
}

/// Signals for one bar, index-aligned with the input sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub ma: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub supertrend_value: Option<f64>,
    pub supertrend_direction: TrendDirection,
    pub rsi: Option<f64>,
}

impl IndicatorFrame {
    /// True when every field the simulator decides on is defined.
    pub fn is_complete(&self) -> bool {
        self.ma.is_some()
            && self.ema_fast.is_some()
            && self.ema_slow.is_some()
            && self.supertrend_value.is_some()
            && self.rsi.is_some()
    }
}

/// Compute the full signal set for every bar.
///
/// Fails with `InvalidConfig` before touching the data, and with
/// `InsufficientData` when the sequence is empty or too short to yield a
/// single complete frame.
pub fn compute(bars: &[Bar], config: &IndicatorConfig) -> Result<Vec<IndicatorFrame>, TraderError> {
    config.validate()?;

    let minimum = config.warmup_bars() + 1;
    if bars.len() < minimum {
        return Err(TraderError::InsufficientData {
            bars: bars.len(),
            minimum,
        });
    }

    if let Some(i) = bars
        .windows(2)
        .position(|w| w[1].close_time <= w[0].close_time)
    {
        log::warn!(
            "bar close times are not strictly increasing at index {} ({} after {})",
            i + 1,
            bars[i + 1].close_time,
            bars[i].close_time
        );
    }

    let ma = sma::calculate_sma(bars, config.ma_period);
    let ema_fast = ema::calculate_ema(bars, config.fast_period);
    let ema_slow = ema::calculate_ema(bars, config.slow_period);
    let rsi = rsi::calculate_rsi(bars, config.rsi_period);
    let trend = supertrend::calculate_supertrend(
        bars,
        config.supertrend_atr_period,
        config.supertrend_multiplier,
    );

    log::debug!(
        "computed {}, {}, {}, {}, {} over {} bars",
        ma.indicator_type,
        ema_fast.indicator_type,
        ema_slow.indicator_type,
        rsi.indicator_type,
        supertrend::indicator_type(config.supertrend_atr_period, config.supertrend_multiplier),
        bars.len()
    );

    let frames = (0..bars.len())
        .map(|i| IndicatorFrame {
            ma: ma.values[i],
            ema_fast: ema_fast.values[i],
            ema_slow: ema_slow.values[i],
            supertrend_value: Some(trend[i].value),
            supertrend_direction: trend[i].direction,
            rsi: rsi.values[i],
        })
        .collect();

    Ok(frames)
}
