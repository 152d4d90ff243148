//! Supertrend indicator (value + direction).
//!
//! Two chained forward scans over the bars:
//! 1. Final bands. basic = midpoint ± multiplier * ATR; the upper band only
//!    resets to its basic value once close breaks above the previous final
//!    upper band, otherwise it may only tighten (min). The lower band mirrors
//!    this with close below the previous final lower band and max.
//! 2. Direction and value. Close above the previous value selects the lower
//!    band and `Up`, close below selects the upper band and `Down`, an exact
//!    tie carries the previous point forward. The value never retreats: in
//!    `Up` a lower band below the previous value keeps the previous value, in
//!    `Down` an upper band above it does the same.
//!
//! No warmup: the recursion seeds at index 0 with `Up` on the lower band.

use crate::domain::indicator::{IndicatorType, TrendDirection};
use crate::domain::indicator_helpers::calc_atr;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupertrendPoint {
    pub value: f64,
    pub direction: TrendDirection,
    pub final_upper: f64,
    pub final_lower: f64,
}

pub fn indicator_type(period: usize, multiplier: f64) -> IndicatorType {
    IndicatorType::Supertrend {
        period,
        multiplier_x100: (multiplier * 100.0).round() as u32,
    }
}

pub fn calculate_supertrend(bars: &[Bar], period: usize, multiplier: f64) -> Vec<SupertrendPoint> {
    // A zero period leaves ATR undefined; bands collapse onto the midpoint.
    let atr: Vec<f64> = calc_atr(bars, period)
        .values
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect();

    let (upper, lower) = final_bands(bars, &atr, multiplier);

    let mut points: Vec<SupertrendPoint> = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            points.push(SupertrendPoint {
                value: lower[0],
                direction: TrendDirection::Up,
                final_upper: upper[0],
                final_lower: lower[0],
            });
            continue;
        }

        let prev = points[i - 1];
        let (direction, mut value) = if bar.close > prev.value {
            (TrendDirection::Up, lower[i])
        } else if bar.close < prev.value {
            (TrendDirection::Down, upper[i])
        } else {
            (prev.direction, prev.value)
        };

        match direction {
            TrendDirection::Up if lower[i] < prev.value => value = prev.value,
            TrendDirection::Down if upper[i] > prev.value => value = prev.value,
            _ => {}
        }

        points.push(SupertrendPoint {
            value,
            direction,
            final_upper: upper[i],
            final_lower: lower[i],
        });
    }

    points
}

fn final_bands(bars: &[Bar], atr: &[f64], multiplier: f64) -> (Vec<f64>, Vec<f64>) {
    let mut upper: Vec<f64> = Vec::with_capacity(bars.len());
    let mut lower: Vec<f64> = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let basic_upper = bar.midpoint() + multiplier * atr[i];
        let basic_lower = bar.midpoint() - multiplier * atr[i];

        if i == 0 {
            upper.push(basic_upper);
            lower.push(basic_lower);
            continue;
        }

        let prev_upper = upper[i - 1];
        let prev_lower = lower[i - 1];

        upper.push(if bar.close > prev_upper {
            basic_upper
        } else {
            basic_upper.min(prev_upper)
        });
        lower.push(if bar.close < prev_lower {
            basic_lower
        } else {
            basic_lower.max(prev_lower)
        });
    }

    (upper, lower)
}
