//! RSI (Relative Strength Index) indicator implementation.
//!
//! Gains and loss magnitudes are smoothed exponentially with k = 2/(n+1),
//! both streams seeded with 0 on the first bar (which has no delta).
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: only the first bar is undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::exponential_smooth;
use crate::domain::ohlcv::Bar;

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values: vec![None; bars.len()],
        };
    }

    let mut gains = Vec::with_capacity(bars.len());
    let mut losses = Vec::with_capacity(bars.len());
    for i in 0..bars.len() {
        let change = if i == 0 {
            0.0
        } else {
            bars[i].close - bars[i - 1].close
        };
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let k = 2.0 / (period as f64 + 1.0);
    let avg_gain = exponential_smooth(&gains, k);
    let avg_loss = exponential_smooth(&losses, k);

    let values = (0..bars.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            Some(rsi_from_averages(avg_gain[i], avg_loss[i]))
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn make_bars(prices: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                open: close,
                high: close,
                low: close,
                close,
                close_time: start + Duration::minutes(i as i64),
            })
            .collect()
    }

    #[test]
    fn rsi_empty_bars() {
        let series = calculate_rsi(&[], 7);
        assert!(series.values.is_empty());
    }

    #[test]
    fn rsi_single_bar_undefined() {
        let series = calculate_rsi(&make_bars(&[100.0]), 7);
        assert_eq!(series.values, vec![None]);
    }

    #[test]
    fn rsi_defined_after_first_bar() {
        let bars = make_bars(&[100.0, 101.0, 99.0, 102.0]);
        let series = calculate_rsi(&bars, 14);
        assert!(series.values[0].is_none());
        assert!(series.values[1..].iter().all(|v| v.is_some()));
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&make_bars(&prices), 7);
        for v in &series.values[1..] {
            assert!((v.unwrap() - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&make_bars(&prices), 7);
        for v in &series.values[1..] {
            assert!(v.unwrap().abs() < f64::EPSILON);
        }
    }

    #[test]
    fn rsi_flat_prices_is_100() {
        let series = calculate_rsi(&make_bars(&[50.0, 50.0, 50.0]), 7);
        assert_eq!(series.values[1], Some(100.0));
        assert_eq!(series.values[2], Some(100.0));
    }

    #[test]
    fn rsi_known_calculation() {
        // period 3 => k = 0.5; streams seeded at 0
        let bars = make_bars(&[10.0, 12.0, 11.0]);
        let series = calculate_rsi(&bars, 3);

        // bar 1: gain 2 => avg_gain 1.0, avg_loss 0 => 100
        assert_eq!(series.values[1], Some(100.0));

        // bar 2: loss 1 => avg_gain 0.5, avg_loss 0.5 => RS 1 => 50
        assert!((series.values[2].unwrap() - 50.0).abs() < 1e-12);
    }

    #[test]
    fn rsi_in_range() {
        let prices: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        let series = calculate_rsi(&make_bars(&prices), 7);
        for v in series.values.iter().flatten() {
            assert!((0.0..=100.0).contains(v), "RSI {} out of range", v);
        }
    }

    #[test]
    fn rsi_zero_period() {
        let series = calculate_rsi(&make_bars(&[100.0, 101.0]), 0);
        assert!(series.values.iter().all(|v| v.is_none()));
        assert_eq!(series.indicator_type, IndicatorType::Rsi(0));
    }
}
