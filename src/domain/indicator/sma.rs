//! Simple Moving Average indicator.
//!
//! SMA(n)[i] = sum(C[i-j] for j in 0..n) / n
//! Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Sma(period),
            values: vec![None; bars.len()],
        };
    }

    let values = (0..bars.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &bars[i + 1 - period..=i];
            Some(window.iter().map(|b| b.close).sum::<f64>() / period as f64)
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}
