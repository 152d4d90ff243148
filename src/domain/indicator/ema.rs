//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seeded with the first close, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! No warmup: defined from the first bar.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::exponential_smooth;
use crate::domain::ohlcv::Bar;

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values: vec![None; bars.len()],
        };
    }

    let k = 2.0 / (period as f64 + 1.0);
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values: exponential_smooth(&closes, k).into_iter().map(Some).collect(),
    }
}
