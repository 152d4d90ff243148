//! Shared helper functions for indicator calculations.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

/// Recursive exponential smoothing seeded with the first input:
/// out[0] = x[0], out[i] = alpha * x[i] + (1 - alpha) * out[i-1].
pub fn exponential_smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev = 0.0;
    for (i, &x) in values.iter().enumerate() {
        let next = if i == 0 {
            x
        } else {
            alpha * x + (1.0 - alpha) * prev
        };
        out.push(next);
        prev = next;
    }
    out
}

/// True range per bar. The first bar has no predecessor and is measured
/// against its own close, which reduces to high - low.
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let prev_close = if i == 0 { bar.close } else { bars[i - 1].close };
            bar.true_range(prev_close)
        })
        .collect()
}

/// Average true range smoothed with alpha = 1/period, defined from index 0.
pub fn calc_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Atr(period),
            values: vec![None; bars.len()],
        };
    }

    let atr = exponential_smooth(&true_ranges(bars), 1.0 / period as f64);

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values: atr.into_iter().map(Some).collect(),
    }
}
