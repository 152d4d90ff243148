//! OHLC candle representation.

use chrono::NaiveDateTime;

/// One candle, keyed by its close time.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub close_time: NaiveDateTime,
}

impl Bar {
    /// (high + low) / 2
    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}
