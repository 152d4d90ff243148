//! Binance kline CSV data adapter.
//!
//! Reads the headerless exports produced by Binance's historical data
//! dumps: `open_time,open,high,low,close,volume,close_time,...`. Extra
//! trailing columns are ignored and a leading header row is skipped.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDateTime};
use std::path::PathBuf;

const OPEN_COL: usize = 1;
const HIGH_COL: usize = 2;
const LOW_COL: usize = 3;
const CLOSE_COL: usize = 4;
const CLOSE_TIME_COL: usize = 6;

/// Epoch values at or above this are microseconds rather than milliseconds.
const MICROS_THRESHOLD: i64 = 100_000_000_000_000;

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> Result<Vec<Bar>, TraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| TraderError::DataRead {
                reason: format!("failed to read {}: {}", self.path.display(), e),
            })?;

        let mut bars = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let line = idx + 1;
            let record = result.map_err(|e| TraderError::DataRead {
                reason: format!("CSV parse error: {}", e),
            })?;

            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            if idx == 0 && is_header(&record) {
                continue;
            }

            bars.push(parse_bar(&record, line)?);
        }

        bars.sort_by_key(|b| b.close_time);
        Ok(bars)
    }
}

fn is_header(record: &csv::StringRecord) -> bool {
    record
        .get(0)
        .is_some_and(|field| field.parse::<f64>().is_err())
}

fn field<'r>(record: &'r csv::StringRecord, col: usize, name: &str, line: usize) -> Result<&'r str, TraderError> {
    record.get(col).ok_or_else(|| TraderError::DataRead {
        reason: format!("line {}: missing {} column", line, name),
    })
}

fn price(record: &csv::StringRecord, col: usize, name: &str, line: usize) -> Result<f64, TraderError> {
    let raw = field(record, col, name, line)?;
    let value: f64 = raw.parse().map_err(|e| TraderError::DataRead {
        reason: format!("line {}: invalid {} value {:?}: {}", line, name, raw, e),
    })?;
    if !(value.is_finite() && value > 0.0) {
        return Err(TraderError::DataRead {
            reason: format!("line {}: {} must be a positive number, got {:?}", line, name, raw),
        });
    }
    Ok(value)
}

/// Convert a Binance epoch timestamp (ms, or µs for newer spot dumps).
pub fn epoch_to_datetime(value: i64) -> Option<NaiveDateTime> {
    let dt = if value >= MICROS_THRESHOLD {
        DateTime::from_timestamp_micros(value)
    } else {
        DateTime::from_timestamp_millis(value)
    };
    dt.map(|d| d.naive_utc())
}

fn parse_bar(record: &csv::StringRecord, line: usize) -> Result<Bar, TraderError> {
    let raw_time = field(record, CLOSE_TIME_COL, "close_time", line)?;
    let close_time = raw_time
        .parse::<i64>()
        .ok()
        .and_then(epoch_to_datetime)
        .ok_or_else(|| TraderError::DataRead {
            reason: format!("line {}: invalid close_time {:?}", line, raw_time),
        })?;

    Ok(Bar {
        open: price(record, OPEN_COL, "open", line)?,
        high: price(record, HIGH_COL, "high", line)?,
        low: price(record, LOW_COL, "low", line)?,
        close: price(record, CLOSE_COL, "close", line)?,
        close_time,
    })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, TraderError> {
        let mut bars = self.read_all()?;
        bars.retain(|b| {
            start.is_none_or(|s| b.close_time >= s) && end.is_none_or(|e| b.close_time <= e)
        });
        Ok(bars)
    }

    fn data_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TraderError> {
        let bars = self.read_all()?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.close_time, last.close_time, bars.len())),
            _ => None,
        })
    }
}
