//! CSV trade-log adapter implementing ReportPort.
//!
//! One row per closed trade, in exit order. `pl_pct` is written in percent.

use std::fs;
use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::TraderError;
use crate::domain::position::Trade;
use crate::ports::report_port::ReportPort;

pub const HEADER: [&str; 8] = [
    "entry_time",
    "entry_price",
    "exit_time",
    "exit_price",
    "pl_pct",
    "pl_value",
    "result",
    "exit_reason",
];

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn trade_row(trade: &Trade) -> [String; 8] {
    [
        trade.entry_time.format(TIME_FORMAT).to_string(),
        trade.entry_price.to_string(),
        trade.exit_time.format(TIME_FORMAT).to_string(),
        trade.exit_price.to_string(),
        format!("{:.4}", trade.pl_pct * 100.0),
        format!("{:.6}", trade.pl_value),
        trade.result.to_string(),
        trade.exit_reason.to_string(),
    ]
}

fn report_err(e: csv::Error) -> TraderError {
    TraderError::Report {
        reason: e.to_string(),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), TraderError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(TraderError::Io)?;
            }
        }

        let mut wtr = csv::Writer::from_path(path).map_err(report_err)?;
        wtr.write_record(HEADER).map_err(report_err)?;
        for trade in &result.trades {
            wtr.write_record(trade_row(trade)).map_err(report_err)?;
        }
        wtr.flush().map_err(TraderError::Io)?;

        log::info!("wrote {} trades to {}", result.trades.len(), output_path);
        Ok(())
    }
}
