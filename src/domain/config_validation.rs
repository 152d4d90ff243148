//! Configuration validation.
//!
//! Validates raw config values before a typed `BacktestConfig` is built, so
//! problems are reported against the section and key the user wrote.

use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveDate, NaiveDateTime};

pub const PERIOD_KEYS: [&str; 5] = [
    "rsi_period",
    "ma_period",
    "fast_period",
    "slow_period",
    "supertrend_atr_period",
];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_initial_balance(config)?;
    validate_fraction(config, "stop_loss_pct")?;
    validate_fraction(config, "profit_target_pct")?;
    validate_hold_hours(config)?;
    validate_periods(config)?;
    validate_multiplier(config)?;
    validate_rsi_thresholds(config)?;
    validate_dates(config)?;
    Ok(())
}

/// Parse `YYYY-MM-DD HH:MM:SS` or a bare `YYYY-MM-DD` (midnight).
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, TraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| TraderError::invalid(section, key, format!("{} must be a number", key))),
    }
}

fn validate_initial_balance(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if let Some(value) = number(config, "backtest", "initial_balance")? {
        if value <= 0.0 {
            return Err(TraderError::invalid(
                "backtest",
                "initial_balance",
                "initial_balance must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_fraction(config: &dyn ConfigPort, key: &str) -> Result<(), TraderError> {
    if let Some(value) = number(config, "backtest", key)? {
        if value <= 0.0 || value >= 1.0 {
            return Err(TraderError::invalid(
                "backtest",
                key,
                format!("{} must be between 0 and 1 (exclusive)", key),
            ));
        }
    }
    Ok(())
}

fn validate_hold_hours(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if let Some(value) = number(config, "backtest", "sell_price_hold_hours")? {
        if value < 0.0 {
            return Err(TraderError::invalid(
                "backtest",
                "sell_price_hold_hours",
                "sell_price_hold_hours must be non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_periods(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for key in PERIOD_KEYS {
        let Some(raw) = config.get_string("indicators", key) else {
            continue;
        };
        match raw.trim().parse::<i64>() {
            Ok(value) if value > 0 => {}
            Ok(_) => {
                return Err(TraderError::invalid(
                    "indicators",
                    key,
                    format!("{} must be a positive integer", key),
                ));
            }
            Err(_) => {
                return Err(TraderError::invalid(
                    "indicators",
                    key,
                    format!("{} must be an integer", key),
                ));
            }
        }
    }
    Ok(())
}

fn validate_multiplier(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if let Some(value) = number(config, "indicators", "supertrend_multiplier")? {
        if value <= 0.0 {
            return Err(TraderError::invalid(
                "indicators",
                "supertrend_multiplier",
                "supertrend_multiplier must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_rsi_thresholds(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let oversold = number(config, "strategy", "rsi_oversold")?.unwrap_or(30.0);
    let overbought = number(config, "strategy", "rsi_overbought")?.unwrap_or(70.0);

    for (key, value) in [("rsi_oversold", oversold), ("rsi_overbought", overbought)] {
        if !(0.0..=100.0).contains(&value) {
            return Err(TraderError::invalid(
                "strategy",
                key,
                format!("{} must be between 0 and 100", key),
            ));
        }
    }
    if oversold >= overbought {
        return Err(TraderError::invalid(
            "strategy",
            "rsi_oversold",
            "rsi_oversold must be below rsi_overbought",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let start = optional_date(config, "start")?;
    let end = optional_date(config, "end")?;

    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(TraderError::invalid(
                "backtest",
                "start",
                "start must be before end",
            ));
        }
    }
    Ok(())
}

fn optional_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDateTime>, TraderError> {
    match config.get_string("backtest", key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_datetime(&s).map(Some).ok_or_else(|| {
            TraderError::invalid(
                "backtest",
                key,
                format!("invalid {} format, expected YYYY-MM-DD[ HH:MM:SS]", key),
            )
        }),
    }
}
