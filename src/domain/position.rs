//! Position state, closed trades and re-entry cooldown.

use chrono::{Duration, NaiveDateTime};
use std::fmt;

/// An open long position.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub stop_loss_price: f64,
    pub balance_at_entry: f64,
}

impl OpenPosition {
    pub fn new(
        entry_price: f64,
        entry_time: NaiveDateTime,
        stop_loss_pct: f64,
        balance_at_entry: f64,
    ) -> Self {
        OpenPosition {
            entry_price,
            entry_time,
            stop_loss_price: entry_price * (1.0 - stop_loss_pct),
            balance_at_entry,
        }
    }

    /// (price - entry) / entry
    pub fn unrealized_pl_pct(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        price <= self.stop_loss_price
    }

    /// Realize the position at `exit_price`.
    pub fn close(
        &self,
        exit_price: f64,
        exit_time: NaiveDateTime,
        exit_reason: ExitReason,
    ) -> Trade {
        let pl_pct = self.unrealized_pl_pct(exit_price);
        let pl_value = pl_pct * self.balance_at_entry;
        Trade {
            entry_time: self.entry_time,
            entry_price: self.entry_price,
            exit_time,
            exit_price,
            pl_pct,
            pl_value,
            result: if pl_value > 0.0 {
                TradeResult::Win
            } else {
                TradeResult::Loss
            },
            exit_reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long(OpenPosition),
}

impl PositionState {
    pub fn is_long(&self) -> bool {
        matches!(self, PositionState::Long(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeResult {
    Win,
    Loss,
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeResult::Win => write!(f, "Win"),
            TradeResult::Loss => write!(f, "Loss"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    RsiExit,
    SupertrendExit,
    StopLoss,
    EndOfData,
}

impl ExitReason {
    pub const ALL: [ExitReason; 4] = [
        ExitReason::RsiExit,
        ExitReason::SupertrendExit,
        ExitReason::StopLoss,
        ExitReason::EndOfData,
    ];
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::RsiExit => write!(f, "RSI exit"),
            ExitReason::SupertrendExit => write!(f, "Supertrend exit"),
            ExitReason::StopLoss => write!(f, "Stop loss"),
            ExitReason::EndOfData => write!(f, "End of data"),
        }
    }
}

/// One completed round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub pl_pct: f64,
    pub pl_value: f64,
    pub result: TradeResult,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn holding_time(&self) -> Duration {
        self.exit_time - self.entry_time
    }
}

/// Re-entry suppression after an exit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CooldownState {
    pub last_exit_time: Option<NaiveDateTime>,
    pub last_exit_price: Option<f64>,
}

impl CooldownState {
    pub fn record_exit(&mut self, time: NaiveDateTime, price: f64) {
        self.last_exit_time = Some(time);
        self.last_exit_price = Some(price);
    }

    /// Re-entry is blocked while `now` lies in `[exit, exit + hold]` and the
    /// price has not dropped below the last exit price.
    pub fn blocks_entry(&self, now: NaiveDateTime, close: f64, hold: Duration) -> bool {
        match (self.last_exit_time, self.last_exit_price) {
            (Some(exit_time), Some(exit_price)) => {
                // A window that runs past the representable range never ends.
                let cooling = now >= exit_time
                    && exit_time
                        .checked_add_signed(hold)
                        .is_none_or(|until| now <= until);
                cooling && close >= exit_price
            }
            _ => false,
        }
    }
}
