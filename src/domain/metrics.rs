//! Summary statistics over a finished backtest.

use std::collections::HashMap;

use super::backtest::BacktestResult;
use super::position::{ExitReason, TradeResult};
use super::simulator::BalancePoint;

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pl: f64,
    pub starting_balance: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub avg_holding_hours: f64,
    pub exits_by_reason: HashMap<ExitReason, usize>,
}

impl Summary {
    pub fn compute(result: &BacktestResult) -> Self {
        let trades = &result.trades;
        let starting_balance = result.initial_balance;

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_holding_minutes = 0i64;
        let mut exits_by_reason = HashMap::new();

        for trade in trades {
            let pnl = trade.pl_value;
            match trade.result {
                TradeResult::Win => {
                    winning_trades += 1;
                    total_wins += pnl;
                    largest_win = largest_win.max(pnl);
                }
                TradeResult::Loss => {
                    losing_trades += 1;
                    total_losses += pnl.abs();
                    largest_loss = largest_loss.max(pnl.abs());
                }
            }
            total_holding_minutes += trade.holding_time().num_minutes();
            *exits_by_reason.entry(trade.exit_reason).or_insert(0) += 1;
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        // Same left-to-right order the simulator applies, so the sum is exact.
        let final_balance = trades
            .iter()
            .fold(starting_balance, |balance, t| balance + t.pl_value);
        let total_pl = final_balance - starting_balance;

        let total_return = if starting_balance > 0.0 {
            total_pl / starting_balance
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if winning_trades > 0 {
            total_wins / winning_trades as f64
        } else {
            0.0
        };

        let avg_loss = if losing_trades > 0 {
            total_losses / losing_trades as f64
        } else {
            0.0
        };

        let avg_holding_hours = if total_trades > 0 {
            total_holding_minutes as f64 / 60.0 / total_trades as f64
        } else {
            0.0
        };

        Summary {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            total_pl,
            starting_balance,
            final_balance,
            total_return,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            profit_factor,
            max_drawdown: compute_drawdown(starting_balance, &result.balance_curve),
            avg_holding_hours,
            exits_by_reason,
        }
    }

    pub fn exits(&self, reason: ExitReason) -> usize {
        self.exits_by_reason.get(&reason).copied().unwrap_or(0)
    }
}

/// Largest peak-to-trough decline of the realized balance, as a fraction.
fn compute_drawdown(starting_balance: f64, curve: &[BalancePoint]) -> f64 {
    let mut peak = starting_balance;
    let mut max_dd = 0.0_f64;

    for point in curve {
        if point.balance > peak {
            peak = point.balance;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.balance) / peak);
        }
    }

    max_dd
}
