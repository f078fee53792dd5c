//! Performance metrics for a backtest run.

use crate::domain::metric_value::{MetricValue, UndefinedReason};
use crate::domain::risk::compute_drawdown;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: f64,
    /// Net of entry and exit costs.
    pub pnl: f64,
    /// pnl / entry outlay
    pub return_pct: f64,
}

impl ClosedTrade {
    pub fn holding_days(&self) -> i64 {
        (self.exit_date - self.entry_date).num_days()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: MetricValue,
    pub sortino_ratio: MetricValue,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: MetricValue,
    pub profit_factor: MetricValue,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_trade_duration: f64,
}

impl Metrics {
    pub fn compute(
        equity_curve: &[f64],
        trades: &[ClosedTrade],
        initial_capital: f64,
        risk_free_rate: f64,
    ) -> Self {
        let final_equity = equity_curve.last().copied().unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            total_return
        };

        let drawdown = compute_drawdown(equity_curve);

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, daily_rf);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_duration_days = 0i64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_duration_days += trade.holding_days();
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            MetricValue::Defined(trades_won as f64 / total_trades as f64)
        } else {
            MetricValue::Undefined(UndefinedReason::NoClosedTrades)
        };

        let profit_factor = if total_trades == 0 {
            MetricValue::Undefined(UndefinedReason::NoClosedTrades)
        } else if total_losses > 0.0 {
            MetricValue::Defined(total_wins / total_losses)
        } else {
            MetricValue::Undefined(UndefinedReason::NoLosingTrades)
        };

        let avg = |sum: f64, n: usize| if n > 0 { sum / n as f64 } else { 0.0 };

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown: drawdown.depth,
            max_drawdown_duration: drawdown.longest_underwater,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win: avg(total_wins, trades_won),
            avg_loss: avg(total_losses, trades_lost),
            largest_win,
            largest_loss,
            avg_trade_duration: avg(total_duration_days as f64, total_trades),
        }
    }
}

fn compute_risk_adjusted(equity_curve: &[f64], daily_rf: f64) -> (MetricValue, MetricValue) {
    let undefined = MetricValue::Undefined(UndefinedReason::ZeroVolatility);
    if equity_curve.len() < 2 {
        return (undefined, undefined);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess_return = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        MetricValue::Defined((excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt())
    } else {
        undefined
    };

    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sq / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        MetricValue::Defined((excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt())
    } else {
        undefined
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trade(pnl: f64, days: i64) -> ClosedTrade {
        let entry = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ClosedTrade {
            entry_date: entry,
            exit_date: entry + chrono::Duration::days(days),
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 10.0,
            shares: 10.0,
            pnl,
            return_pct: pnl / 1000.0,
        }
    }

    #[test]
    fn metrics_empty_run() {
        let m = Metrics::compute(&[], &[], 100_000.0, 0.05);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.total_trades, 0);
        assert_eq!(
            m.win_rate,
            MetricValue::Undefined(UndefinedReason::NoClosedTrades)
        );
        assert!(!m.sharpe_ratio.is_defined());
    }

    #[test]
    fn metrics_total_return() {
        let m = Metrics::compute(&[100_000.0, 105_000.0, 110_000.0], &[], 100_000.0, 0.0);
        assert!((m.total_return - 0.10).abs() < 1e-12);
        let down = Metrics::compute(&[100_000.0, 90_000.0], &[], 100_000.0, 0.0);
        assert!((down.total_return + 0.10).abs() < 1e-12);
    }

    #[test]
    fn metrics_annualized_return() {
        let mut curve = vec![100_000.0; 252];
        curve[251] = 120_000.0;
        let m = Metrics::compute(&curve, &[], 100_000.0, 0.0);
        assert!((m.annualized_return - 0.20).abs() < 1e-9);
    }

    #[test]
    fn metrics_trade_stats() {
        let trades = vec![
            make_trade(500.0, 5),
            make_trade(-200.0, 3),
            make_trade(300.0, 10),
            make_trade(0.0, 2),
        ];
        let m = Metrics::compute(&[100_000.0], &trades, 100_000.0, 0.0);
        assert_eq!(m.trades_won, 2);
        assert_eq!(m.trades_lost, 1);
        assert_eq!(m.trades_breakeven, 1);
        assert_eq!(m.win_rate, MetricValue::Defined(0.5));
        assert_eq!(m.profit_factor, MetricValue::Defined(4.0));
        assert!((m.avg_win - 400.0).abs() < 1e-12);
        assert!((m.avg_loss - 200.0).abs() < 1e-12);
        assert_eq!(m.largest_win, 500.0);
        assert_eq!(m.largest_loss, 200.0);
        assert!((m.avg_trade_duration - 5.0).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_without_losses_is_undefined() {
        let m = Metrics::compute(&[1.0], &[make_trade(100.0, 1)], 1.0, 0.0);
        assert_eq!(
            m.profit_factor,
            MetricValue::Undefined(UndefinedReason::NoLosingTrades)
        );
    }

    #[test]
    fn metrics_max_drawdown() {
        let m = Metrics::compute(&[100.0, 120.0, 90.0, 95.0, 130.0], &[], 100.0, 0.0);
        assert!((m.max_drawdown - 0.25).abs() < 1e-12);
        assert_eq!(m.max_drawdown_duration, 2);
    }

    #[test]
    fn flat_equity_has_undefined_sharpe() {
        let m = Metrics::compute(&[100.0; 10], &[], 100.0, 0.0);
        assert_eq!(
            m.sharpe_ratio,
            MetricValue::Undefined(UndefinedReason::ZeroVolatility)
        );
    }

    #[test]
    fn rising_equity_has_positive_sharpe() {
        let curve: Vec<f64> = (0..30)
            .map(|i| 100.0 * (1.0 + 0.001 * i as f64 + if i % 2 == 0 { 0.0005 } else { 0.0 }))
            .collect();
        let m = Metrics::compute(&curve, &[], 100.0, 0.0);
        assert!(m.sharpe_ratio.value().unwrap() > 0.0);
    }
}
