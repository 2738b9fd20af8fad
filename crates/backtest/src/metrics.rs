//! Realized performance of a run.
//!
//! Every closed lot is one trade. Figures are computed from realized records
//! only, so open holdings do not move them.

use lotbook_core::{RealizedRecord, Timestamp};
use serde::Serialize;

/// Summary of the realized records of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BacktestMetrics {
    pub closed_lots: u32,
    pub winning_lots: u32,
    /// Lots closed at a loss or flat.
    pub losing_lots: u32,
    /// Share of winning lots, 0 to 1.
    pub win_rate: f64,
    /// Sum of realized P&L, commission excluded.
    pub net_pnl: f64,
    pub bought_notional: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// Gross wins over gross losses.
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    /// Mean over deviation of per-lot returns, not annualized.
    pub sharpe: f64,
    /// As `sharpe`, against downside deviation only.
    pub sortino: f64,
    /// Net P&L as a percentage of starting cash.
    pub return_pct: f64,
    pub avg_holding_min: f64,
    pub best_lot: f64,
    pub worst_lot: f64,
    pub longest_win_streak: u32,
    pub longest_loss_streak: u32,
}

/// Equity after one closed lot.
#[derive(Debug, Clone, Serialize)]
pub struct EquityPoint {
    /// Close time of the trade, `None` for the starting point.
    pub ts: Option<Timestamp>,
    pub equity: f64,
    pub drawdown: f64,
    pub drawdown_pct: f64,
}

/// Computes [`BacktestMetrics`] against a starting cash amount.
pub struct MetricsCalculator {
    initial_capital: f64,
}

impl MetricsCalculator {
    pub fn new(initial_capital: f64) -> Self {
        Self { initial_capital }
    }

    /// Calculate metrics from realized records.
    pub fn calculate(&self, records: &[RealizedRecord]) -> BacktestMetrics {
        if records.is_empty() {
            return BacktestMetrics::default();
        }

        let pnls: Vec<f64> = records.iter().map(RealizedRecord::pnl).collect();
        let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p <= 0.0).collect();
        let won: f64 = wins.iter().sum();
        let lost: f64 = losses.iter().map(|p| p.abs()).sum();
        let held_secs: i64 = records
            .iter()
            .map(|r| r.holding_period().num_seconds())
            .sum();
        let (longest_win_streak, longest_loss_streak) = longest_streaks(&pnls);
        let net_pnl: f64 = pnls.iter().sum();
        let n = records.len() as f64;

        let (max_drawdown, max_drawdown_pct) = self
            .build_equity_curve(records)
            .iter()
            .fold((0.0, 0.0), |worst, point| {
                if point.drawdown > worst.0 {
                    (point.drawdown, point.drawdown_pct)
                } else {
                    worst
                }
            });

        let returns: Vec<f64> = records.iter().map(|r| r.return_pct() / 100.0).collect();

        BacktestMetrics {
            closed_lots: records.len() as u32,
            winning_lots: wins.len() as u32,
            losing_lots: losses.len() as u32,
            win_rate: wins.len() as f64 / n,
            net_pnl,
            bought_notional: records.iter().map(|r| r.buy_price * r.volume).sum(),
            avg_win: mean(&wins),
            avg_loss: mean(&losses),
            profit_factor: if lost > 0.0 {
                won / lost
            } else if won > 0.0 {
                f64::INFINITY
            } else {
                0.0
            },
            max_drawdown,
            max_drawdown_pct,
            sharpe: calculate_sharpe(&returns),
            sortino: calculate_sortino(&returns),
            return_pct: if self.initial_capital > 0.0 {
                net_pnl / self.initial_capital * 100.0
            } else {
                0.0
            },
            avg_holding_min: held_secs as f64 / n / 60.0,
            best_lot: wins.iter().copied().fold(0.0, f64::max),
            worst_lot: losses.iter().copied().fold(0.0, f64::min),
            longest_win_streak,
            longest_loss_streak,
        }
    }

    /// Build the realized equity curve, one point per closed lot.
    pub fn build_equity_curve(&self, records: &[RealizedRecord]) -> Vec<EquityPoint> {
        let mut curve = Vec::with_capacity(records.len() + 1);

        curve.push(EquityPoint {
            ts: None,
            equity: self.initial_capital,
            drawdown: 0.0,
            drawdown_pct: 0.0,
        });

        let mut equity = self.initial_capital;
        let mut peak = self.initial_capital;

        for record in records {
            equity += record.pnl();
            peak = peak.max(equity);

            let drawdown = peak - equity;
            let drawdown_pct = if peak > 0.0 {
                (drawdown / peak) * 100.0
            } else {
                0.0
            };

            curve.push(EquityPoint {
                ts: Some(record.closed_at),
                equity,
                drawdown,
                drawdown_pct,
            });
        }

        curve
    }
}

/// Longest runs of winning and of non-winning trades.
fn longest_streaks(pnls: &[f64]) -> (u32, u32) {
    let (mut wins, mut losses) = (0u32, 0u32);
    let (mut best_wins, mut best_losses) = (0u32, 0u32);
    for &pnl in pnls {
        if pnl > 0.0 {
            wins += 1;
            losses = 0;
        } else {
            losses += 1;
            wins = 0;
        }
        best_wins = best_wins.max(wins);
        best_losses = best_losses.max(losses);
    }
    (best_wins, best_losses)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Mean over standard deviation of per-trade returns.
fn calculate_sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let avg = mean(returns);
    let std_dev = returns.iter().map(|r| (r - avg).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = std_dev.sqrt();
    if std_dev > 0.0 {
        avg / std_dev
    } else {
        0.0
    }
}

/// Mean over downside deviation of per-trade returns.
fn calculate_sortino(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let avg = mean(returns);
    let downside = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum::<f64>();
    let downside_dev = (downside / returns.len() as f64).sqrt();
    if downside_dev > 0.0 {
        avg / downside_dev
    } else if avg > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};
    use lotbook_core::LotId;

    fn make_record(pnl: f64, held_secs: i64) -> RealizedRecord {
        let opened = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        RealizedRecord {
            lot_id: LotId(1),
            symbol: "AAPL".to_string(),
            volume: 10.0,
            buy_price: 100.0,
            sell_price: 100.0 + pnl / 10.0,
            opened_at: opened,
            closed_at: opened + Duration::seconds(held_secs),
        }
    }

    #[test]
    fn test_win_loss_breakdown() {
        let calculator = MetricsCalculator::new(10_000.0);

        let records = vec![
            make_record(100.0, 60),  // Win
            make_record(-50.0, 120), // Loss
            make_record(75.0, 180),  // Win
        ];

        let metrics = calculator.calculate(&records);

        assert_eq!(metrics.closed_lots, 3);
        assert_eq!(metrics.winning_lots, 2);
        assert_eq!(metrics.losing_lots, 1);
        assert_relative_eq!(metrics.win_rate, 2.0 / 3.0);
        assert_relative_eq!(metrics.net_pnl, 125.0, epsilon = 1e-9);
        assert_relative_eq!(metrics.avg_win, 87.5, epsilon = 1e-9);
        assert_relative_eq!(metrics.avg_loss, -50.0, epsilon = 1e-9);
        assert_relative_eq!(metrics.profit_factor, 3.5, epsilon = 1e-9);
        assert_relative_eq!(metrics.avg_holding_min, 2.0);
        assert_relative_eq!(metrics.return_pct, 1.25, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_records() {
        let calculator = MetricsCalculator::new(10_000.0);
        let metrics = calculator.calculate(&[]);

        assert_eq!(metrics.closed_lots, 0);
        assert_eq!(metrics.net_pnl, 0.0);
    }

    #[test]
    fn test_equity_curve() {
        let calculator = MetricsCalculator::new(10_000.0);

        let records = vec![
            make_record(100.0, 60),
            make_record(-150.0, 120), // Creates drawdown
            make_record(200.0, 180),
        ];

        let curve = calculator.build_equity_curve(&records);

        assert_eq!(curve.len(), records.len() + 1);
        assert!(curve[0].ts.is_none());
        assert_relative_eq!(curve[1].equity, 10100.0, epsilon = 1e-9);
        assert_relative_eq!(curve[2].equity, 9950.0, epsilon = 1e-9);
        assert_relative_eq!(curve[2].drawdown, 150.0, epsilon = 1e-9);

        let metrics = calculator.calculate(&records);
        assert_relative_eq!(metrics.max_drawdown, 150.0, epsilon = 1e-9);
    }

    #[test]
    fn test_streaks() {
        let calculator = MetricsCalculator::new(10_000.0);

        let records = vec![
            make_record(10.0, 1),
            make_record(10.0, 2),
            make_record(10.0, 3), // 3 consecutive wins
            make_record(-5.0, 4),
            make_record(-5.0, 5), // 2 consecutive losses
        ];

        let metrics = calculator.calculate(&records);

        assert_eq!(metrics.longest_win_streak, 3);
        assert_eq!(metrics.longest_loss_streak, 2);
        assert!(metrics.sharpe > 0.0);
    }
}
