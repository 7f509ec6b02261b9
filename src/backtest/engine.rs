//! The event-driven backtester: walks a signal-annotated bar table one
//! bar at a time, resolves stop/target exits pessimistically, executes
//! entries at the next bar's open, and produces trades, an equity
//! curve, and a metrics bundle.
use std::fmt;

use log::warn;

use crate::types::{
    BacktestResult, DataError, EquityPoint, ExitReason, MetricsBundle, PositionSide, Trade,
    UNBOUNDED_RATIO_CAP,
};
use crate::types::BarTable;

use super::config::BacktestConfig;
use super::risk::{PositionSizer, RiskConfig};

#[derive(Debug, Clone, PartialEq)]
pub enum BacktestError {
    Data(DataError),
    MissingColumn(&'static str),
    NonFiniteArithmetic { context: &'static str },
}

impl fmt::Display for BacktestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacktestError::Data(e) => write!(f, "{e}"),
            BacktestError::MissingColumn(name) => write!(f, "missing required column: {name}"),
            BacktestError::NonFiniteArithmetic { context } => {
                write!(f, "non-finite value reached {context}")
            }
        }
    }
}

impl std::error::Error for BacktestError {}

impl From<DataError> for BacktestError {
    fn from(e: DataError) -> Self {
        BacktestError::Data(e)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenTrade {
    side: PositionSide,
    entry_time: chrono::DateTime<chrono::Utc>,
    entry_index: usize,
    entry_price: f64,
    size: f64,
    stop: f64,
    target: f64,
}

/// Resolves a stop/target test against one bar's range, tie-breaking
/// same-bar hits by distance to that bar's open (ties favor the stop).
fn intrabar_exit(
    side: PositionSide,
    stop: f64,
    target: f64,
    bar_open: f64,
    bar_high: f64,
    bar_low: f64,
) -> Option<(f64, ExitReason)> {
    let (stop_hit, target_hit) = match side {
        PositionSide::Long => (bar_low <= stop, bar_high >= target),
        PositionSide::Short => (bar_high >= stop, bar_low <= target),
    };

    if stop_hit && target_hit {
        let d_stop = (bar_open - stop).abs();
        let d_target = (bar_open - target).abs();
        if d_stop <= d_target {
            Some((stop, ExitReason::Sl))
        } else {
            Some((target, ExitReason::Tp))
        }
    } else if stop_hit {
        Some((stop, ExitReason::Sl))
    } else if target_hit {
        Some((target, ExitReason::Tp))
    } else {
        None
    }
}

pub struct Backtester {
    pub config: BacktestConfig,
    pub risk: RiskConfig,
}

impl Backtester {
    pub fn new(config: BacktestConfig, risk: RiskConfig) -> Self {
        Self { config, risk }
    }

    fn close_trade(
        &self,
        trade: OpenTrade,
        exit_price: f64,
        reason: ExitReason,
        exit_index: usize,
        exit_time: chrono::DateTime<chrono::Utc>,
    ) -> Result<(Trade, f64), BacktestError> {
        // entry_price/exit_price recorded here are the exact bar open and
        // exact stop/target/close levels (spec.md §8 properties 3 and 4);
        // slippage is charged as a cost alongside fees, not as a price
        // adjustment, so it never perturbs those recorded levels.
        let gross = trade.side.sign() * (exit_price - trade.entry_price) * trade.size;
        let notional_leg_sum = trade.entry_price * trade.size + exit_price * trade.size;
        let fees = notional_leg_sum * self.config.fee_pct;
        let slippage_cost = notional_leg_sum * self.config.slippage_pct;
        let pnl = gross - fees - slippage_cost;
        if !pnl.is_finite() {
            warn!("non-finite pnl computed for trade entered at index {}", trade.entry_index);
            return Err(BacktestError::NonFiniteArithmetic { context: "trade pnl" });
        }

        let notional = trade.entry_price * trade.size;
        let pnl_pct = if notional != 0.0 { pnl / notional * 100.0 } else { 0.0 };

        let record = Trade {
            entry_time: trade.entry_time,
            exit_time,
            side: trade.side,
            entry_price: trade.entry_price,
            exit_price,
            size: trade.size,
            stop_loss: trade.stop,
            take_profit: trade.target,
            pnl,
            pnl_pct,
            duration_bars: exit_index - trade.entry_index,
            exit_reason: reason,
        };
        Ok((record, pnl))
    }

    /// Runs the full bar-by-bar simulation. Re-validates the bar table
    /// and the presence of `signal` (and `atr`, in ATR mode) before
    /// iterating; a missing-column error is raised before any bar is
    /// processed.
    pub fn run(&self, bars: &BarTable) -> Result<BacktestResult, BacktestError> {
        bars.validate()?;

        let mut required = vec!["signal"];
        if self.config.stop_target.requires_atr_column() {
            required.push("atr");
        }
        bars.require_columns(&required)?;

        let signal = bars
            .column("signal")
            .ok_or(BacktestError::MissingColumn("signal"))?
            .to_vec();

        let n = bars.len();
        let mut capital = self.config.initial_capital;
        let mut open_trade: Option<OpenTrade> = None;
        let mut pending_signal: Option<(f64, f64)> = None;
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(n);

        for i in 0..n {
            let bar_open = bars.open[i];
            let bar_high = bars.high[i];
            let bar_low = bars.low[i];
            let bar_close = bars.close[i];

            let mut reversal_consumed_signal = false;

            // Step 1: exit check against a trade carried in from a prior bar.
            if let Some(trade) = open_trade.take() {
                let exit = intrabar_exit(trade.side, trade.stop, trade.target, bar_open, bar_high, bar_low)
                    .or_else(|| {
                        let sig = signal[i];
                        let is_opposite = match trade.side {
                            PositionSide::Long => sig < 0.0,
                            PositionSide::Short => sig > 0.0,
                        };
                        if is_opposite {
                            reversal_consumed_signal = true;
                            Some((bar_close, ExitReason::SignalReversal))
                        } else {
                            None
                        }
                    });

                match exit {
                    Some((raw_exit_price, reason)) => {
                        let (record, pnl) = self.close_trade(trade, raw_exit_price, reason, i, bars.timestamp[i])?;
                        capital += pnl;
                        if !capital.is_finite() {
                            return Err(BacktestError::NonFiniteArithmetic { context: "capital" });
                        }
                        trades.push(record);
                    }
                    None => open_trade = Some(trade),
                }
            }
            let just_exited_carried = open_trade.is_none() && !trades.is_empty() && trades.last().map(|t| t.exit_time == bars.timestamp[i]).unwrap_or(false);

            // Step 2: entry execution at this bar's open.
            if open_trade.is_none() && !just_exited_carried {
                if let Some((sig, strength)) = pending_signal.take() {
                    if sig != 0.0 {
                        let side = if sig > 0.0 { PositionSide::Long } else { PositionSide::Short };
                        let allowed = side != PositionSide::Short || self.config.allow_short;
                        if allowed {
                            let entry_price = bar_open;
                            let atr = bars.atr_at(i);
                            if !self.config.stop_target.requires_atr_column() || atr.is_some() {
                                let (stop, target) =
                                    self.config.stop_target.stop_target(entry_price, side.sign(), atr);
                                let effective_risk = self.risk.risk_pct * strength;
                                let size = PositionSizer::size(
                                    capital,
                                    entry_price,
                                    stop,
                                    effective_risk,
                                    self.risk.max_position_pct,
                                );
                                if !size.is_finite() {
                                    return Err(BacktestError::NonFiniteArithmetic { context: "position size" });
                                }
                                if size > 0.0 {
                                    open_trade = Some(OpenTrade {
                                        side,
                                        entry_time: bars.timestamp[i],
                                        entry_index: i,
                                        entry_price,
                                        size,
                                        stop,
                                        target,
                                    });
                                }
                            }
                        }
                    }
                }
            }

            // Step 2b: a trade opened this bar can still hit its stop or
            // target within the remainder of this same bar's range.
            if let Some(trade) = open_trade {
                if trade.entry_index == i {
                    if let Some((raw_exit_price, reason)) =
                        intrabar_exit(trade.side, trade.stop, trade.target, bar_open, bar_high, bar_low)
                    {
                        let (record, pnl) = self.close_trade(trade, raw_exit_price, reason, i, bars.timestamp[i])?;
                        capital += pnl;
                        if !capital.is_finite() {
                            return Err(BacktestError::NonFiniteArithmetic { context: "capital" });
                        }
                        trades.push(record);
                        open_trade = None;
                    }
                }
            }

            // Step 3: signal capture for the next bar's entry.
            if open_trade.is_none() && !reversal_consumed_signal {
                let sig = signal[i];
                if sig != 0.0 {
                    pending_signal = Some((sig, bars.signal_strength_at(i)));
                }
            }

            // Step 4: equity recording.
            let unrealized = match &open_trade {
                Some(trade) => trade.side.sign() * (bar_close - trade.entry_price) * trade.size,
                None => 0.0,
            };
            let equity = capital + unrealized;
            if !equity.is_finite() {
                return Err(BacktestError::NonFiniteArithmetic { context: "equity" });
            }
            equity_curve.push(EquityPoint {
                timestamp: bars.timestamp[i],
                equity,
            });
        }

        // End of data: close any still-open trade at the final close.
        if let Some(trade) = open_trade.take() {
            let last = n - 1;
            let (record, pnl) =
                self.close_trade(trade, bars.close[last], ExitReason::EndOfData, last, bars.timestamp[last])?;
            capital += pnl;
            trades.push(record);
            if let Some(last_point) = equity_curve.last_mut() {
                last_point.equity = capital;
            }
        }

        let metrics = compute_metrics(&trades, &equity_curve, self.config.initial_capital, capital);

        Ok(BacktestResult {
            metrics,
            trades,
            equity_curve,
            parameters: Default::default(),
            symbol: None,
            timeframe: None,
        })
    }
}

fn compute_metrics(
    trades: &[Trade],
    equity_curve: &[EquityPoint],
    initial_capital: f64,
    final_capital: f64,
) -> MetricsBundle {
    if trades.is_empty() {
        return MetricsBundle::default();
    }

    let num_trades = trades.len();
    let winning: Vec<&Trade> = trades.iter().filter(|t| t.pnl > 0.0).collect();
    let losing: Vec<&Trade> = trades.iter().filter(|t| t.pnl < 0.0).collect();
    let winning_trades = winning.len();
    let losing_trades = losing.len();

    let gross_profit: f64 = winning.iter().map(|t| t.pnl).sum();
    let gross_loss: f64 = losing.iter().map(|t| -t.pnl).sum();
    let profit_factor = if gross_loss == 0.0 {
        UNBOUNDED_RATIO_CAP
    } else {
        gross_profit / gross_loss
    };

    let winrate_pct = winning_trades as f64 / num_trades as f64 * 100.0;
    let total_return_pct = (final_capital - initial_capital) / initial_capital * 100.0;

    let (max_drawdown_pct, max_drawdown_duration_bars) = max_drawdown(equity_curve);

    let returns = bar_returns(equity_curve);
    let sharpe_ratio = sharpe(&returns);
    let sortino_ratio = sortino(&returns);
    let calmar_ratio = if max_drawdown_pct > 0.0 {
        total_return_pct / max_drawdown_pct
    } else {
        0.0
    };
    let recovery_factor = if max_drawdown_pct > 0.0 {
        total_return_pct / max_drawdown_pct
    } else {
        0.0
    };

    let avg_win = if winning_trades > 0 { gross_profit / winning_trades as f64 } else { 0.0 };
    let avg_loss = if losing_trades > 0 { gross_loss / losing_trades as f64 } else { 0.0 };
    let win_rate = winning_trades as f64 / num_trades as f64;
    let loss_rate = losing_trades as f64 / num_trades as f64;
    let expectancy = win_rate * avg_win - loss_rate * avg_loss;

    let avg_trade_duration =
        trades.iter().map(|t| t.duration_bars as f64).sum::<f64>() / num_trades as f64;

    let (max_consecutive_wins, max_consecutive_losses) = consecutive_streaks(trades);

    MetricsBundle {
        total_return_pct,
        num_trades,
        winning_trades,
        losing_trades,
        winrate_pct,
        gross_profit,
        gross_loss,
        profit_factor,
        max_drawdown_pct,
        max_drawdown_duration_bars,
        sharpe_ratio,
        sortino_ratio,
        calmar_ratio,
        expectancy,
        recovery_factor,
        avg_trade_duration,
        max_consecutive_wins,
        max_consecutive_losses,
    }
}

fn bar_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0].equity != 0.0 { (w[1].equity - w[0].equity) / w[0].equity } else { 0.0 })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof=1), matching pandas' `Series::std()`
/// default. Undefined for fewer than two values.
fn stdev(values: &[f64], mean_val: f64) -> f64 {
    let variance =
        values.iter().map(|v| (v - mean_val).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

fn sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let m = mean(returns);
    let s = stdev(returns, m);
    if s == 0.0 {
        return 0.0;
    }
    (m / s) * TRADING_DAYS_PER_YEAR.sqrt()
}

fn sortino(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let negatives: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if negatives.is_empty() {
        return UNBOUNDED_RATIO_CAP;
    }
    let m = mean(returns);
    // Downside deviation is the sample stdev of the negative returns
    // about their own mean, not the RMS distance from zero.
    let downside = if negatives.len() < 2 {
        0.0
    } else {
        let neg_mean = mean(&negatives);
        stdev(&negatives, neg_mean)
    };
    if downside == 0.0 {
        return UNBOUNDED_RATIO_CAP;
    }
    (m / downside) * TRADING_DAYS_PER_YEAR.sqrt()
}

fn max_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let mut peak = f64::NEG_INFINITY;
    let mut peak_index = 0usize;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;

    for (i, point) in equity_curve.iter().enumerate() {
        if point.equity >= peak {
            peak = point.equity;
            peak_index = i;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak * 100.0;
            if dd > max_dd {
                max_dd = dd;
            }
            let duration = i - peak_index;
            if duration > max_duration {
                max_duration = duration;
            }
        }
    }

    (max_dd, max_duration)
}

fn consecutive_streaks(trades: &[Trade]) -> (usize, usize) {
    let mut max_wins = 0usize;
    let mut max_losses = 0usize;
    let mut cur_wins = 0usize;
    let mut cur_losses = 0usize;

    for t in trades {
        if t.pnl > 0.0 {
            cur_wins += 1;
            cur_losses = 0;
        } else if t.pnl < 0.0 {
            cur_losses += 1;
            cur_wins = 0;
        } else {
            cur_wins = 0;
            cur_losses = 0;
        }
        max_wins = max_wins.max(cur_wins);
        max_losses = max_losses.max(cur_losses);
    }

    (max_wins, max_losses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::config::StopTarget;
    use chrono::{TimeZone, Utc};

    fn ts(i: i64) -> chrono::DateTime<chrono::Utc> {
        Utc.timestamp_opt(i * 3600, 0).unwrap()
    }

    fn base_bars(n: usize) -> BarTable {
        BarTable {
            timestamp: (0..n as i64).map(ts).collect(),
            open: vec![100.0; n],
            high: vec![100.0; n],
            low: vec![100.0; n],
            close: vec![100.0; n],
            volume: vec![100.0; n],
            columns: Default::default(),
        }
    }

    fn backtester(stop_target: StopTarget) -> Backtester {
        let config = BacktestConfig::new(10_000.0, stop_target, 0.0, 0.0, true).unwrap();
        let risk = RiskConfig::new(0.01, 1.0).unwrap();
        Backtester::new(config, risk)
    }

    #[test]
    fn single_winning_long() {
        let mut bars = base_bars(10);
        bars.open[5] = 100.0;
        bars.high[5] = 110.0;
        bars.low[5] = 100.0;
        bars.close[5] = 105.0;
        let mut signal = vec![0.0; 10];
        signal[4] = 1.0;
        bars.set_column("signal", signal);
        bars.set_column("signal_strength", vec![1.0; 10]);

        let bt = backtester(StopTarget::Pct { sl_pct: 0.02, tp_rr: 2.0 });
        let result = bt.run(&bars).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_price, 100.0);
        assert_eq!(trade.take_profit, 104.0);
        assert_eq!(trade.stop_loss, 98.0);
        assert_eq!(trade.exit_price, 104.0);
        assert_eq!(result.metrics.winrate_pct, 100.0);
        assert_eq!(result.metrics.profit_factor, UNBOUNDED_RATIO_CAP);
    }

    #[test]
    fn single_losing_short() {
        let n = 21;
        let mut bars = base_bars(n);
        for i in 0..n {
            let price = 100.0 + i as f64;
            bars.open[i] = price;
            bars.close[i] = price;
            bars.high[i] = price + 0.5;
            bars.low[i] = price - 0.5;
        }
        let mut signal = vec![0.0; n];
        signal[1] = -1.0;
        bars.set_column("signal", signal);
        bars.set_column("signal_strength", vec![1.0; n]);

        let bt = backtester(StopTarget::Pct { sl_pct: 0.05, tp_rr: 2.0 });
        let result = bt.run(&bars).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].side, PositionSide::Short);
        assert_eq!(result.trades[0].exit_reason, ExitReason::Sl);
        assert!(result.trades[0].pnl < 0.0);
        assert!((result.trades[0].pnl_pct + 5.0).abs() < 0.5);
    }

    #[test]
    fn same_bar_sl_tp_tie_favors_stop() {
        let mut bars = base_bars(5);
        bars.open[1] = 100.0;
        bars.high[1] = 104.0;
        bars.low[1] = 96.0;
        bars.close[1] = 100.0;
        let mut signal = vec![0.0; 5];
        signal[0] = 1.0;
        bars.set_column("signal", signal);
        bars.set_column("signal_strength", vec![1.0; 5]);

        let bt = backtester(StopTarget::Pct { sl_pct: 0.02, tp_rr: 2.0 });
        let result = bt.run(&bars).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_price, 98.0);
        assert_eq!(result.trades[0].exit_reason, ExitReason::Sl);
    }

    #[test]
    fn end_of_data_closes_open_trade() {
        let mut bars = base_bars(5);
        let mut signal = vec![0.0; 5];
        signal[3] = 1.0;
        bars.set_column("signal", signal);
        bars.set_column("signal_strength", vec![1.0; 5]);

        let bt = backtester(StopTarget::Pct { sl_pct: 0.5, tp_rr: 10.0 });
        let result = bt.run(&bars).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::EndOfData);
        assert_eq!(result.trades[0].exit_time, bars.timestamp[4]);
    }

    #[test]
    fn empty_strategy_has_zero_metrics() {
        let mut bars = base_bars(1000);
        bars.set_column("signal", vec![0.0; 1000]);
        bars.set_column("signal_strength", vec![1.0; 1000]);

        let bt = backtester(StopTarget::Pct { sl_pct: 0.02, tp_rr: 2.0 });
        let result = bt.run(&bars).unwrap();

        assert_eq!(result.metrics.num_trades, 0);
        assert!(result.equity_curve.iter().all(|p| p.equity == 10_000.0));
    }

    #[test]
    fn capital_conserved_across_trades() {
        let mut bars = base_bars(20);
        for i in 0..20 {
            bars.close[i] = 100.0 + i as f64;
            bars.open[i] = bars.close[i];
            bars.high[i] = bars.close[i] + 0.5;
            bars.low[i] = bars.close[i] - 0.5;
        }
        let mut signal = vec![0.0; 20];
        signal[2] = 1.0;
        bars.set_column("signal", signal);
        bars.set_column("signal_strength", vec![1.0; 20]);

        let bt = backtester(StopTarget::Pct { sl_pct: 0.3, tp_rr: 5.0 });
        let result = bt.run(&bars).unwrap();
        let total_pnl: f64 = result.trades.iter().map(|t| t.pnl).sum();
        assert!((result.equity_curve.last().unwrap().equity - (10_000.0 + total_pnl)).abs() < 1e-6);
    }

    #[test]
    fn rejects_missing_signal_column() {
        let bars = base_bars(5);
        let bt = backtester(StopTarget::Pct { sl_pct: 0.02, tp_rr: 2.0 });
        assert!(bt.run(&bars).is_err());
    }
}
