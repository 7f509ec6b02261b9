//! Rolling and anchored walk-forward validation: nested grid search on
//! a training window, evaluated on the window immediately following
//! it, repeated across `n_splits` windows and aggregated.
//!
//! The window-generation arithmetic is carried over near-verbatim from
//! `original_source/src/core/optimization/walk_forward.py::
//! WalkForwardAnalyzer._generate_windows`, since spec.md gives no
//! alternative formula and original_source defines it precisely
//! (§9 "Open questions left to the implementer" does not cover this).
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use log::info;

use crate::backtest::config::BacktestConfig;
use crate::backtest::engine::Backtester;
use crate::backtest::risk::RiskConfig;
use crate::params::{ParamGrid, ParamSet};
use crate::strategy::StrategyKind;
use crate::types::{BarTable, EquityPoint, MetricsBundle};

use super::{Optimizer, OptimizerConfig, OptimizerError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WalkForwardConfigError {
    OutOfRange { field: &'static str, value: f64 },
}

impl fmt::Display for WalkForwardConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkForwardConfigError::OutOfRange { field, value } => {
                write!(f, "{field} out of range: {value}")
            }
        }
    }
}

impl std::error::Error for WalkForwardConfigError {}

#[derive(Debug, Clone, Copy)]
pub struct WalkForwardConfig {
    pub n_splits: usize,
    pub train_pct: f64,
    pub anchored: bool,
    pub min_train_bars: usize,
    pub min_validation_bars: usize,
}

impl WalkForwardConfig {
    pub fn new(
        n_splits: usize,
        train_pct: f64,
        anchored: bool,
        min_train_bars: usize,
        min_validation_bars: usize,
    ) -> Result<Self, WalkForwardConfigError> {
        if n_splits < 2 {
            return Err(WalkForwardConfigError::OutOfRange {
                field: "n_splits",
                value: n_splits as f64,
            });
        }
        if !(0.5..=0.95).contains(&train_pct) {
            return Err(WalkForwardConfigError::OutOfRange {
                field: "train_pct",
                value: train_pct,
            });
        }
        Ok(Self {
            n_splits,
            train_pct,
            anchored,
            min_train_bars,
            min_validation_bars,
        })
    }
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            n_splits: 5,
            train_pct: 0.8,
            anchored: false,
            min_train_bars: 500,
            min_validation_bars: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalkForwardWindow {
    pub window_number: usize,
    pub train_start: DateTime<Utc>,
    pub train_end: DateTime<Utc>,
    pub validation_start: DateTime<Utc>,
    pub validation_end: DateTime<Utc>,
    pub best_params: ParamSet,
    pub train_metrics: MetricsBundle,
    pub validation_metrics: MetricsBundle,
    pub degradation_pct: f64,
}

#[derive(Debug, Clone, Default)]
pub struct WalkForwardResult {
    pub windows: Vec<WalkForwardWindow>,
    pub combined_validation_equity: Vec<EquityPoint>,
    pub avg_train_return: f64,
    pub avg_validation_return: f64,
    pub avg_degradation: f64,
    pub consistency_score: f64,
    pub parameter_stability: HashMap<String, f64>,
}

/// Index ranges `[start, end)` for one train/validation window.
fn generate_windows(n_rows: usize, config: &WalkForwardConfig) -> Vec<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let n_splits = config.n_splits;
    let total_val_pct = 1.0 - config.train_pct;
    let val_size = config
        .min_validation_bars
        .max(((n_rows as f64) * total_val_pct / n_splits as f64) as usize);

    let mut windows = Vec::new();

    if config.anchored {
        for i in 0..n_splits {
            let remaining = n_splits - i - 1;
            if val_size * remaining > n_rows {
                continue;
            }
            let val_end = n_rows - remaining * val_size;
            if val_end < val_size {
                continue;
            }
            let val_start = val_end - val_size;
            if val_start < config.min_train_bars {
                continue;
            }
            let train_start = 0;
            let train_end = val_start;
            if train_end - train_start < config.min_train_bars {
                continue;
            }
            windows.push((train_start..train_end, val_start..val_end));
        }
    } else {
        let base_train_size = if n_rows > val_size * n_splits {
            (((n_rows - val_size * n_splits) as f64 / n_splits as f64) * config.train_pct) as usize
                + (((n_rows as f64) * config.train_pct / n_splits as f64) as usize)
        } else {
            0
        };
        let train_size = base_train_size.max(config.min_train_bars);

        let denom = n_splits.saturating_sub(1).max(1);
        let step = (n_rows.saturating_sub(train_size + val_size)) / denom;

        for i in 0..n_splits {
            let train_start = i * step;
            let train_end = train_start + train_size;
            if train_end + val_size > n_rows {
                break;
            }
            let val_start = train_end;
            let val_end = val_start + val_size;
            windows.push((train_start..train_end, val_start..val_end));
        }
    }

    windows
}

fn coefficient_of_variation(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (variance.sqrt() / mean) * 100.0
}

pub struct WalkForwardAnalyzer {
    pub wf_config: WalkForwardConfig,
    pub opt_config: OptimizerConfig,
    pub risk: RiskConfig,
}

impl WalkForwardAnalyzer {
    pub fn new(wf_config: WalkForwardConfig, opt_config: OptimizerConfig, risk: RiskConfig) -> Self {
        Self { wf_config, opt_config, risk }
    }

    /// Runs the full rolling/anchored analysis: generates windows,
    /// runs a nested grid search on each window's train slice, scores
    /// the best combination on that window's validation slice, and
    /// aggregates across windows.
    pub fn analyze(
        &self,
        bars: &BarTable,
        strategy_kind: StrategyKind,
        base_backtest: &BacktestConfig,
        strategy_param_ranges: &ParamGrid,
        backtest_param_ranges: Option<&ParamGrid>,
        filter: Option<&(dyn Fn(&ParamSet) -> bool + Sync)>,
    ) -> Result<WalkForwardResult, OptimizerError> {
        let windows = generate_windows(bars.len(), &self.wf_config);
        if windows.is_empty() {
            return Err(OptimizerError::EmptyGrid);
        }

        info!("running walk-forward analysis with {} windows", windows.len());

        let optimizer = Optimizer::new(self.opt_config, self.risk);
        let mut results = Vec::with_capacity(windows.len());
        let mut validation_equities: Vec<Vec<EquityPoint>> = Vec::new();

        for (i, (train_range, val_range)) in windows.into_iter().enumerate() {
            let train_bars = bars.slice(train_range.start, train_range.end);
            let val_bars = bars.slice(val_range.start, val_range.end);

            let tv = match optimizer.optimize_with_validation(
                &train_bars,
                &val_bars,
                strategy_kind,
                base_backtest,
                strategy_param_ranges,
                backtest_param_ranges,
                filter,
            ) {
                Ok(tv) => tv,
                Err(e) => {
                    info!("walk-forward window {} failed: {e}", i + 1);
                    continue;
                }
            };

            let strategy = strategy_kind
                .build(&tv.best_params)
                .map_err(|_| OptimizerError::NoValidResults)?;
            let bt_config = super::apply_backtest_overrides(base_backtest, &tv.best_params)
                .map_err(OptimizerError::Config)?;
            if let Ok(signaled) = strategy.generate_signals(&val_bars) {
                let backtester = Backtester::new(bt_config, self.risk);
                if let Ok(val_result) = backtester.run(&signaled) {
                    validation_equities.push(val_result.equity_curve);
                }
            }

            results.push(WalkForwardWindow {
                window_number: i + 1,
                train_start: train_bars.timestamp[0],
                train_end: *train_bars.timestamp.last().unwrap(),
                validation_start: val_bars.timestamp[0],
                validation_end: *val_bars.timestamp.last().unwrap(),
                best_params: tv.best_params,
                train_metrics: tv.train_metrics,
                validation_metrics: tv.validation_metrics,
                degradation_pct: tv.degradation_pct,
            });
        }

        if results.is_empty() {
            return Err(OptimizerError::NoValidResults);
        }

        Ok(self.aggregate(results, validation_equities, base_backtest.initial_capital))
    }

    fn aggregate(
        &self,
        windows: Vec<WalkForwardWindow>,
        validation_equities: Vec<Vec<EquityPoint>>,
        initial_capital: f64,
    ) -> WalkForwardResult {
        let n = windows.len() as f64;
        let avg_train_return = windows.iter().map(|w| w.train_metrics.total_return_pct).sum::<f64>() / n;
        let avg_validation_return =
            windows.iter().map(|w| w.validation_metrics.total_return_pct).sum::<f64>() / n;
        let avg_degradation = windows.iter().map(|w| w.degradation_pct).sum::<f64>() / n;

        let profitable = windows.iter().filter(|w| w.validation_metrics.total_return_pct > 0.0).count();
        let consistency_score = profitable as f64 / n * 100.0;

        let mut param_names: Vec<&String> = Vec::new();
        for w in &windows {
            for key in w.best_params.keys() {
                if !param_names.contains(&key) {
                    param_names.push(key);
                }
            }
        }

        let mut parameter_stability = HashMap::new();
        for name in param_names {
            let values: Vec<f64> = windows
                .iter()
                .filter_map(|w| w.best_params.get(name).and_then(|v| v.as_f64()))
                .collect();
            if values.len() == windows.len() {
                parameter_stability.insert(name.clone(), coefficient_of_variation(&values));
            }
        }

        let mut combined_validation_equity = Vec::new();
        let mut current_capital = initial_capital;
        for eq in validation_equities {
            let Some(first) = eq.first() else { continue };
            if first.equity <= 0.0 {
                continue;
            }
            let scale = current_capital / first.equity;
            let scaled: Vec<EquityPoint> = eq
                .iter()
                .map(|p| EquityPoint { timestamp: p.timestamp, equity: p.equity * scale })
                .collect();
            current_capital = scaled.last().unwrap().equity;
            combined_validation_equity.extend(scaled);
        }

        WalkForwardResult {
            windows,
            combined_validation_equity,
            avg_train_return,
            avg_validation_return,
            avg_degradation,
            consistency_score,
            parameter_stability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_windows_stay_in_bounds_and_slide_forward() {
        let config = WalkForwardConfig::new(3, 0.8, false, 50, 20).unwrap();
        let windows = generate_windows(1000, &config);
        assert!(!windows.is_empty());
        for (train, val) in &windows {
            assert!(train.end <= val.start);
            assert!(val.end <= 1000);
        }
        for pair in windows.windows(2) {
            assert!(pair[1].0.start >= pair[0].0.start);
        }
    }

    #[test]
    fn anchored_windows_always_start_training_at_zero() {
        let config = WalkForwardConfig::new(3, 0.8, true, 50, 20).unwrap();
        let windows = generate_windows(1000, &config);
        assert!(!windows.is_empty());
        for (train, _) in &windows {
            assert_eq!(train.start, 0);
        }
    }

    #[test]
    fn rejects_too_few_splits() {
        assert!(WalkForwardConfig::new(1, 0.8, false, 50, 20).is_err());
    }
}
