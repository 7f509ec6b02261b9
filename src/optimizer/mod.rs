//! Parameter-grid search and walk-forward validation: a parallel
//! driver that evaluates a strategy/backtest parameter grid against a
//! shared, read-only bar table and ranks the results by a configurable
//! objective metric.
//!
//! Grounded on `original_source/src/core/optimization/{optimizer,
//! grid_search}.py`, replacing its `ProcessPoolExecutor` +
//! process-global pickled DataFrame (REDESIGN FLAGS: "per-worker
//! global DataFrame") with `rayon::par_iter` over a borrowed
//! `&BarTable`, which is `Sync` and needs no serialization to cross
//! worker threads.
use std::fmt;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::backtest::config::{BacktestConfig, BacktestConfigError, StopTarget};
use crate::backtest::engine::Backtester;
use crate::backtest::risk::RiskConfig;
use crate::params::{cartesian_product, get_f64, ParamGrid, ParamSet};
use crate::strategy::StrategyKind;
use crate::types::{BarTable, MetricsBundle};

pub mod config;
pub mod walk_forward;

pub use config::{OptimizeMetric, OptimizerConfig, OptimizerConfigError};

/// Field names recognized on the backtest side of a combined grid.
/// Anything else is assumed to belong to the strategy and is passed
/// through to `StrategyKind::build` untouched.
const BACKTEST_FIELDS: &[&str] = &[
    "initial_capital",
    "fee_pct",
    "slippage_pct",
    "allow_short",
    "sl_pct",
    "tp_rr",
    "atr_mult_sl",
    "atr_mult_tp",
];

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizerError {
    EmptyGrid,
    NoValidResults,
    Config(BacktestConfigError),
    ThreadPool(String),
}

impl fmt::Display for OptimizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerError::EmptyGrid => write!(f, "parameter grid produced no combinations"),
            OptimizerError::NoValidResults => write!(f, "no combination produced a valid result"),
            OptimizerError::Config(e) => write!(f, "{e}"),
            OptimizerError::ThreadPool(e) => write!(f, "failed to build worker pool: {e}"),
        }
    }
}

impl std::error::Error for OptimizerError {}

impl From<BacktestConfigError> for OptimizerError {
    fn from(e: BacktestConfigError) -> Self {
        OptimizerError::Config(e)
    }
}

fn apply_backtest_overrides(
    base: &BacktestConfig,
    params: &ParamSet,
) -> Result<BacktestConfig, BacktestConfigError> {
    let initial_capital = get_f64(params, "initial_capital", base.initial_capital);
    let fee_pct = get_f64(params, "fee_pct", base.fee_pct);
    let slippage_pct = get_f64(params, "slippage_pct", base.slippage_pct);
    let allow_short = crate::params::get_bool(params, "allow_short", base.allow_short);

    let stop_target = match base.stop_target {
        StopTarget::Pct { sl_pct, tp_rr } => StopTarget::Pct {
            sl_pct: get_f64(params, "sl_pct", sl_pct),
            tp_rr: get_f64(params, "tp_rr", tp_rr),
        },
        StopTarget::Atr { atr_mult_sl, atr_mult_tp } => StopTarget::Atr {
            atr_mult_sl: get_f64(params, "atr_mult_sl", atr_mult_sl),
            atr_mult_tp: get_f64(params, "atr_mult_tp", atr_mult_tp),
        },
    };

    BacktestConfig::new(initial_capital, stop_target, fee_pct, slippage_pct, allow_short)
}

/// Splits a combined grid's keys into "recognized by the backtest
/// config" vs "everything else" so the same [`ParamSet`] can drive
/// both a strategy build and a `BacktestConfig` override in one pass.
fn merge_grids(strategy_grid: &ParamGrid, backtest_grid: Option<&ParamGrid>) -> ParamGrid {
    let mut combined = strategy_grid.clone();
    if let Some(bt_grid) = backtest_grid {
        for (k, v) in bt_grid {
            combined.insert(k.clone(), v.clone());
        }
    }
    combined
}

/// One evaluated row of the optimizer's result table: the parameter
/// assignment, its metrics (absent on error or `min_trades` filtering),
/// the scalar used for ranking, and an optional diagnostic message.
#[derive(Debug, Clone)]
pub struct OptimizationRow {
    pub params: ParamSet,
    pub metrics: Option<MetricsBundle>,
    pub metric_value: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub best_params: ParamSet,
    pub best_metrics: MetricsBundle,
    pub all_results: Vec<OptimizationRow>,
    pub combinations_tried: usize,
    pub combinations_skipped: usize,
}

impl OptimizationResult {
    pub fn top_n(&self, n: usize) -> Vec<&OptimizationRow> {
        self.all_results.iter().take(n).collect()
    }
}

pub struct Optimizer {
    pub config: OptimizerConfig,
    pub risk: RiskConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig, risk: RiskConfig) -> Self {
        Self { config, risk }
    }

    /// Builds the combinations to evaluate: the Cartesian product of
    /// `strategy_param_ranges` and the optional `backtest_param_ranges`,
    /// filtered by `filter` (used to drop infeasible shapes such as
    /// fast >= slow before any backtest runs), then sampled down to
    /// `max_combinations` with the configured seeded RNG if the product
    /// is larger.
    fn build_combinations(
        &self,
        strategy_param_ranges: &ParamGrid,
        backtest_param_ranges: Option<&ParamGrid>,
        filter: Option<&(dyn Fn(&ParamSet) -> bool + Sync)>,
    ) -> (Vec<ParamSet>, usize) {
        let combined_grid = merge_grids(strategy_param_ranges, backtest_param_ranges);
        let mut combos = cartesian_product(&combined_grid);
        if let Some(f) = filter {
            combos.retain(f);
        }
        let total_feasible = combos.len();

        if combos.len() > self.config.max_combinations {
            let mut rng = StdRng::seed_from_u64(self.config.random_seed.unwrap_or(42));
            let chosen = sample(&mut rng, combos.len(), self.config.max_combinations);
            let sampled = chosen.iter().map(|i| combos[i].clone()).collect();
            combos = sampled;
        }

        (combos, total_feasible)
    }

    fn evaluate_one(
        &self,
        bars: &BarTable,
        strategy_kind: StrategyKind,
        base_backtest: &BacktestConfig,
        params: &ParamSet,
    ) -> OptimizationRow {
        let outcome = (|| -> Result<MetricsBundle, String> {
            let strategy = strategy_kind.build(params).map_err(|e| e.to_string())?;
            let bt_config = apply_backtest_overrides(base_backtest, params).map_err(|e| e.to_string())?;
            let signaled = strategy.generate_signals(bars).map_err(|e| e.to_string())?;
            let backtester = Backtester::new(bt_config, self.risk);
            let result = backtester.run(&signaled).map_err(|e| e.to_string())?;

            if result.metrics.num_trades < self.config.min_trades {
                return Err(format!(
                    "insufficient trades: {} < {}",
                    result.metrics.num_trades, self.config.min_trades
                ));
            }
            Ok(result.metrics)
        })();

        match outcome {
            Ok(metrics) => OptimizationRow {
                params: params.clone(),
                metric_value: self.config.optimize_metric.value_of(&metrics),
                metrics: Some(metrics),
                error: None,
            },
            Err(message) => {
                warn!("optimizer combination failed ({message}): {params:?}");
                OptimizationRow {
                    params: params.clone(),
                    metrics: None,
                    metric_value: self.config.optimize_metric.sentinel(),
                    error: Some(message),
                }
            }
        }
    }

    fn rank(&self, mut rows: Vec<OptimizationRow>) -> Vec<OptimizationRow> {
        rows.sort_by(|a, b| {
            b.metric_value
                .partial_cmp(&a.metric_value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let ra = a.metrics.as_ref().map(|m| m.total_return_pct).unwrap_or(f64::NEG_INFINITY);
                    let rb = b.metrics.as_ref().map(|m| m.total_return_pct).unwrap_or(f64::NEG_INFINITY);
                    rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        rows
    }

    /// Runs the full grid search: builds every feasible combination,
    /// evaluates each in parallel over `bars`, and ranks the result
    /// table by `self.config.optimize_metric` (property 9: every
    /// feasible combination under `max_combinations` is evaluated
    /// exactly once).
    pub fn optimize(
        &self,
        bars: &BarTable,
        strategy_kind: StrategyKind,
        base_backtest: &BacktestConfig,
        strategy_param_ranges: &ParamGrid,
        backtest_param_ranges: Option<&ParamGrid>,
        filter: Option<&(dyn Fn(&ParamSet) -> bool + Sync)>,
    ) -> Result<OptimizationResult, OptimizerError> {
        let (combos, total_feasible) =
            self.build_combinations(strategy_param_ranges, backtest_param_ranges, filter);
        if combos.is_empty() {
            return Err(OptimizerError::EmptyGrid);
        }

        info!(
            "optimizing {} over {} combinations ({} feasible before sampling), n_jobs={}",
            strategy_kind.name(),
            combos.len(),
            total_feasible,
            self.config.n_jobs
        );

        let evaluate_all = || -> Vec<OptimizationRow> {
            combos
                .par_iter()
                .map(|params| self.evaluate_one(bars, strategy_kind, base_backtest, params))
                .collect()
        };

        // n_jobs < 0 means "auto": defer to rayon's global pool, sized
        // to the logical CPU count per spec.md §5. A positive n_jobs
        // bounds the sweep to a scoped pool of that width.
        let rows: Vec<OptimizationRow> = if self.config.n_jobs > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.n_jobs as usize)
                .build()
                .map_err(|e| OptimizerError::ThreadPool(e.to_string()))?
                .install(evaluate_all)
        } else {
            evaluate_all()
        };

        let combinations_tried = rows.len();
        let combinations_skipped = total_feasible.saturating_sub(combos.len());

        let ranked = self.rank(rows);
        let best = ranked
            .iter()
            .find(|r| r.metrics.is_some())
            .ok_or(OptimizerError::NoValidResults)?;

        Ok(OptimizationResult {
            best_params: best.params.clone(),
            best_metrics: best.metrics.clone().expect("checked above"),
            all_results: ranked,
            combinations_tried,
            combinations_skipped,
        })
    }

    /// Runs the grid on `train`, then re-evaluates the single best
    /// combination on `validation`. Returns the train result alongside
    /// the validation metrics and `degradation_pct` = (train - val) /
    /// |train| * 100 on the configured objective metric.
    pub fn optimize_with_validation(
        &self,
        train: &BarTable,
        validation: &BarTable,
        strategy_kind: StrategyKind,
        base_backtest: &BacktestConfig,
        strategy_param_ranges: &ParamGrid,
        backtest_param_ranges: Option<&ParamGrid>,
        filter: Option<&(dyn Fn(&ParamSet) -> bool + Sync)>,
    ) -> Result<TrainValidationResult, OptimizerError> {
        let train_result = self.optimize(
            train,
            strategy_kind,
            base_backtest,
            strategy_param_ranges,
            backtest_param_ranges,
            filter,
        )?;

        let validation_row =
            self.evaluate_one(validation, strategy_kind, base_backtest, &train_result.best_params);
        let validation_metrics = validation_row.metrics.unwrap_or_default();

        let train_metric = self.config.optimize_metric.value_of(&train_result.best_metrics);
        let val_metric = self.config.optimize_metric.value_of(&validation_metrics);
        let degradation_pct = if train_metric != 0.0 {
            (train_metric - val_metric) / train_metric.abs() * 100.0
        } else {
            0.0
        };

        Ok(TrainValidationResult {
            best_params: train_result.best_params.clone(),
            train_metrics: train_result.best_metrics,
            validation_metrics,
            degradation_pct,
            train_result,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TrainValidationResult {
    pub best_params: ParamSet,
    pub train_metrics: MetricsBundle,
    pub validation_metrics: MetricsBundle,
    pub degradation_pct: f64,
    pub train_result: OptimizationResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::config::StopTarget;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn trending_bars(n: usize) -> BarTable {
        let mut closes = vec![100.0; 10];
        closes.extend((0..n - 10).map(|i| 100.0 + i as f64 * 0.5));
        let highs: Vec<f64> = closes.iter().map(|c| c + 0.5).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 0.5).collect();
        BarTable {
            timestamp: (0..n as i64).map(|i| Utc.timestamp_opt(i * 3600, 0).unwrap()).collect(),
            open: closes.clone(),
            high: highs,
            low: lows,
            close: closes,
            volume: vec![1000.0; n],
            columns: Default::default(),
        }
    }

    #[test]
    fn grid_search_evaluates_every_feasible_combination() {
        let bars = trending_bars(120);
        let base_backtest =
            BacktestConfig::new(10_000.0, StopTarget::Pct { sl_pct: 0.05, tp_rr: 2.0 }, 0.0, 0.0, false)
                .unwrap();
        let risk = RiskConfig::new(0.02, 1.0).unwrap();
        let opt_config = OptimizerConfig::new(-1, 100, OptimizeMetric::TotalReturnPct, 0, Some(7)).unwrap();
        let optimizer = Optimizer::new(opt_config, risk);

        let mut grid: ParamGrid = HashMap::new();
        grid.insert("fast_window".into(), vec![3i64.into(), 5i64.into()]);
        grid.insert("slow_window".into(), vec![10i64.into(), 15i64.into()]);

        let result = optimizer
            .optimize(&bars, StrategyKind::SmaCrossover, &base_backtest, &grid, None, None)
            .unwrap();

        assert_eq!(result.combinations_tried, 4);
        assert_eq!(result.all_results.len(), 4);
        assert_eq!(result.combinations_skipped, 0);
    }

    #[test]
    fn filter_drops_infeasible_combinations_before_evaluation() {
        let bars = trending_bars(120);
        let base_backtest =
            BacktestConfig::new(10_000.0, StopTarget::Pct { sl_pct: 0.05, tp_rr: 2.0 }, 0.0, 0.0, false)
                .unwrap();
        let risk = RiskConfig::new(0.02, 1.0).unwrap();
        let opt_config = OptimizerConfig::new(-1, 100, OptimizeMetric::TotalReturnPct, 0, Some(7)).unwrap();
        let optimizer = Optimizer::new(opt_config, risk);

        let mut grid: ParamGrid = HashMap::new();
        grid.insert("fast_window".into(), vec![10i64.into(), 20i64.into()]);
        grid.insert("slow_window".into(), vec![10i64.into(), 30i64.into()]);

        let filter = |p: &ParamSet| {
            let fast = p.get("fast_window").and_then(|v| v.as_usize()).unwrap_or(0);
            let slow = p.get("slow_window").and_then(|v| v.as_usize()).unwrap_or(0);
            fast < slow
        };

        let result = optimizer
            .optimize(&bars, StrategyKind::SmaCrossover, &base_backtest, &grid, None, Some(&filter))
            .unwrap();

        assert_eq!(result.combinations_tried, 3);
    }

    #[test]
    fn sampling_caps_at_max_combinations() {
        let bars = trending_bars(120);
        let base_backtest =
            BacktestConfig::new(10_000.0, StopTarget::Pct { sl_pct: 0.05, tp_rr: 2.0 }, 0.0, 0.0, false)
                .unwrap();
        let risk = RiskConfig::new(0.02, 1.0).unwrap();
        let opt_config = OptimizerConfig::new(-1, 3, OptimizeMetric::TotalReturnPct, 0, Some(7)).unwrap();
        let optimizer = Optimizer::new(opt_config, risk);

        let mut grid: ParamGrid = HashMap::new();
        grid.insert("fast_window".into(), vec![3i64.into(), 4i64.into(), 5i64.into()]);
        grid.insert("slow_window".into(), vec![10i64.into(), 15i64.into(), 20i64.into()]);

        let result = optimizer
            .optimize(&bars, StrategyKind::SmaCrossover, &base_backtest, &grid, None, None)
            .unwrap();

        assert_eq!(result.combinations_tried, 3);
        assert_eq!(result.combinations_skipped, 6);
    }
}
