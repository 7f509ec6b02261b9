//! Optimizer configuration: worker count, grid cap, the objective
//! metric, and the minimum-trade gate.
use std::fmt;

use crate::types::MetricsBundle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerConfigError {
    OutOfRange { field: &'static str, value: f64 },
}

impl fmt::Display for OptimizerConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerConfigError::OutOfRange { field, value } => {
                write!(f, "{field} out of range: {value}")
            }
        }
    }
}

impl std::error::Error for OptimizerConfigError {}

/// The closed set of objective metrics spec.md §4.4 names. Every
/// variant is maximized; nothing in the set is a drawdown-like metric
/// that would need ascending order (the sentinel used for a failed or
/// filtered-out combination is always `-inf`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizeMetric {
    ProfitFactor,
    TotalReturnPct,
    SharpeRatio,
    SortinoRatio,
    WinRate,
    Expectancy,
    CalmarRatio,
}

impl OptimizeMetric {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "profit_factor" => OptimizeMetric::ProfitFactor,
            "total_return_pct" => OptimizeMetric::TotalReturnPct,
            "sharpe_ratio" => OptimizeMetric::SharpeRatio,
            "sortino_ratio" => OptimizeMetric::SortinoRatio,
            "win_rate" => OptimizeMetric::WinRate,
            "expectancy" => OptimizeMetric::Expectancy,
            "calmar_ratio" => OptimizeMetric::CalmarRatio,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizeMetric::ProfitFactor => "profit_factor",
            OptimizeMetric::TotalReturnPct => "total_return_pct",
            OptimizeMetric::SharpeRatio => "sharpe_ratio",
            OptimizeMetric::SortinoRatio => "sortino_ratio",
            OptimizeMetric::WinRate => "win_rate",
            OptimizeMetric::Expectancy => "expectancy",
            OptimizeMetric::CalmarRatio => "calmar_ratio",
        }
    }

    pub fn value_of(&self, metrics: &MetricsBundle) -> f64 {
        match self {
            OptimizeMetric::ProfitFactor => metrics.profit_factor,
            OptimizeMetric::TotalReturnPct => metrics.total_return_pct,
            OptimizeMetric::SharpeRatio => metrics.sharpe_ratio,
            OptimizeMetric::SortinoRatio => metrics.sortino_ratio,
            OptimizeMetric::WinRate => metrics.winrate_pct,
            OptimizeMetric::Expectancy => metrics.expectancy,
            OptimizeMetric::CalmarRatio => metrics.calmar_ratio,
        }
    }

    /// The value assigned to a combination that errored or was
    /// filtered out by `min_trades`, per spec.md §7 ("sentinel metric
    /// value, '-inf' for maximization metrics"). Every metric in this
    /// closed set is maximized.
    pub fn sentinel(&self) -> f64 {
        f64::NEG_INFINITY
    }
}

impl Default for OptimizeMetric {
    fn default() -> Self {
        OptimizeMetric::ProfitFactor
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OptimizerConfig {
    pub n_jobs: i64,
    pub max_combinations: usize,
    pub optimize_metric: OptimizeMetric,
    pub min_trades: usize,
    pub random_seed: Option<u64>,
}

impl OptimizerConfig {
    pub fn new(
        n_jobs: i64,
        max_combinations: usize,
        optimize_metric: OptimizeMetric,
        min_trades: usize,
        random_seed: Option<u64>,
    ) -> Result<Self, OptimizerConfigError> {
        if max_combinations == 0 {
            return Err(OptimizerConfigError::OutOfRange {
                field: "max_combinations",
                value: 0.0,
            });
        }
        Ok(Self {
            n_jobs,
            max_combinations,
            optimize_metric,
            min_trades,
            random_seed,
        })
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            n_jobs: -1,
            max_combinations: 5_000,
            optimize_metric: OptimizeMetric::default(),
            min_trades: 10,
            random_seed: Some(42),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_max_combinations() {
        assert!(OptimizerConfig::new(-1, 0, OptimizeMetric::ProfitFactor, 10, None).is_err());
    }

    #[test]
    fn metric_name_roundtrips() {
        for m in [
            OptimizeMetric::ProfitFactor,
            OptimizeMetric::TotalReturnPct,
            OptimizeMetric::SharpeRatio,
            OptimizeMetric::SortinoRatio,
            OptimizeMetric::WinRate,
            OptimizeMetric::Expectancy,
            OptimizeMetric::CalmarRatio,
        ] {
            assert_eq!(OptimizeMetric::from_name(m.name()), Some(m));
        }
    }
}
