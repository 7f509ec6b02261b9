//! # Backtester
//!
//! The core of an algorithmic trading research platform: a
//! deterministic, bar-by-bar trade simulator for rule-based strategies
//! over historical OHLCV candles, the indicator and signal framework
//! those strategies are built from, and a parallel parameter-search and
//! walk-forward validation driver on top of both.
//!
//! ### Priorities
//! 1. Determinism
//! Identical inputs (bar table, configs, strategy output) always
//! produce identical trades, equity curve, and metrics.
//! 2. No look-ahead
//! A strategy can never see past the bar it is signaling on; the
//! backtester only ever acts on a signal at the *next* bar's open.
//! 3. Parallelism
//! The optimizer fans a parameter grid out across a rayon thread
//! pool, sharing the bar table read-only.
//! 4. Flexibility
//! A closed set of strategies and indicators, each validated at
//! construction, composed through one shared trait contract.
//!
//! ## Overview
//!
//! ### Backtesting a strategy
//!
//! ```
//! use backtester::prelude::*;
//! use backtester::strategy::sma_crossover::{SmaCrossoverConfig, SmaCrossoverStrategy};
//! use chrono::{TimeZone, Utc};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let n = 40;
//!     let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.5).collect();
//!     let bars = BarTable {
//!         timestamp: (0..n as i64).map(|i| Utc.timestamp_opt(i * 3600, 0).unwrap()).collect(),
//!         open: closes.clone(),
//!         high: closes.iter().map(|c| c + 0.5).collect(),
//!         low: closes.iter().map(|c| c - 0.5).collect(),
//!         close: closes.clone(),
//!         volume: vec![1_000.0; n],
//!         columns: Default::default(),
//!     };
//!
//!     let strategy = SmaCrossoverStrategy::new(SmaCrossoverConfig {
//!         fast_window: 3,
//!         slow_window: 8,
//!         allow_short: false,
//!     })?;
//!     let signaled = strategy.generate_signals(&bars)?;
//!
//!     let backtest_config = BacktestConfig::new(
//!         10_000.0,
//!         StopTarget::Pct { sl_pct: 0.02, tp_rr: 2.0 },
//!         0.001,
//!         0.0005,
//!         true,
//!     )?;
//!     let risk_config = RiskConfig::new(0.01, 1.0)?;
//!     let backtester = Backtester::new(backtest_config, risk_config);
//!     let result = backtester.run(&signaled)?;
//!
//!     println!("{} trades, {:.2}% return", result.metrics.num_trades, result.metrics.total_return_pct);
//!     Ok(())
//! }
//! ```
//!
//! ### Defining a custom indicator
//!
//! Indicators ship in both a batch (whole-series, allocating) and an
//! incremental (O(1) per bar) form; see [`indicators::ema`] for the
//! pattern a new indicator should follow.
//!
//! ### Defining a custom strategy
//!
//! Implement [`strategy::Strategy`] — `validate_config`,
//! `required_columns`, and `generate_signals` — the same contract every
//! shipped strategy under [`strategy`] implements.
//!
//! ### Searching a parameter grid
//!
//! [`optimizer::Optimizer::optimize`] evaluates a [`params::ParamGrid`]
//! in parallel via rayon and ranks the result table by a configured
//! [`optimizer::OptimizeMetric`]; [`optimizer::walk_forward::WalkForwardAnalyzer`]
//! repeats that search across rolling or anchored train/validation
//! windows.

pub mod backtest;
pub mod indicators;
pub mod optimizer;
pub mod params;
pub mod strategy;
pub mod types;
pub mod util;

pub mod prelude {
    pub use crate::backtest::*;
    pub use crate::params::*;
    pub use crate::strategy::{Strategy, StrategyKind};
    pub use crate::types::*;
}
