//! Core data types shared across the backtester: the bar table, trades,
//! the equity curve, and the metrics bundle produced by a run.
//!
//! The bar table is a fixed-schema struct-of-arrays rather than a generic
//! table. Each OHLCV column is its own `Vec<f64>`; strategies add derived
//! columns (indicators, `signal`, `signal_strength`) into a side map keyed
//! by name, so the hot OHLCV path never pays for a hash lookup.
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};

/// Errors raised while validating or reading a bar table.
#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    Empty,
    NonMonotonicTimestamp { index: usize },
    DuplicateTimestamp { index: usize },
    InvalidOhlc { index: usize },
    NegativeVolume { index: usize },
    MissingColumn(&'static str),
    MissingNamedColumn(String),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Empty => write!(f, "bar table is empty"),
            DataError::NonMonotonicTimestamp { index } => {
                write!(f, "timestamp at row {index} is earlier than the previous row")
            }
            DataError::DuplicateTimestamp { index } => {
                write!(f, "duplicate timestamp at row {index}")
            }
            DataError::InvalidOhlc { index } => {
                write!(f, "OHLC consistency violated at row {index}")
            }
            DataError::NegativeVolume { index } => write!(f, "negative volume at row {index}"),
            DataError::MissingColumn(name) => write!(f, "missing required column: {name}"),
            DataError::MissingNamedColumn(name) => write!(f, "missing required column: {name}"),
        }
    }
}

impl std::error::Error for DataError {}

pub type DataResult<T> = Result<T, DataError>;

/// A columnar OHLCV table with optional named side columns (indicators,
/// `signal`, `signal_strength`). All columns share the length of `open`.
#[derive(Debug, Clone, Default)]
pub struct BarTable {
    pub timestamp: Vec<DateTime<Utc>>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
    /// Strategy/indicator-specific columns, e.g. "signal", "atr", "rsi".
    pub columns: HashMap<String, Vec<f64>>,
}

impl BarTable {
    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Validates the invariants from the data model: non-empty, strictly
    /// non-decreasing + non-duplicate timestamps, OHLC consistency, and
    /// non-negative volume.
    pub fn validate(&self) -> DataResult<()> {
        if self.is_empty() {
            return Err(DataError::Empty);
        }

        for i in 0..self.len() {
            if i > 0 {
                if self.timestamp[i] < self.timestamp[i - 1] {
                    return Err(DataError::NonMonotonicTimestamp { index: i });
                }
                if self.timestamp[i] == self.timestamp[i - 1] {
                    return Err(DataError::DuplicateTimestamp { index: i });
                }
            }

            let (o, h, l, c) = (self.open[i], self.high[i], self.low[i], self.close[i]);
            let lo = o.min(c);
            let hi = o.max(c);
            if !(l <= lo && lo <= hi && hi <= h) {
                return Err(DataError::InvalidOhlc { index: i });
            }

            if self.volume[i] < 0.0 {
                return Err(DataError::NegativeVolume { index: i });
            }
        }

        Ok(())
    }

    /// Checks that every column in `required` is present (OHLCV columns
    /// are always present; everything else is looked up by name).
    pub fn require_columns(&self, required: &[&'static str]) -> DataResult<()> {
        for &name in required {
            let present = matches!(name, "timestamp" | "open" | "high" | "low" | "close" | "volume")
                || self.columns.contains_key(name);
            if !present {
                return Err(DataError::MissingColumn(name));
            }
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.columns.insert(name.into(), values);
    }

    pub fn signal(&self) -> Option<&[f64]> {
        self.column("signal")
    }

    pub fn signal_strength_at(&self, i: usize) -> f64 {
        self.column("signal_strength")
            .and_then(|c| c.get(i).copied())
            .unwrap_or(1.0)
    }

    pub fn atr_at(&self, i: usize) -> Option<f64> {
        self.column("atr").and_then(|c| c.get(i).copied())
    }

    /// Returns the contiguous sub-range `[start, end)` as an owned
    /// table, carrying every side column along with it. Used by the
    /// optimizer to slice train/validation windows without copying the
    /// full series for every candidate window.
    pub fn slice(&self, start: usize, end: usize) -> BarTable {
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), values[start..end].to_vec()))
            .collect();

        BarTable {
            timestamp: self.timestamp[start..end].to_vec(),
            open: self.open[start..end].to_vec(),
            high: self.high[start..end].to_vec(),
            low: self.low[start..end].to_vec(),
            close: self.close[start..end].to_vec(),
            volume: self.volume[start..end].to_vec(),
            columns,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Sl,
    Tp,
    SignalReversal,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Sl => write!(f, "sl"),
            ExitReason::Tp => write!(f, "tp"),
            ExitReason::SignalReversal => write!(f, "signal_reversal"),
            ExitReason::EndOfData => write!(f, "end_of_data"),
        }
    }
}

/// A completed position: immutable once `exit_*` fields are filled in by
/// the Backtester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub side: PositionSide,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub duration_bars: usize,
    pub exit_reason: ExitReason,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Scalars computed from a completed run's trades and equity curve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricsBundle {
    pub total_return_pct: f64,
    pub num_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub winrate_pct: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub max_drawdown_pct: f64,
    pub max_drawdown_duration_bars: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub expectancy: f64,
    pub recovery_factor: f64,
    pub avg_trade_duration: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl Default for MetricsBundle {
    /// The all-zero bundle produced by a run with no trades, per
    /// the "Empty strategy" scenario: a flat equity curve and every
    /// metric at its zero default, with `profit_factor` staying at its
    /// cap-free zero rather than the no-losses cap (there is no gross
    /// profit to divide either).
    fn default() -> Self {
        Self {
            total_return_pct: 0.0,
            num_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            winrate_pct: 0.0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            profit_factor: 0.0,
            max_drawdown_pct: 0.0,
            max_drawdown_duration_bars: 0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            expectancy: 0.0,
            recovery_factor: 0.0,
            avg_trade_duration: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
        }
    }
}

/// The cap applied to `profit_factor`/`sortino_ratio` when the
/// denominator (gross loss / downside deviation) is zero.
pub const UNBOUNDED_RATIO_CAP: f64 = 99.99;

/// The immutable result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub metrics: MetricsBundle,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
}
