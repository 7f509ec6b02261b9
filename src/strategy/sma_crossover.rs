//! Plain SMA crossover, kept alongside the EMA-based MA+RSI strategy as
//! a simpler illustrative baseline.
use crate::indicators::sma::Sma;
use crate::types::BarTable;

use super::{with_signal_columns, ConfigError, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct SmaCrossoverConfig {
    pub fast_window: usize,
    pub slow_window: usize,
    pub allow_short: bool,
}

impl Default for SmaCrossoverConfig {
    fn default() -> Self {
        Self {
            fast_window: 10,
            slow_window: 30,
            allow_short: true,
        }
    }
}

impl SmaCrossoverConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_window >= self.slow_window {
            return Err(ConfigError::Inconsistent(
                "fast_window must be < slow_window".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SmaCrossoverStrategy {
    pub config: SmaCrossoverConfig,
}

impl SmaCrossoverStrategy {
    pub fn new(config: SmaCrossoverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Strategy for SmaCrossoverStrategy {
    fn name(&self) -> &'static str {
        "sma_crossover"
    }

    fn validate_config(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["close"]
    }

    fn generate_signals(&self, bars: &BarTable) -> Result<BarTable, StrategyError> {
        bars.require_columns(self.required_columns())?;
        let n = bars.len();
        let mut fast = Sma::new(self.config.fast_window).expect("validated window");
        let mut slow = Sma::new(self.config.slow_window).expect("validated window");
        let mut signal = vec![0.0; n];
        let mut prev_diff: Option<f64> = None;

        for i in 0..n {
            let f = fast.update(bars.close[i]);
            let s = slow.update(bars.close[i]);
            let (Some(f), Some(s)) = (f, s) else {
                prev_diff = None;
                continue;
            };
            let diff = f - s;
            if let Some(pd) = prev_diff {
                if diff > 0.0 && pd <= 0.0 {
                    signal[i] = 1.0;
                } else if self.config.allow_short && diff < 0.0 && pd >= 0.0 {
                    signal[i] = -1.0;
                }
            }
            prev_diff = Some(diff);
        }

        Ok(with_signal_columns(bars, signal, vec![1.0; n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn rejects_fast_greater_than_slow() {
        let cfg = SmaCrossoverConfig {
            fast_window: 30,
            slow_window: 10,
            allow_short: true,
        };
        assert!(SmaCrossoverStrategy::new(cfg).is_err());
    }

    #[test]
    fn fires_on_simple_uptrend() {
        let n = 50;
        let close: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        let bars = BarTable {
            timestamp: (0..n as i64).map(|i| Utc.timestamp_opt(i * 3600, 0).unwrap()).collect(),
            open: close.clone(),
            high: close.iter().map(|c| c + 1.0).collect(),
            low: close.iter().map(|c| c - 1.0).collect(),
            close,
            volume: vec![1.0; n],
            columns: Default::default(),
        };
        let strat = SmaCrossoverStrategy::new(SmaCrossoverConfig {
            fast_window: 3,
            slow_window: 8,
            allow_short: true,
        })
        .unwrap();
        let out = strat.generate_signals(&bars).unwrap();
        assert!(out.signal().unwrap().iter().any(|&s| s > 0.0));
    }
}
