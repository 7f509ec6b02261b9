//! Trivial baseline: go long on the first bar and never exit. A good
//! baseline for comparing against the more elaborate strategies.
use crate::types::BarTable;

use super::{with_signal_columns, ConfigError, Strategy, StrategyError};

#[derive(Debug, Clone, Default)]
pub struct BuyAndHoldConfig;

#[derive(Debug, Clone, Default)]
pub struct BuyAndHoldStrategy {
    pub config: BuyAndHoldConfig,
}

impl BuyAndHoldStrategy {
    pub fn new(config: BuyAndHoldConfig) -> Result<Self, ConfigError> {
        Ok(Self { config })
    }
}

impl Strategy for BuyAndHoldStrategy {
    fn name(&self) -> &'static str {
        "buy_and_hold"
    }

    fn validate_config(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["close"]
    }

    fn generate_signals(&self, bars: &BarTable) -> Result<BarTable, StrategyError> {
        bars.require_columns(self.required_columns())?;
        let n = bars.len();
        let mut signal = vec![0.0; n];
        if n > 0 {
            signal[0] = 1.0;
        }
        Ok(with_signal_columns(bars, signal, vec![1.0; n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn fires_only_on_first_bar() {
        let n = 5;
        let bars = BarTable {
            timestamp: (0..n as i64).map(|i| Utc.timestamp_opt(i * 3600, 0).unwrap()).collect(),
            open: vec![100.0; n],
            high: vec![101.0; n],
            low: vec![99.0; n],
            close: vec![100.0; n],
            volume: vec![1.0; n],
            columns: Default::default(),
        };
        let strat = BuyAndHoldStrategy::new(BuyAndHoldConfig).unwrap();
        let out = strat.generate_signals(&bars).unwrap();
        let signal = out.signal().unwrap();
        assert_eq!(signal[0], 1.0);
        assert!(signal[1..].iter().all(|&s| s == 0.0));
    }
}
