//! Bollinger Bands mean reversion.
use crate::indicators::bollinger::Bollinger;
use crate::indicators::rsi::Rsi;
use crate::types::BarTable;

use super::{with_signal_columns, ConfigError, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct BollingerMrConfig {
    pub bb_window: usize,
    pub bb_std: f64,
    pub rsi_window: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub allow_short: bool,
}

impl Default for BollingerMrConfig {
    fn default() -> Self {
        Self {
            bb_window: 20,
            bb_std: 2.0,
            rsi_window: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            allow_short: true,
        }
    }
}

impl BollingerMrConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bb_window < 2 {
            return Err(ConfigError::OutOfRange {
                field: "bb_window",
                value: self.bb_window as f64,
            });
        }
        if self.bb_std <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "bb_std",
                value: self.bb_std,
            });
        }
        if !(self.rsi_oversold > 0.0 && self.rsi_oversold < self.rsi_overbought && self.rsi_overbought < 100.0) {
            return Err(ConfigError::Inconsistent("invalid RSI levels".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BollingerMrStrategy {
    pub config: BollingerMrConfig,
}

impl BollingerMrStrategy {
    pub fn new(config: BollingerMrConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Strategy for BollingerMrStrategy {
    fn name(&self) -> &'static str {
        "bollinger_mr"
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
        let mut bb = Bollinger::new(self.config.bb_window, self.config.bb_std).expect("validated window");
        let mut rsi = Rsi::new(self.config.rsi_window).expect("validated window");
        let mut signal = vec![0.0; n];

        for i in 0..n {
            let close = bars.close[i];
            let bands = bb.update(close);
            let rsi_v = rsi.update(close);

            if let (Some(bands), Some(rsi_v)) = (bands, rsi_v) {
                if close < bands.lower && rsi_v < self.config.rsi_oversold {
                    signal[i] = 1.0;
                } else if self.config.allow_short && close > bands.upper && rsi_v > self.config.rsi_overbought {
                    signal[i] = -1.0;
                }
            }
        }

        Ok(with_signal_columns(bars, signal, vec![1.0; n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bars_from_closes(closes: &[f64]) -> BarTable {
        let n = closes.len();
        BarTable {
            timestamp: (0..n as i64).map(|i| Utc.timestamp_opt(i * 3600, 0).unwrap()).collect(),
            open: closes.to_vec(),
            high: closes.iter().map(|c| c + 0.2).collect(),
            low: closes.iter().map(|c| c - 0.2).collect(),
            close: closes.to_vec(),
            volume: vec![100.0; n],
            columns: Default::default(),
        }
    }

    #[test]
    fn fires_long_on_sharp_dip() {
        let mut closes: Vec<f64> = vec![100.0; 30];
        closes.extend([99.0, 98.0, 85.0, 84.5, 84.0]);
        let bars = bars_from_closes(&closes);
        let strat = BollingerMrStrategy::new(BollingerMrConfig::default()).unwrap();
        let out = strat.generate_signals(&bars).unwrap();
        assert!(out.signal().unwrap().iter().any(|&s| s > 0.0));
    }

    #[test]
    fn rejects_bad_rsi_levels() {
        let cfg = BollingerMrConfig {
            rsi_oversold: 80.0,
            rsi_overbought: 20.0,
            ..Default::default()
        };
        assert!(BollingerMrStrategy::new(cfg).is_err());
    }
}
