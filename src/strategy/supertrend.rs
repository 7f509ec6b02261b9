//! Supertrend trend-following strategy with optional ADX filter.
use crate::indicators::adx::Adx;
use crate::indicators::atr::Atr;
use crate::types::BarTable;

use super::{with_signal_columns, ConfigError, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct SupertrendConfig {
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub use_adx_filter: bool,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub allow_short: bool,
}

impl Default for SupertrendConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            atr_multiplier: 3.0,
            use_adx_filter: false,
            adx_period: 14,
            adx_threshold: 20.0,
            allow_short: true,
        }
    }
}

impl SupertrendConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.atr_period < 1 {
            return Err(ConfigError::OutOfRange {
                field: "atr_period",
                value: self.atr_period as f64,
            });
        }
        if self.atr_multiplier <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "atr_multiplier",
                value: self.atr_multiplier,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SupertrendStrategy {
    pub config: SupertrendConfig,
}

impl SupertrendStrategy {
    pub fn new(config: SupertrendConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Strategy for SupertrendStrategy {
    fn name(&self) -> &'static str {
        "supertrend"
    }

    fn validate_config(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["high", "low", "close"]
    }

    fn generate_signals(&self, bars: &BarTable) -> Result<BarTable, StrategyError> {
        bars.require_columns(self.required_columns())?;
        let n = bars.len();
        let mut signal = vec![0.0; n];

        let mut atr = Atr::new(self.config.atr_period).expect("validated period");
        let mut final_upper = f64::NAN;
        let mut final_lower = f64::NAN;
        let mut direction = 1i32;
        let mut prev_close: Option<f64> = None;

        let mut adx = if self.config.use_adx_filter {
            Some(Adx::new(self.config.adx_period).expect("validated period"))
        } else {
            None
        };

        for i in 0..n {
            let (h, l, c) = (bars.high[i], bars.low[i], bars.close[i]);
            let a = atr.update(h, l, c);
            let adx_val = adx.as_mut().and_then(|a| a.update(h, l, c));

            let Some(a) = a else {
                prev_close = Some(c);
                continue;
            };

            let hl2 = (h + l) / 2.0;
            let basic_upper = hl2 + self.config.atr_multiplier * a;
            let basic_lower = hl2 - self.config.atr_multiplier * a;

            if final_upper.is_nan() {
                final_upper = basic_upper;
                final_lower = basic_lower;
            } else {
                let pc = prev_close.unwrap_or(c);
                final_upper = if basic_upper < final_upper || pc > final_upper {
                    basic_upper
                } else {
                    final_upper
                };
                final_lower = if basic_lower > final_lower || pc < final_lower {
                    basic_lower
                } else {
                    final_lower
                };
            }

            let prev_direction = direction;
            if c > final_upper {
                direction = 1;
            } else if c < final_lower {
                direction = -1;
            }

            if direction != prev_direction {
                if direction == 1 {
                    signal[i] = 1.0;
                } else if self.config.allow_short {
                    signal[i] = -1.0;
                }
            }

            if self.config.use_adx_filter {
                let weak = adx_val.map(|v| v.adx < self.config.adx_threshold).unwrap_or(true);
                if weak {
                    signal[i] = 0.0;
                }
            }

            prev_close = Some(c);
        }

        Ok(with_signal_columns(bars, signal, vec![1.0; n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bars_trending_up(n: usize) -> BarTable {
        let close: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.6).collect();
        BarTable {
            timestamp: (0..n as i64).map(|i| Utc.timestamp_opt(i * 3600, 0).unwrap()).collect(),
            open: close.clone(),
            high: close.iter().map(|c| c + 1.0).collect(),
            low: close.iter().map(|c| c - 1.0).collect(),
            close,
            volume: vec![100.0; n],
            columns: Default::default(),
        }
    }

    #[test]
    fn uptrend_eventually_fires_long() {
        let bars = bars_trending_up(60);
        let strat = SupertrendStrategy::new(SupertrendConfig::default()).unwrap();
        let out = strat.generate_signals(&bars).unwrap();
        assert!(out.signal().unwrap().iter().any(|&s| s > 0.0));
    }

    #[test]
    fn rejects_non_positive_multiplier() {
        let cfg = SupertrendConfig {
            atr_multiplier: 0.0,
            ..Default::default()
        };
        assert!(SupertrendStrategy::new(cfg).is_err());
    }
}
