//! Moving Average + RSI crossover.
use crate::indicators::ema::Ema;
use crate::indicators::rsi::Rsi;
use crate::types::BarTable;

use super::{with_signal_columns, ConfigError, Strategy, StrategyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMode {
    Cross,
    Trend,
}

#[derive(Debug, Clone)]
pub struct MaRsiConfig {
    pub fast_window: usize,
    pub slow_window: usize,
    pub rsi_window: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub use_rsi_filter: bool,
    pub signal_mode: SignalMode,
    pub use_trend_filter: bool,
    pub trend_ma_window: usize,
    pub allow_short: bool,
}

impl Default for MaRsiConfig {
    fn default() -> Self {
        Self {
            fast_window: 10,
            slow_window: 30,
            rsi_window: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            use_rsi_filter: true,
            signal_mode: SignalMode::Cross,
            use_trend_filter: false,
            trend_ma_window: 200,
            allow_short: true,
        }
    }
}

impl MaRsiConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_window >= self.slow_window {
            return Err(ConfigError::Inconsistent(
                "fast_window must be < slow_window".into(),
            ));
        }
        if !(self.rsi_oversold > 0.0 && self.rsi_oversold < self.rsi_overbought && self.rsi_overbought < 100.0) {
            return Err(ConfigError::Inconsistent("invalid RSI levels".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MaRsiStrategy {
    pub config: MaRsiConfig,
}

impl MaRsiStrategy {
    pub fn new(config: MaRsiConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Strategy for MaRsiStrategy {
    fn name(&self) -> &'static str {
        "ma_rsi"
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

        let mut fast = Ema::new(self.config.fast_window).expect("validated window");
        let mut slow = Ema::new(self.config.slow_window).expect("validated window");
        let mut rsi = Rsi::new(self.config.rsi_window).expect("validated window");
        let mut trend = if self.config.use_trend_filter {
            Some(Ema::new(self.config.trend_ma_window).expect("validated window"))
        } else {
            None
        };

        let mut signal = vec![0.0; n];
        let mut prev_diff: Option<f64> = None;
        let mut prev_above: Option<bool> = None;

        for i in 0..n {
            let close = bars.close[i];
            let fast_v = fast.update(close);
            let slow_v = slow.update(close);
            let rsi_v = rsi.update(close);
            let trend_v = trend.as_mut().and_then(|t| t.update(close));

            let (Some(f), Some(s)) = (fast_v, slow_v) else {
                prev_diff = None;
                prev_above = None;
                continue;
            };

            match self.config.signal_mode {
                SignalMode::Cross => {
                    let diff = f - s;
                    if let Some(pd) = prev_diff {
                        let bull_cross = diff > 0.0 && pd <= 0.0;
                        let bear_cross = diff < 0.0 && pd >= 0.0;

                        let rsi_ok_long = !self.config.use_rsi_filter
                            || rsi_v.map(|r| r < self.config.rsi_overbought).unwrap_or(false);
                        let rsi_ok_short = !self.config.use_rsi_filter
                            || rsi_v.map(|r| r > self.config.rsi_oversold).unwrap_or(false);

                        let trend_ok_long = !self.config.use_trend_filter
                            || trend_v.map(|t| close > t).unwrap_or(false);
                        let trend_ok_short = !self.config.use_trend_filter
                            || trend_v.map(|t| close < t).unwrap_or(false);

                        if bull_cross && rsi_ok_long && trend_ok_long {
                            signal[i] = 1.0;
                        } else if self.config.allow_short && bear_cross && rsi_ok_short && trend_ok_short {
                            signal[i] = -1.0;
                        }
                    }
                    prev_diff = Some(diff);
                }
                SignalMode::Trend => {
                    let above = f > s;
                    if let Some(was_above) = prev_above {
                        if above && !was_above {
                            signal[i] = 1.0;
                        } else if self.config.allow_short && !above && was_above {
                            signal[i] = -1.0;
                        }
                    }
                    prev_above = Some(above);
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
            high: closes.iter().map(|c| c + 0.5).collect(),
            low: closes.iter().map(|c| c - 0.5).collect(),
            close: closes.to_vec(),
            volume: vec![100.0; n],
            columns: Default::default(),
        }
    }

    #[test]
    fn rejects_fast_greater_than_slow() {
        let cfg = MaRsiConfig {
            fast_window: 30,
            slow_window: 10,
            ..Default::default()
        };
        assert!(MaRsiStrategy::new(cfg).is_err());
    }

    #[test]
    fn fires_long_on_uptrend() {
        let mut closes: Vec<f64> = vec![100.0; 20];
        closes.extend((0..60).map(|i| 100.0 + i as f64 * 0.8));
        let bars = bars_from_closes(&closes);
        let cfg = MaRsiConfig {
            fast_window: 3,
            slow_window: 8,
            use_rsi_filter: false,
            allow_short: false,
            ..Default::default()
        };
        let strat = MaRsiStrategy::new(cfg).unwrap();
        let out = strat.generate_signals(&bars).unwrap();
        let signal = out.signal().unwrap();
        assert!(signal.iter().any(|&s| s > 0.0));
    }
}
