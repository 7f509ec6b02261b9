//! Keltner Channel breakout, gated by a rolling ATR volatility floor.
use std::collections::VecDeque;

use crate::indicators::atr::Atr;
use crate::indicators::ema::Ema;
use crate::types::BarTable;

use super::{with_signal_columns, ConfigError, Strategy, StrategyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideMode {
    Long,
    Short,
    Both,
}

#[derive(Debug, Clone)]
pub struct KeltnerBreakoutConfig {
    pub kc_window: usize,
    pub kc_mult: f64,
    pub atr_window: usize,
    pub atr_min_percentile: f64,
    pub vol_lookback: usize,
    pub use_trend_filter: bool,
    pub trend_ema_window: usize,
    pub side_mode: SideMode,
    pub allow_short: bool,
}

impl Default for KeltnerBreakoutConfig {
    fn default() -> Self {
        Self {
            kc_window: 20,
            kc_mult: 2.0,
            atr_window: 14,
            atr_min_percentile: 0.3,
            vol_lookback: 100,
            use_trend_filter: false,
            trend_ema_window: 100,
            side_mode: SideMode::Both,
            allow_short: true,
        }
    }
}

impl KeltnerBreakoutConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.kc_window < 2 {
            return Err(ConfigError::OutOfRange {
                field: "kc_window",
                value: self.kc_window as f64,
            });
        }
        if self.kc_mult <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "kc_mult",
                value: self.kc_mult,
            });
        }
        if !(0.0..=1.0).contains(&self.atr_min_percentile) {
            return Err(ConfigError::OutOfRange {
                field: "atr_min_percentile",
                value: self.atr_min_percentile,
            });
        }
        Ok(())
    }
}

/// Tracks the trailing `quantile` of the last `window` values seen,
/// re-sorting the window each update. `window` is capped at a few
/// hundred in practice, so this stays cheap relative to the rest of
/// signal generation.
struct RollingQuantile {
    window: usize,
    quantile: f64,
    buf: VecDeque<f64>,
}

impl RollingQuantile {
    fn new(window: usize, quantile: f64) -> Self {
        Self {
            window,
            quantile,
            buf: VecDeque::with_capacity(window),
        }
    }

    fn update(&mut self, value: f64) -> Option<f64> {
        self.buf.push_back(value);
        if self.buf.len() > self.window {
            self.buf.pop_front();
        }
        if self.buf.len() < self.window {
            return None;
        }
        let mut sorted: Vec<f64> = self.buf.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let idx = ((sorted.len() - 1) as f64 * self.quantile).round() as usize;
        Some(sorted[idx])
    }
}

#[derive(Debug, Clone)]
pub struct KeltnerBreakoutStrategy {
    pub config: KeltnerBreakoutConfig,
}

impl KeltnerBreakoutStrategy {
    pub fn new(config: KeltnerBreakoutConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Strategy for KeltnerBreakoutStrategy {
    fn name(&self) -> &'static str {
        "keltner_breakout"
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

        let mut kc_mid = Ema::new(self.config.kc_window).expect("validated window");
        let mut atr = Atr::new(self.config.atr_window).expect("validated window");
        let mut vol_floor = RollingQuantile::new(self.config.vol_lookback, self.config.atr_min_percentile);
        let mut trend = if self.config.use_trend_filter {
            Some(Ema::new(self.config.trend_ema_window).expect("validated window"))
        } else {
            None
        };

        let mut signal = vec![0.0; n];

        for i in 0..n {
            let (h, l, c) = (bars.high[i], bars.low[i], bars.close[i]);
            let mid = kc_mid.update(c);
            let a = atr.update(h, l, c);
            let threshold = a.and_then(|a| vol_floor.update(a));
            let trend_v = trend.as_mut().and_then(|t| t.update(c));

            let (Some(mid), Some(a), Some(threshold)) = (mid, a, threshold) else {
                continue;
            };

            let upper = mid + self.config.kc_mult * a;
            let lower = mid - self.config.kc_mult * a;
            let vol_ok = a >= threshold;
            let trend_up = !self.config.use_trend_filter || trend_v.map(|t| c > t).unwrap_or(false);
            let trend_down = !self.config.use_trend_filter || trend_v.map(|t| c < t).unwrap_or(false);

            let long_side = matches!(self.config.side_mode, SideMode::Long | SideMode::Both);
            let short_side = matches!(self.config.side_mode, SideMode::Short | SideMode::Both) && self.config.allow_short;

            if long_side && c > upper && vol_ok && trend_up {
                signal[i] = 1.0;
            } else if short_side && c < lower && vol_ok && trend_down {
                signal[i] = -1.0;
            }
        }

        Ok(with_signal_columns(bars, signal, vec![1.0; n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn flat_then_breakout(n: usize) -> BarTable {
        let mut close = vec![100.0; n];
        for (i, c) in close.iter_mut().enumerate().skip(n - 5) {
            *c = 100.0 + (i - (n - 5) + 1) as f64 * 5.0;
        }
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
    fn rejects_bad_percentile() {
        let cfg = KeltnerBreakoutConfig {
            atr_min_percentile: 1.5,
            ..Default::default()
        };
        assert!(KeltnerBreakoutStrategy::new(cfg).is_err());
    }

    #[test]
    fn no_signal_before_warmup() {
        let bars = flat_then_breakout(30);
        let cfg = KeltnerBreakoutConfig {
            vol_lookback: 100,
            ..Default::default()
        };
        let strat = KeltnerBreakoutStrategy::new(cfg).unwrap();
        let out = strat.generate_signals(&bars).unwrap();
        assert!(out.signal().unwrap().iter().all(|&s| s == 0.0));
    }
}
