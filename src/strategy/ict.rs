//! ICT/Smart-Money structural strategy: liquidity sweep, market
//! structure shift, and Fair-Value-Gap retrace entry, gated to a
//! configurable kill-zone hour range.
use chrono::Timelike;

use crate::types::BarTable;

use super::{with_signal_columns, ConfigError, Strategy, StrategyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetupSide {
    Bull,
    Bear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetupState {
    Scan,
    WaitMss,
    WaitEntry,
}

#[derive(Debug, Clone, Copy)]
struct Fvg {
    top: f64,
    bottom: f64,
}

#[derive(Debug, Clone)]
pub struct IctConfig {
    pub kill_zone_start_hour: u32,
    pub kill_zone_end_hour: u32,
    pub swing_length: usize,
    pub liquidity_lookback: usize,
    pub fvg_min_size_pct: f64,
    pub max_setup_duration: usize,
    pub allow_short: bool,
}

impl Default for IctConfig {
    fn default() -> Self {
        Self {
            kill_zone_start_hour: 7,
            kill_zone_end_hour: 10,
            swing_length: 5,
            liquidity_lookback: 20,
            fvg_min_size_pct: 0.05,
            max_setup_duration: 50,
            allow_short: true,
        }
    }
}

impl IctConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.kill_zone_start_hour >= 24 || self.kill_zone_end_hour > 24 {
            return Err(ConfigError::OutOfRange {
                field: "kill_zone_hour",
                value: self.kill_zone_end_hour as f64,
            });
        }
        if self.kill_zone_start_hour >= self.kill_zone_end_hour {
            return Err(ConfigError::Inconsistent(
                "kill_zone_start_hour must be < kill_zone_end_hour".into(),
            ));
        }
        if self.swing_length < 1 {
            return Err(ConfigError::OutOfRange {
                field: "swing_length",
                value: self.swing_length as f64,
            });
        }
        if self.fvg_min_size_pct <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "fvg_min_size_pct",
                value: self.fvg_min_size_pct,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IctStrategy {
    pub config: IctConfig,
}

impl IctStrategy {
    pub fn new(config: IctConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    fn is_swing_high(high: &[f64], pivot: usize, len: usize) -> bool {
        for k in 1..=len {
            if high[pivot] <= high[pivot - k] || high[pivot] <= high[pivot + k] {
                return false;
            }
        }
        true
    }

    fn is_swing_low(low: &[f64], pivot: usize, len: usize) -> bool {
        for k in 1..=len {
            if low[pivot] >= low[pivot - k] || low[pivot] >= low[pivot + k] {
                return false;
            }
        }
        true
    }
}

impl Strategy for IctStrategy {
    fn name(&self) -> &'static str {
        "ict"
    }

    fn validate_config(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["timestamp", "high", "low", "close"]
    }

    fn generate_signals(&self, bars: &BarTable) -> Result<BarTable, StrategyError> {
        bars.require_columns(self.required_columns())?;
        let n = bars.len();
        let sw_len = self.config.swing_length;
        let mut signal = vec![0.0; n];

        if n < sw_len * 2 + 3 {
            return Ok(with_signal_columns(bars, signal, vec![1.0; n]));
        }

        let high = &bars.high;
        let low = &bars.low;
        let close = &bars.close;

        let mut recent_highs: Vec<(f64, usize)> = Vec::new();
        let mut recent_lows: Vec<(f64, usize)> = Vec::new();

        let mut state = SetupState::Scan;
        let mut setup_side: Option<SetupSide> = None;
        let mut mss_level = 0.0;
        let mut entry_fvg: Option<Fvg> = None;
        let mut setup_start_idx = 0usize;

        for i in (sw_len * 2)..n {
            let pivot = i - sw_len;
            if pivot >= sw_len && Self::is_swing_high(high, pivot, sw_len) {
                recent_highs.push((high[pivot], pivot));
                recent_highs.retain(|&(_, idx)| idx + self.config.liquidity_lookback > i);
            }
            if pivot >= sw_len && Self::is_swing_low(low, pivot, sw_len) {
                recent_lows.push((low[pivot], pivot));
                recent_lows.retain(|&(_, idx)| idx + self.config.liquidity_lookback > i);
            }

            if state != SetupState::Scan && i - setup_start_idx > self.config.max_setup_duration {
                state = SetupState::Scan;
                setup_side = None;
            }

            let hour = bars.timestamp[i].hour();
            let in_kill_zone = hour >= self.config.kill_zone_start_hour && hour < self.config.kill_zone_end_hour;

            match state {
                SetupState::Scan => {
                    if !in_kill_zone {
                        continue;
                    }

                    if self.config.allow_short {
                        if let Some(&(_, _)) = recent_highs.iter().find(|&&(price, _)| high[i] > price) {
                            if let Some(&last_sl) = recent_lows.last() {
                                mss_level = last_sl.0;
                                state = SetupState::WaitMss;
                                setup_side = Some(SetupSide::Bear);
                                setup_start_idx = i;
                            }
                        }
                    }

                    if state == SetupState::Scan {
                        if let Some(&(_, _)) = recent_lows.iter().find(|&&(price, _)| low[i] < price) {
                            if let Some(&last_sh) = recent_highs.last() {
                                mss_level = last_sh.0;
                                state = SetupState::WaitMss;
                                setup_side = Some(SetupSide::Bull);
                                setup_start_idx = i;
                            }
                        }
                    }
                }
                SetupState::WaitMss => match setup_side {
                    Some(SetupSide::Bear) => {
                        if close[i] < mss_level {
                            if high[i] < low[i - 2] {
                                let gap = (low[i - 2] - high[i]) / close[i] * 100.0;
                                if gap >= self.config.fvg_min_size_pct {
                                    entry_fvg = Some(Fvg {
                                        top: low[i - 2],
                                        bottom: high[i],
                                    });
                                    state = SetupState::WaitEntry;
                                } else {
                                    state = SetupState::Scan;
                                }
                            } else {
                                state = SetupState::Scan;
                            }
                        }
                    }
                    Some(SetupSide::Bull) => {
                        if close[i] > mss_level {
                            if low[i] > high[i - 2] {
                                let gap = (low[i] - high[i - 2]) / close[i] * 100.0;
                                if gap >= self.config.fvg_min_size_pct {
                                    entry_fvg = Some(Fvg {
                                        top: low[i],
                                        bottom: high[i - 2],
                                    });
                                    state = SetupState::WaitEntry;
                                } else {
                                    state = SetupState::Scan;
                                }
                            } else {
                                state = SetupState::Scan;
                            }
                        }
                    }
                    None => state = SetupState::Scan,
                },
                SetupState::WaitEntry => {
                    let fvg = entry_fvg.expect("WaitEntry implies entry_fvg is set");
                    match setup_side {
                        Some(SetupSide::Bear) => {
                            if high[i] >= fvg.bottom {
                                if close[i] <= fvg.top {
                                    signal[i] = -1.0;
                                }
                                state = SetupState::Scan;
                            }
                        }
                        Some(SetupSide::Bull) => {
                            if low[i] <= fvg.top {
                                if close[i] >= fvg.bottom {
                                    signal[i] = 1.0;
                                }
                                state = SetupState::Scan;
                            }
                        }
                        None => state = SetupState::Scan,
                    }
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

    fn bars_from_ohlc(ohlc: &[(f64, f64, f64, f64)]) -> BarTable {
        let n = ohlc.len();
        BarTable {
            timestamp: (0..n as i64).map(|i| Utc.timestamp_opt(i * 3600, 0).unwrap()).collect(),
            open: ohlc.iter().map(|b| b.0).collect(),
            high: ohlc.iter().map(|b| b.1).collect(),
            low: ohlc.iter().map(|b| b.2).collect(),
            close: ohlc.iter().map(|b| b.3).collect(),
            volume: vec![100.0; n],
            columns: Default::default(),
        }
    }

    #[test]
    fn rejects_inverted_kill_zone() {
        let cfg = IctConfig {
            kill_zone_start_hour: 10,
            kill_zone_end_hour: 7,
            ..Default::default()
        };
        assert!(IctStrategy::new(cfg).is_err());
    }

    #[test]
    fn flat_series_produces_no_signals() {
        let ohlc: Vec<_> = (0..80).map(|_| (100.0, 100.5, 99.5, 100.0)).collect();
        let bars = bars_from_ohlc(&ohlc);
        let strat = IctStrategy::new(IctConfig::default()).unwrap();
        let out = strat.generate_signals(&bars).unwrap();
        assert!(out.signal().unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn short_series_returns_all_flat_without_panicking() {
        let ohlc: Vec<_> = (0..5).map(|_| (100.0, 101.0, 99.0, 100.0)).collect();
        let bars = bars_from_ohlc(&ohlc);
        let strat = IctStrategy::new(IctConfig::default()).unwrap();
        let out = strat.generate_signals(&bars).unwrap();
        assert_eq!(out.signal().unwrap().len(), 5);
    }
}
