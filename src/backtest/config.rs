//! Backtest configuration: capital, fees/slippage, and the SL/TP mode.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BacktestConfigError {
    OutOfRange { field: &'static str, value: f64 },
}

impl fmt::Display for BacktestConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacktestConfigError::OutOfRange { field, value } => {
                write!(f, "{field} out of range: {value}")
            }
        }
    }
}

impl std::error::Error for BacktestConfigError {}

/// Stop-loss/take-profit mode. Replaces the source's two parallel
/// nullable config fields with a closed choice of exactly one mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopTarget {
    Pct { sl_pct: f64, tp_rr: f64 },
    Atr { atr_mult_sl: f64, atr_mult_tp: f64 },
}

impl StopTarget {
    fn validate(&self) -> Result<(), BacktestConfigError> {
        match *self {
            StopTarget::Pct { sl_pct, tp_rr } => {
                if !(sl_pct > 0.0 && sl_pct < 0.5) {
                    return Err(BacktestConfigError::OutOfRange {
                        field: "sl_pct",
                        value: sl_pct,
                    });
                }
                if tp_rr <= 0.0 {
                    return Err(BacktestConfigError::OutOfRange {
                        field: "tp_rr",
                        value: tp_rr,
                    });
                }
            }
            StopTarget::Atr { atr_mult_sl, atr_mult_tp } => {
                if atr_mult_sl <= 0.0 {
                    return Err(BacktestConfigError::OutOfRange {
                        field: "atr_mult_sl",
                        value: atr_mult_sl,
                    });
                }
                if atr_mult_tp <= 0.0 {
                    return Err(BacktestConfigError::OutOfRange {
                        field: "atr_mult_tp",
                        value: atr_mult_tp,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn requires_atr_column(&self) -> bool {
        matches!(self, StopTarget::Atr { .. })
    }

    /// Returns (stop, target) for a position opened at `entry`, given
    /// `side_sign` (+1 long, -1 short) and, for ATR mode, the bar's atr.
    pub fn stop_target(&self, entry: f64, side_sign: f64, atr: Option<f64>) -> (f64, f64) {
        match *self {
            StopTarget::Pct { sl_pct, tp_rr } => {
                let stop = entry * (1.0 - side_sign * sl_pct);
                let target = entry * (1.0 + side_sign * sl_pct * tp_rr);
                (stop, target)
            }
            StopTarget::Atr { atr_mult_sl, atr_mult_tp } => {
                let atr = atr.unwrap_or(0.0);
                let stop = entry - side_sign * atr * atr_mult_sl;
                let target = entry + side_sign * atr * atr_mult_tp;
                (stop, target)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub stop_target: StopTarget,
    pub fee_pct: f64,
    pub slippage_pct: f64,
    pub allow_short: bool,
}

impl BacktestConfig {
    pub fn new(
        initial_capital: f64,
        stop_target: StopTarget,
        fee_pct: f64,
        slippage_pct: f64,
        allow_short: bool,
    ) -> Result<Self, BacktestConfigError> {
        if initial_capital <= 0.0 {
            return Err(BacktestConfigError::OutOfRange {
                field: "initial_capital",
                value: initial_capital,
            });
        }
        if fee_pct < 0.0 {
            return Err(BacktestConfigError::OutOfRange {
                field: "fee_pct",
                value: fee_pct,
            });
        }
        if !(0.0..=0.05).contains(&slippage_pct) {
            return Err(BacktestConfigError::OutOfRange {
                field: "slippage_pct",
                value: slippage_pct,
            });
        }
        stop_target.validate()?;

        Ok(Self {
            initial_capital,
            stop_target,
            fee_pct,
            slippage_pct,
            allow_short,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_capital() {
        let st = StopTarget::Pct { sl_pct: 0.02, tp_rr: 2.0 };
        assert!(BacktestConfig::new(0.0, st, 0.0, 0.0, true).is_err());
    }

    #[test]
    fn rejects_slippage_above_cap() {
        let st = StopTarget::Pct { sl_pct: 0.02, tp_rr: 2.0 };
        assert!(BacktestConfig::new(10_000.0, st, 0.0, 0.1, true).is_err());
    }

    #[test]
    fn atr_mode_requires_atr_column() {
        let st = StopTarget::Atr { atr_mult_sl: 2.0, atr_mult_tp: 4.0 };
        assert!(st.requires_atr_column());
        let pct = StopTarget::Pct { sl_pct: 0.02, tp_rr: 2.0 };
        assert!(!pct.requires_atr_column());
    }
}
