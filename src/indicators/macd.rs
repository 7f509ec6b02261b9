//! MACD: the difference of a fast and slow EMA, plus a signal EMA of
//! that difference and the resulting histogram.
use super::ema::ema;
use super::{check_period, IndicatorResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub fn macd(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> IndicatorResult<Vec<Option<MacdValue>>> {
    check_period(fast_period)?;
    check_period(slow_period)?;
    check_period(signal_period)?;

    let fast = ema(values, fast_period)?;
    let slow = ema(values, slow_period)?;

    let diff: Vec<f64> = fast
        .iter()
        .zip(slow.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => f - s,
            _ => 0.0,
        })
        .collect();
    let first_valid = fast
        .iter()
        .zip(slow.iter())
        .position(|(f, s)| f.is_some() && s.is_some());

    let signal = match first_valid {
        Some(start) => ema(&diff[start..], signal_period)?,
        None => Vec::new(),
    };

    let mut out = vec![None; values.len()];
    if let Some(start) = first_valid {
        for (i, sig) in signal.into_iter().enumerate() {
            if let Some(sig) = sig {
                let macd_val = diff[start + i];
                out[start + i] = Some(MacdValue {
                    macd: macd_val,
                    signal: sig,
                    histogram: macd_val - sig,
                });
            }
        }
    }
    Ok(out)
}

/// Incremental MACD composing two `Ema`s for the fast/slow lines and a
/// third over their difference for the signal line.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: super::ema::Ema,
    slow: super::ema::Ema,
    signal: super::ema::Ema,
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> IndicatorResult<Self> {
        Ok(Self {
            fast: super::ema::Ema::new(fast_period)?,
            slow: super::ema::Ema::new(slow_period)?,
            signal: super::ema::Ema::new(signal_period)?,
        })
    }

    pub fn update(&mut self, value: f64) -> Option<MacdValue> {
        let fast = self.fast.update(value);
        let slow = self.slow.update(value);
        match (fast, slow) {
            (Some(fast), Some(slow)) => {
                let diff = fast - slow;
                self.signal.update(diff).map(|sig| MacdValue {
                    macd: diff,
                    signal: sig,
                    histogram: diff - sig,
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_matches_batch() {
        let values: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64 * 0.37).sin() * 5.0).collect();
        let batch = macd(&values, 4, 9, 3).unwrap();
        let mut inc = Macd::new(4, 9, 3).unwrap();
        let incremental: Vec<_> = values.iter().map(|&v| inc.update(v)).collect();
        assert_eq!(batch, incremental);
    }

    #[test]
    fn short_series_never_produces_a_signal() {
        let out = macd(&[1.0, 2.0, 3.0], 12, 26, 9).unwrap();
        assert!(out.iter().all(Option::is_none));
    }
}
