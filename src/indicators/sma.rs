//! Simple moving average.
use std::collections::VecDeque;

use super::{check_period, IndicatorResult};

/// Computes the SMA over `values`, one output per input, `None` until
/// `period` values have accumulated.
pub fn sma(values: &[f64], period: usize) -> IndicatorResult<Vec<Option<f64>>> {
    check_period(period)?;
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    let mut window: VecDeque<f64> = VecDeque::with_capacity(period);

    for &v in values {
        window.push_back(v);
        sum += v;
        if window.len() > period {
            sum -= window.pop_front().unwrap();
        }
        if window.len() == period {
            out.push(Some(sum / period as f64));
        } else {
            out.push(None);
        }
    }
    Ok(out)
}

/// Incremental SMA: O(1) per update via a ring buffer and running sum.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> IndicatorResult<Self> {
        check_period(period)?;
        Ok(Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            self.sum -= self.window.pop_front().unwrap();
        }
        if self.window.len() == self.period {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_hand_computed_values() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&values, 3).unwrap();
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn incremental_matches_batch() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let batch = sma(&values, 4).unwrap();
        let mut inc = Sma::new(4).unwrap();
        let incremental: Vec<_> = values.iter().map(|&v| inc.update(v)).collect();
        assert_eq!(batch, incremental);
    }

    #[test]
    fn rejects_zero_period() {
        assert!(sma(&[1.0, 2.0], 0).is_err());
    }
}
