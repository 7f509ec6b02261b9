//! Exponential moving average, seeded with an SMA of the first `period`
//! values per the usual convention (matches pandas' `adjust=False` EWM
//! once seeded, which is what the strategies in this crate assume).
use super::{check_period, IndicatorResult};

pub fn alpha(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

pub fn ema(values: &[f64], period: usize) -> IndicatorResult<Vec<Option<f64>>> {
    check_period(period)?;
    let mut out = vec![None; values.len()];
    if values.len() < period {
        return Ok(out);
    }

    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(seed);
    let a = alpha(period);
    let mut prev = seed;
    for (i, &v) in values.iter().enumerate().skip(period) {
        let next = a * v + (1.0 - a) * prev;
        out[i] = Some(next);
        prev = next;
    }
    Ok(out)
}

/// Incremental EMA. Seeds itself from the first `period` samples it
/// sees, exactly like the batch form.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    seed_buf: Vec<f64>,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> IndicatorResult<Self> {
        check_period(period)?;
        Ok(Self {
            period,
            alpha: alpha(period),
            seed_buf: Vec::with_capacity(period),
            value: None,
        })
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        if let Some(prev) = self.value {
            let next = self.alpha * value + (1.0 - self.alpha) * prev;
            self.value = Some(next);
            return Some(next);
        }

        self.seed_buf.push(value);
        if self.seed_buf.len() == self.period {
            let seed = self.seed_buf.iter().sum::<f64>() / self.period as f64;
            self.value = Some(seed);
            return Some(seed);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_matches_batch() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let batch = ema(&values, 3).unwrap();
        let mut inc = Ema::new(3).unwrap();
        let incremental: Vec<_> = values.iter().map(|&v| inc.update(v)).collect();
        assert_eq!(batch, incremental);
    }

    #[test]
    fn short_series_is_all_none() {
        let out = ema(&[1.0, 2.0], 5).unwrap();
        assert!(out.iter().all(Option::is_none));
    }
}
