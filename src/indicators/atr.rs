//! Average True Range, Wilder-smoothed.
use super::{check_period, IndicatorResult};

fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    match prev_close {
        None => high - low,
        Some(pc) => (high - low).max((high - pc).abs()).max((low - pc).abs()),
    }
}

pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorResult<Vec<Option<f64>>> {
    check_period(period)?;
    let n = high.len();
    let mut tr = Vec::with_capacity(n);
    for i in 0..n {
        let prev_close = if i == 0 { None } else { Some(close[i - 1]) };
        tr.push(true_range(high[i], low[i], prev_close));
    }

    let mut out = vec![None; n];
    if n < period {
        return Ok(out);
    }

    let mut avg = tr[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(avg);
    let alpha = 1.0 / period as f64;
    for i in period..n {
        avg = alpha * tr[i] + (1.0 - alpha) * avg;
        out[i] = Some(avg);
    }
    Ok(out)
}

/// Incremental Wilder ATR.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    seed_tr: Vec<f64>,
    avg: f64,
    seeded: bool,
}

impl Atr {
    pub fn new(period: usize) -> IndicatorResult<Self> {
        check_period(period)?;
        Ok(Self {
            period,
            prev_close: None,
            seed_tr: Vec::with_capacity(period),
            avg: 0.0,
            seeded: false,
        })
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let tr = true_range(high, low, self.prev_close);
        self.prev_close = Some(close);

        if !self.seeded {
            self.seed_tr.push(tr);
            if self.seed_tr.len() < self.period {
                return None;
            }
            self.avg = self.seed_tr.iter().sum::<f64>() / self.period as f64;
            self.seeded = true;
            return Some(self.avg);
        }

        let alpha = 1.0 / self.period as f64;
        self.avg = alpha * tr + (1.0 - alpha) * self.avg;
        Some(self.avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_matches_batch() {
        let high = [10.0, 10.5, 11.0, 10.8, 11.2, 11.5, 11.3, 11.8];
        let low = [9.5, 9.8, 10.2, 10.1, 10.6, 10.9, 10.8, 11.0];
        let close = [9.8, 10.2, 10.6, 10.4, 11.0, 11.2, 11.0, 11.5];
        let batch = atr(&high, &low, &close, 3).unwrap();
        let mut inc = Atr::new(3).unwrap();
        let incremental: Vec<_> = (0..high.len())
            .map(|i| inc.update(high[i], low[i], close[i]))
            .collect();
        assert_eq!(batch, incremental);
    }

    #[test]
    fn first_bar_true_range_is_high_minus_low() {
        let out = atr(&[10.0], &[9.0], &[9.5], 1).unwrap();
        assert_eq!(out[0], Some(1.0));
    }
}
