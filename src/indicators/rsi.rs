//! Relative Strength Index, Wilder-smoothed (EWM with alpha = 1/period).
use super::{check_period, IndicatorResult};

fn rsi_from_avg(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

pub fn rsi(values: &[f64], period: usize) -> IndicatorResult<Vec<Option<f64>>> {
    check_period(period)?;
    let n = values.len();
    let mut out = vec![None; n];
    if n < period + 1 {
        return Ok(out);
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=period {
        let delta = values[i] - values[i - 1];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses += -delta;
        }
    }
    let mut avg_gain = gains / period as f64;
    let mut avg_loss = losses / period as f64;
    out[period] = Some(rsi_from_avg(avg_gain, avg_loss));

    let alpha = 1.0 / period as f64;
    for i in (period + 1)..n {
        let delta = values[i] - values[i - 1];
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        out[i] = Some(rsi_from_avg(avg_gain, avg_loss));
    }

    Ok(out)
}

/// Incremental Wilder RSI.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_value: Option<f64>,
    seed_deltas: Vec<f64>,
    avg_gain: f64,
    avg_loss: f64,
    seeded: bool,
}

impl Rsi {
    pub fn new(period: usize) -> IndicatorResult<Self> {
        check_period(period)?;
        Ok(Self {
            period,
            prev_value: None,
            seed_deltas: Vec::with_capacity(period),
            avg_gain: 0.0,
            avg_loss: 0.0,
            seeded: false,
        })
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        let prev = match self.prev_value.replace(value) {
            Some(p) => p,
            None => return None,
        };
        let delta = value - prev;

        if !self.seeded {
            self.seed_deltas.push(delta);
            if self.seed_deltas.len() < self.period {
                return None;
            }
            let gains: f64 = self.seed_deltas.iter().cloned().filter(|&d| d > 0.0).sum();
            let losses: f64 = self
                .seed_deltas
                .iter()
                .cloned()
                .filter(|&d| d < 0.0)
                .map(|d| -d)
                .sum();
            self.avg_gain = gains / self.period as f64;
            self.avg_loss = losses / self.period as f64;
            self.seeded = true;
            return Some(rsi_from_avg(self.avg_gain, self.avg_loss));
        }

        let alpha = 1.0 / self.period as f64;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        self.avg_gain = alpha * gain + (1.0 - alpha) * self.avg_gain;
        self.avg_loss = alpha * loss + (1.0 - alpha) * self.avg_loss;
        Some(rsi_from_avg(self.avg_gain, self.avg_loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_gains_gives_rsi_100() {
        let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let out = rsi(&values, 14).unwrap();
        assert_eq!(out[14], Some(100.0));
    }

    #[test]
    fn incremental_matches_batch() {
        let values = [
            44.0, 44.25, 44.5, 43.75, 44.65, 45.1, 45.3, 45.0, 44.8, 45.6, 46.1, 46.0, 45.8, 46.5,
            46.9, 46.45, 46.2, 47.0,
        ];
        let batch = rsi(&values, 14).unwrap();
        let mut inc = Rsi::new(14).unwrap();
        let incremental: Vec<_> = values.iter().map(|&v| inc.update(v)).collect();
        assert_eq!(batch, incremental);
    }
}
