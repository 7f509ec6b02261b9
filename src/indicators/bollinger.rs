//! Bollinger Bands: an SMA midline with upper/lower bands at
//! `num_std` sample standard deviations.
use super::sma::sma;
use super::{check_period, IndicatorResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

pub fn bollinger_bands(
    values: &[f64],
    period: usize,
    num_std: f64,
) -> IndicatorResult<Vec<Option<BollingerBands>>> {
    check_period(period)?;
    let middle = sma(values, period)?;
    let mut out = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        match middle[i] {
            None => out.push(None),
            Some(mid) => {
                let window = &values[i + 1 - period..=i];
                let variance =
                    window.iter().map(|v| (v - mid).powi(2)).sum::<f64>() / period as f64;
                let std = variance.sqrt();
                out.push(Some(BollingerBands {
                    middle: mid,
                    upper: mid + num_std * std,
                    lower: mid - num_std * std,
                }));
            }
        }
    }
    Ok(out)
}

/// Incremental Bollinger Bands over a fixed-size window.
#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    num_std: f64,
    window: std::collections::VecDeque<f64>,
}

impl Bollinger {
    pub fn new(period: usize, num_std: f64) -> IndicatorResult<Self> {
        check_period(period)?;
        Ok(Self {
            period,
            num_std,
            window: std::collections::VecDeque::with_capacity(period),
        })
    }

    pub fn update(&mut self, value: f64) -> Option<BollingerBands> {
        self.window.push_back(value);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        if self.window.len() < self.period {
            return None;
        }
        let mid = self.window.iter().sum::<f64>() / self.period as f64;
        let variance = self.window.iter().map(|v| (v - mid).powi(2)).sum::<f64>() / self.period as f64;
        let std = variance.sqrt();
        Some(BollingerBands {
            middle: mid,
            upper: mid + self.num_std * std,
            lower: mid - self.num_std * std,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_has_zero_width_bands() {
        let values = [5.0; 10];
        let out = bollinger_bands(&values, 5, 2.0).unwrap();
        let last = out.last().unwrap().unwrap();
        assert_eq!(last.upper, last.middle);
        assert_eq!(last.lower, last.middle);
    }

    #[test]
    fn incremental_matches_batch() {
        let values = [1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 3.0];
        let batch = bollinger_bands(&values, 4, 2.0).unwrap();
        let mut inc = Bollinger::new(4, 2.0).unwrap();
        let incremental: Vec<_> = values.iter().map(|&v| inc.update(v)).collect();
        assert_eq!(batch, incremental);
    }
}
