//! Keltner Channels: an EMA midline with bands at `multiplier` ATRs.
use super::atr::atr;
use super::ema::ema;
use super::{check_period, IndicatorResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeltnerChannels {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

pub fn keltner_channels(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    ema_period: usize,
    atr_period: usize,
    multiplier: f64,
) -> IndicatorResult<Vec<Option<KeltnerChannels>>> {
    check_period(ema_period)?;
    check_period(atr_period)?;
    let middle = ema(close, ema_period)?;
    let bands = atr(high, low, close, atr_period)?;

    let out = middle
        .into_iter()
        .zip(bands)
        .map(|(mid, a)| match (mid, a) {
            (Some(mid), Some(a)) => Some(KeltnerChannels {
                middle: mid,
                upper: mid + multiplier * a,
                lower: mid - multiplier * a,
            }),
            _ => None,
        })
        .collect();
    Ok(out)
}

/// Incremental Keltner Channels composing an `Ema` and an `Atr`.
#[derive(Debug, Clone)]
pub struct Keltner {
    ema: super::ema::Ema,
    atr: super::atr::Atr,
    multiplier: f64,
}

impl Keltner {
    pub fn new(ema_period: usize, atr_period: usize, multiplier: f64) -> IndicatorResult<Self> {
        Ok(Self {
            ema: super::ema::Ema::new(ema_period)?,
            atr: super::atr::Atr::new(atr_period)?,
            multiplier,
        })
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<KeltnerChannels> {
        let mid = self.ema.update(close);
        let a = self.atr.update(high, low, close);
        match (mid, a) {
            (Some(mid), Some(a)) => Some(KeltnerChannels {
                middle: mid,
                upper: mid + self.multiplier * a,
                lower: mid - self.multiplier * a,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_matches_batch() {
        let high = [10.0, 10.5, 11.0, 10.8, 11.2, 11.5, 11.3, 11.8, 12.0, 11.9];
        let low = [9.5, 9.8, 10.2, 10.1, 10.6, 10.9, 10.8, 11.0, 11.4, 11.2];
        let close = [9.8, 10.2, 10.6, 10.4, 11.0, 11.2, 11.0, 11.5, 11.8, 11.5];
        let batch = keltner_channels(&high, &low, &close, 3, 3, 2.0).unwrap();
        let mut inc = Keltner::new(3, 3, 2.0).unwrap();
        let incremental: Vec<_> = (0..high.len())
            .map(|i| inc.update(high[i], low[i], close[i]))
            .collect();
        assert_eq!(batch, incremental);
    }
}
