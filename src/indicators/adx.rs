//! Average Directional Index, grounded on the EMA-smoothed +DM/-DM/DX
//! approach (span-based EWM, not Wilder's alternative smoothing) used
//! throughout this codebase's other trend indicators.
use super::ema::Ema;
use super::{check_period, IndicatorResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxValue {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

pub fn adx(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
) -> IndicatorResult<Vec<Option<AdxValue>>> {
    check_period(period)?;
    let n = high.len();
    let mut out = vec![None; n];
    let mut inc = Adx::new(period)?;
    for i in 0..n {
        out[i] = inc.update(high[i], low[i], close[i]);
    }
    Ok(out)
}

/// Incremental ADX composing three `Ema`s (true range, +DM, -DM) plus a
/// fourth over the resulting DX series.
#[derive(Debug, Clone)]
pub struct Adx {
    tr_ema: Ema,
    plus_dm_ema: Ema,
    minus_dm_ema: Ema,
    dx_ema: Ema,
    prev_high: Option<f64>,
    prev_low: Option<f64>,
    prev_close: Option<f64>,
}

impl Adx {
    pub fn new(period: usize) -> IndicatorResult<Self> {
        Ok(Self {
            tr_ema: Ema::new(period)?,
            plus_dm_ema: Ema::new(period)?,
            minus_dm_ema: Ema::new(period)?,
            dx_ema: Ema::new(period)?,
            prev_high: None,
            prev_low: None,
            prev_close: None,
        })
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<AdxValue> {
        let (ph, pl, pc) = match (self.prev_high, self.prev_low, self.prev_close) {
            (Some(ph), Some(pl), Some(pc)) => (ph, pl, pc),
            _ => {
                self.prev_high = Some(high);
                self.prev_low = Some(low);
                self.prev_close = Some(close);
                return None;
            }
        };

        let up_move = high - ph;
        let down_move = pl - low;
        let mut plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let mut minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };
        if plus_dm < minus_dm {
            plus_dm = 0.0;
        }
        if minus_dm < plus_dm {
            minus_dm = 0.0;
        }
        let tr = (high - low).max((high - pc).abs()).max((low - pc).abs());

        self.prev_high = Some(high);
        self.prev_low = Some(low);
        self.prev_close = Some(close);

        let atr = self.tr_ema.update(tr);
        let plus_dm_avg = self.plus_dm_ema.update(plus_dm);
        let minus_dm_avg = self.minus_dm_ema.update(minus_dm);

        let (Some(atr), Some(plus_dm_avg), Some(minus_dm_avg)) = (atr, plus_dm_avg, minus_dm_avg) else {
            return None;
        };
        if atr == 0.0 {
            return None;
        }

        let plus_di = 100.0 * plus_dm_avg / atr;
        let minus_di = 100.0 * minus_dm_avg / atr;
        let sum = plus_di + minus_di;
        let dx = if sum == 0.0 { 0.0 } else { 100.0 * (plus_di - minus_di).abs() / sum };

        self.dx_ema.update(dx).map(|adx| AdxValue {
            adx,
            plus_di,
            minus_di,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_uptrend_has_dominant_plus_di() {
        let n = 60;
        let high: Vec<f64> = (0..n).map(|i| 10.0 + i as f64 * 0.5).collect();
        let low: Vec<f64> = (0..n).map(|i| 9.5 + i as f64 * 0.5).collect();
        let close: Vec<f64> = (0..n).map(|i| 9.8 + i as f64 * 0.5).collect();
        let out = adx(&high, &low, &close, 14).unwrap();
        let last = out.last().unwrap().unwrap();
        assert!(last.plus_di > last.minus_di);
    }

    #[test]
    fn incremental_matches_batch() {
        let n = 40;
        let high: Vec<f64> = (0..n).map(|i| 10.0 + (i as f64 * 0.3).sin() * 2.0 + i as f64 * 0.1).collect();
        let low: Vec<f64> = high.iter().map(|h| h - 1.0).collect();
        let close: Vec<f64> = high.iter().map(|h| h - 0.3).collect();
        let batch = adx(&high, &low, &close, 14).unwrap();
        let mut inc = Adx::new(14).unwrap();
        let incremental: Vec<_> = (0..n).map(|i| inc.update(high[i], low[i], close[i])).collect();
        assert_eq!(batch, incremental);
    }

    #[test]
    fn rejects_zero_period() {
        assert!(adx(&[1.0], &[1.0], &[1.0], 0).is_err());
    }
}
