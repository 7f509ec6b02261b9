//! Position sizing from a risk budget.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskConfigError {
    OutOfRange { field: &'static str, value: f64 },
}

impl fmt::Display for RiskConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskConfigError::OutOfRange { field, value } => {
                write!(f, "{field} out of range: {value}")
            }
        }
    }
}

impl std::error::Error for RiskConfigError {}

#[derive(Debug, Clone, Copy)]
pub struct RiskConfig {
    pub risk_pct: f64,
    pub max_position_pct: f64,
}

impl RiskConfig {
    pub fn new(risk_pct: f64, max_position_pct: f64) -> Result<Self, RiskConfigError> {
        if !(risk_pct > 0.0 && risk_pct <= 0.1) {
            return Err(RiskConfigError::OutOfRange {
                field: "risk_pct",
                value: risk_pct,
            });
        }
        if !(max_position_pct > 0.0 && max_position_pct <= 1.0) {
            return Err(RiskConfigError::OutOfRange {
                field: "max_position_pct",
                value: max_position_pct,
            });
        }
        Ok(Self {
            risk_pct,
            max_position_pct,
        })
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_pct: 0.01,
            max_position_pct: 1.0,
        }
    }
}

/// Sizes a position from a per-trade risk budget: risk `risk_pct` of
/// capital on the distance to the stop, capped so notional never
/// exceeds `max_position_pct` of capital.
pub struct PositionSizer;

impl PositionSizer {
    pub fn size(capital: f64, entry_price: f64, stop_price: f64, risk_pct: f64, max_position_pct: f64) -> f64 {
        if capital <= 0.0 || entry_price <= 0.0 {
            return 0.0;
        }

        let risk_amount = capital * risk_pct;
        let risk_per_unit = (entry_price - stop_price).abs();
        if risk_per_unit <= 0.0 {
            return 0.0;
        }

        let size_by_risk = risk_amount / risk_per_unit;
        let size_by_cap = (capital * max_position_pct) / entry_price;
        size_by_risk.min(size_by_cap).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_at_stop_equals_risk_budget() {
        let capital = 10_000.0;
        let entry = 100.0;
        let stop = 98.0;
        let size = PositionSizer::size(capital, entry, stop, 0.01, 1.0);
        let loss = (entry - stop) * size;
        assert!((loss - capital * 0.01).abs() < 1e-8);
    }

    #[test]
    fn notional_never_exceeds_max_position_pct() {
        let capital = 10_000.0;
        let entry = 100.0;
        let stop = 99.99;
        let size = PositionSizer::size(capital, entry, stop, 0.05, 0.2);
        assert!(size * entry <= capital * 0.2 + 1e-8);
    }

    #[test]
    fn zero_distance_to_stop_returns_zero() {
        assert_eq!(PositionSizer::size(10_000.0, 100.0, 100.0, 0.01, 1.0), 0.0);
    }

    #[test]
    fn rejects_risk_pct_out_of_range() {
        assert!(RiskConfig::new(0.0, 1.0).is_err());
        assert!(RiskConfig::new(0.2, 1.0).is_err());
    }
}
