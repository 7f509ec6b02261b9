//! A small closed value type for parameter grids, shared by the
//! strategy registry and the optimizer. Generalizes the strategies'
//! heterogeneous config fields (`usize` windows, `f64` thresholds,
//! `bool` flags, string-tagged enums like `SignalMode`) into one type
//! a grid can hold without resorting to `dyn Any`.
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    F64(f64),
    I64(i64),
    Bool(bool),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::F64(v) => Some(*v),
            ParamValue::I64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::I64(v) if *v >= 0 => Some(*v as usize),
            ParamValue::F64(v) if *v >= 0.0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_usize().map(|v| v as u32)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::F64(v) => write!(f, "{v}"),
            ParamValue::I64(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::F64(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::I64(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::I64(v as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

/// A map of parameter name to candidate values; the Cartesian product
/// of every entry's values forms the optimizer's search space.
pub type ParamGrid = HashMap<String, Vec<ParamValue>>;

/// One concrete assignment of every varied parameter, used both to
/// build a strategy/backtest config and as the key set reported back
/// in an optimization result row.
pub type ParamSet = HashMap<String, ParamValue>;

/// Every combination of values across `grid`'s entries, in a
/// deterministic order (keys sorted lexically so repeated runs over
/// the same grid enumerate identically before any sampling is
/// applied).
pub fn cartesian_product(grid: &ParamGrid) -> Vec<ParamSet> {
    let mut keys: Vec<&String> = grid.keys().collect();
    keys.sort();

    let mut combos: Vec<ParamSet> = vec![HashMap::new()];
    for key in keys {
        let values = &grid[key];
        let mut next = Vec::with_capacity(combos.len() * values.len().max(1));
        for combo in &combos {
            for value in values {
                let mut extended = combo.clone();
                extended.insert(key.clone(), value.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

pub fn get_f64(params: &ParamSet, key: &str, default: f64) -> f64 {
    params.get(key).and_then(ParamValue::as_f64).unwrap_or(default)
}

pub fn get_usize(params: &ParamSet, key: &str, default: usize) -> usize {
    params.get(key).and_then(ParamValue::as_usize).unwrap_or(default)
}

pub fn get_bool(params: &ParamSet, key: &str, default: bool) -> bool {
    params.get(key).and_then(ParamValue::as_bool).unwrap_or(default)
}

pub fn get_str<'a>(params: &'a ParamSet, key: &str, default: &'a str) -> &'a str {
    params.get(key).and_then(ParamValue::as_str).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_of_two_params_has_expected_size() {
        let mut grid: ParamGrid = HashMap::new();
        grid.insert("a".into(), vec![1i64.into(), 2i64.into()]);
        grid.insert("b".into(), vec!["x".into(), "y".into(), "z".into()]);
        let combos = cartesian_product(&grid);
        assert_eq!(combos.len(), 6);
    }

    #[test]
    fn empty_grid_yields_one_empty_combination() {
        let grid: ParamGrid = HashMap::new();
        let combos = cartesian_product(&grid);
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }
}
