//! Technical indicator implementations.
//!
//! - `IndicatorPoint`: one date of an indicator series; `value` is `None` during warm-up
//! - `IndicatorValue`: the output shape of an indicator at one date
//! - `IndicatorType`: indicator identity + parameters (usable as a map key)
//! - `IndicatorSeries`: a series aligned 1:1 with the input bars

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod kdj;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod sma;

pub use atr::calculate_atr;
pub use bollinger::calculate_bollinger;
pub use ema::calculate_ema;
pub use kdj::calculate_kdj;
pub use macd::calculate_macd;
pub use obv::calculate_obv;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub value: Option<IndicatorValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorValue {
    Simple {
        value: f64,
    },
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Kdj {
        k: f64,
        d: f64,
        j: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
        percent_b: f64,
        bandwidth: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "indicator", rename_all = "snake_case")]
pub enum IndicatorType {
    Sma {
        period: usize,
    },
    Ema {
        period: usize,
    },
    Rsi {
        period: usize,
    },
    Atr {
        period: usize,
    },
    Obv,
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Kdj {
        period: usize,
        k_smoothing: usize,
        d_smoothing: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorPoint {
    pub fn undefined(date: NaiveDate) -> Self {
        Self { date, value: None }
    }

    pub fn simple(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value: Some(IndicatorValue::Simple { value }),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }
}

impl IndicatorValue {
    /// The scalar of a `Simple` value; `None` for multi-output shapes.
    pub fn as_simple(&self) -> Option<f64> {
        match self {
            IndicatorValue::Simple { value } => Some(*value),
            _ => None,
        }
    }
}

impl IndicatorSeries {
    pub fn at(&self, index: usize) -> Option<&IndicatorValue> {
        self.values.get(index).and_then(|p| p.value.as_ref())
    }

    pub fn simple_at(&self, index: usize) -> Option<f64> {
        self.at(index).and_then(IndicatorValue::as_simple)
    }

    /// Index of the first defined point.
    pub fn first_defined(&self) -> Option<usize> {
        self.values.iter().position(IndicatorPoint::is_defined)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma { period } => write!(f, "MA{}", period),
            IndicatorType::Ema { period } => write!(f, "EMA{}", period),
            IndicatorType::Rsi { period } => write!(f, "RSI{}", period),
            IndicatorType::Atr { period } => write!(f, "ATR{}", period),
            IndicatorType::Obv => write!(f, "OBV"),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Kdj {
                period,
                k_smoothing,
                d_smoothing,
            } => write!(f, "KDJ({},{},{})", period, k_smoothing, d_smoothing),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BB({},{})", period, mult)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display_sma() {
        assert_eq!(IndicatorType::Sma { period: 20 }.to_string(), "MA20");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_bollinger() {
        let boll = IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 250,
        };
        assert_eq!(boll.to_string(), "BB(20,2.5)");
    }

    #[test]
    fn indicator_type_display_kdj() {
        let kdj = IndicatorType::Kdj {
            period: 9,
            k_smoothing: 3,
            d_smoothing: 3,
        };
        assert_eq!(kdj.to_string(), "KDJ(9,3,3)");
    }

    #[test]
    fn indicator_type_hash_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(IndicatorType::Sma { period: 5 }, "ma5");
        map.insert(IndicatorType::Sma { period: 20 }, "ma20");
        map.insert(IndicatorType::Rsi { period: 14 }, "rsi14");

        assert_eq!(map.get(&IndicatorType::Sma { period: 20 }), Some(&"ma20"));
        assert_eq!(map.get(&IndicatorType::Rsi { period: 14 }), Some(&"rsi14"));
        assert_eq!(map.get(&IndicatorType::Ema { period: 20 }), None);
    }

    #[test]
    fn undefined_is_distinct_from_zero() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Obv,
            values: vec![IndicatorPoint::undefined(date), IndicatorPoint::simple(date, 0.0)],
        };
        assert_eq!(series.simple_at(0), None);
        assert_eq!(series.simple_at(1), Some(0.0));
        assert_eq!(series.first_defined(), Some(1));
    }

    #[test]
    fn value_serializes_with_kind_tag() {
        let json = serde_json::to_string(&IndicatorValue::Kdj {
            k: 50.0,
            d: 40.0,
            j: 20.0,
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"kdj","k":50.0,"d":40.0,"j":20.0}"#);
    }
}
