//! Explicit "undefined" sentinel for scalar metrics.
//!
//! Metrics that have no meaningful value for a given input (beta without a
//! benchmark, Sharpe at zero volatility, win rate with no closed trades) are
//! reported as `MetricValue::Undefined` with a reason, never as 0 or NaN.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    NoBenchmark,
    InsufficientOverlap,
    ZeroBenchmarkVariance,
    ZeroVolatility,
    NoClosedTrades,
    NoLosingTrades,
    ZeroOptionPrice,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Defined(f64),
    Undefined(UndefinedReason),
}

impl MetricValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Defined(v) => Some(*v),
            MetricValue::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, MetricValue::Defined(_))
    }
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UndefinedReason::NoBenchmark => "no benchmark",
            UndefinedReason::InsufficientOverlap => "insufficient overlap",
            UndefinedReason::ZeroBenchmarkVariance => "zero benchmark variance",
            UndefinedReason::ZeroVolatility => "zero volatility",
            UndefinedReason::NoClosedTrades => "no closed trades",
            UndefinedReason::NoLosingTrades => "no losing trades",
            UndefinedReason::ZeroOptionPrice => "zero option price",
        };
        f.write_str(text)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Defined(v) => write!(f, "{:.4}", v),
            MetricValue::Undefined(reason) => write!(f, "undefined ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_value() {
        let m = MetricValue::Defined(1.25);
        assert!(m.is_defined());
        assert_eq!(m.value(), Some(1.25));
        assert_eq!(m.to_string(), "1.2500");
    }

    #[test]
    fn undefined_value() {
        let m = MetricValue::Undefined(UndefinedReason::NoBenchmark);
        assert!(!m.is_defined());
        assert_eq!(m.value(), None);
        assert_eq!(m.to_string(), "undefined (no benchmark)");
    }

    #[test]
    fn serializes_as_tagged_record() {
        let value = MetricValue::Undefined(UndefinedReason::ZeroVolatility);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"status":"undefined","value":"zero_volatility"}"#);

        let json = serde_json::to_string(&MetricValue::Defined(0.5)).unwrap();
        assert_eq!(json, r#"{"status":"defined","value":0.5}"#);
    }
}
