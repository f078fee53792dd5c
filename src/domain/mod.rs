//! Core domain types and pure computations.

pub mod ohlcv;
pub mod price_series;
pub mod metric_value;
pub mod indicator;
pub mod indicator_helpers;
pub mod signal;
pub mod technical;
pub mod risk;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod normal;
pub mod option;
pub mod pricing;
pub mod screener;
pub mod config_validation;
pub mod error;
