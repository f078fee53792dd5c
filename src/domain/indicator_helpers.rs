//! Shared helpers for indicator calculations.

use crate::domain::indicator::{
    IndicatorSeries, IndicatorType, calculate_atr, calculate_bollinger, calculate_ema,
    calculate_kdj, calculate_macd, calculate_obv, calculate_rsi, calculate_sma,
};
use crate::domain::ohlcv::OhlcvBar;

/// Population standard deviation of `window` around a precomputed `mean`.
pub fn population_stddev(window: &[f64], mean: f64) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let variance = window
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / window.len() as f64;
    variance.sqrt()
}

/// Compute any indicator by its typed identity.
pub fn compute_indicator(bars: &[OhlcvBar], indicator: &IndicatorType) -> IndicatorSeries {
    match *indicator {
        IndicatorType::Sma { period } => calculate_sma(bars, period),
        IndicatorType::Ema { period } => calculate_ema(bars, period),
        IndicatorType::Rsi { period } => calculate_rsi(bars, period),
        IndicatorType::Atr { period } => calculate_atr(bars, period),
        IndicatorType::Obv => calculate_obv(bars),
        IndicatorType::Macd { fast, slow, signal } => calculate_macd(bars, fast, slow, signal),
        IndicatorType::Kdj {
            period,
            k_smoothing,
            d_smoothing,
        } => calculate_kdj(bars, period, k_smoothing, d_smoothing),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => calculate_bollinger(bars, period, stddev_mult_x100),
    }
}
