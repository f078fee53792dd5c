//! ATR (Average True Range) as a simple rolling mean of true range.
//!
//! TR[0] = high - low; TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|).
//! Warmup: the first (period-1) bars are undefined.

use crate::domain::indicator::sma::sma_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let tr_values: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let values = sma_values(&tr_values, period)
        .into_iter()
        .zip(bars)
        .map(|(v, bar)| match v {
            Some(v) => IndicatorPoint::simple(bar.date, v),
            None => IndicatorPoint::undefined(bar.date),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Atr { period },
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(day: u32, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn atr_warmup() {
        let bars: Vec<OhlcvBar> = (1..=5).map(|d| make_bar(d, 110.0, 90.0, 100.0)).collect();
        let series = calc(&bars, 3);
        assert_eq!(series.values.len(), 5);
        assert!(!series.values[0].is_defined());
        assert!(!series.values[1].is_defined());
        assert!(series.values[2].is_defined());
        assert!((series.simple_at(4).unwrap() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn atr_is_rolling_mean_of_true_range() {
        let bars = vec![
            make_bar(1, 110.0, 100.0, 105.0), // TR 10
            make_bar(2, 115.0, 105.0, 110.0), // TR 10
            make_bar(3, 120.0, 110.0, 115.0), // TR 10
            make_bar(4, 140.0, 130.0, 135.0), // gap: TR = 140 - 115 = 25
        ];
        let series = calc(&bars, 3);
        assert!((series.simple_at(2).unwrap() - 10.0).abs() < 1e-12);
        assert!((series.simple_at(3).unwrap() - 15.0).abs() < 1e-12);
    }

    fn calc(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
        calculate_atr(bars, period)
    }
}
