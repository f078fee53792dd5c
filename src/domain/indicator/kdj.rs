//! KDJ stochastic oscillator.
//!
//! RSV[i] = 100 * (C[i] - LL) / (HH - LL) over the last `period` highs/lows
//! (50 when HH == LL). K and D are exponentially smoothed, both seeded at 50:
//!
//! K[i] = K[i-1] * (1 - 1/k_smoothing) + RSV[i] / k_smoothing
//! D[i] = D[i-1] * (1 - 1/d_smoothing) + K[i] / d_smoothing
//! J[i] = 3 * D[i] - 2 * K[i]
//!
//! Warmup: the first (period-1) bars are undefined.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

const SEED: f64 = 50.0;

pub fn calculate_kdj(
    bars: &[OhlcvBar],
    period: usize,
    k_smoothing: usize,
    d_smoothing: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Kdj {
        period,
        k_smoothing,
        d_smoothing,
    };
    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint::undefined(b.date))
        .collect();

    if period == 0 || k_smoothing == 0 || d_smoothing == 0 {
        return IndicatorSeries {
            indicator_type,
            values,
        };
    }

    let alpha_k = 1.0 / k_smoothing as f64;
    let alpha_d = 1.0 / d_smoothing as f64;
    let mut k = SEED;
    let mut d = SEED;

    for i in (period - 1)..bars.len() {
        let window = &bars[i + 1 - period..=i];
        let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let rsv = if highest > lowest {
            100.0 * (bars[i].close - lowest) / (highest - lowest)
        } else {
            SEED
        };

        k = k * (1.0 - alpha_k) + rsv * alpha_k;
        d = d * (1.0 - alpha_d) + k * alpha_d;

        values[i] = IndicatorPoint {
            date: bars[i].date,
            value: Some(IndicatorValue::Kdj {
                k,
                d,
                j: 3.0 * d - 2.0 * k,
            }),
        };
    }

    IndicatorSeries {
        indicator_type,
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

    fn kdj_at(series: &IndicatorSeries, i: usize) -> (f64, f64, f64) {
        match series.at(i) {
            Some(IndicatorValue::Kdj { k, d, j }) => (*k, *d, *j),
            other => panic!("expected KDJ at {}, got {:?}", i, other),
        }
    }

    #[test]
    fn kdj_warmup() {
        let bars: Vec<OhlcvBar> = (1..=5).map(|d| make_bar(d, 11.0, 9.0, 10.0)).collect();
        let series = calculate_kdj(&bars, 3, 3, 3);
        assert!(!series.values[0].is_defined());
        assert!(!series.values[1].is_defined());
        assert!(series.values[2].is_defined());
    }

    #[test]
    fn first_step_from_seed() {
        // window high 12, low 8, close 11 → RSV = 75
        let bars = vec![
            make_bar(1, 10.0, 8.0, 9.0),
            make_bar(2, 12.0, 9.0, 10.0),
            make_bar(3, 11.5, 9.5, 11.0),
        ];
        let series = calculate_kdj(&bars, 3, 3, 3);
        let (k, d, j) = kdj_at(&series, 2);

        let expected_k = 50.0 * 2.0 / 3.0 + 75.0 / 3.0;
        let expected_d = 50.0 * 2.0 / 3.0 + expected_k / 3.0;
        assert!((k - expected_k).abs() < 1e-9);
        assert!((d - expected_d).abs() < 1e-9);
        assert!((j - (3.0 * expected_d - 2.0 * expected_k)).abs() < 1e-9);
    }

    #[test]
    fn flat_range_stays_at_seed() {
        let bars: Vec<OhlcvBar> = (1..=6).map(|d| make_bar(d, 10.0, 10.0, 10.0)).collect();
        let series = calculate_kdj(&bars, 3, 3, 3);
        for i in 2..6 {
            let (k, d, j) = kdj_at(&series, i);
            assert!((k - 50.0).abs() < 1e-12);
            assert!((d - 50.0).abs() < 1e-12);
            assert!((j - 50.0).abs() < 1e-12);
        }
    }

    #[test]
    fn k_and_d_stay_in_range() {
        let bars: Vec<OhlcvBar> = (1..=28)
            .map(|d| {
                let c = 100.0 + ((d as f64) * 1.3).sin() * 8.0;
                make_bar(d, c + 1.5, c - 1.5, c)
            })
            .collect();
        let series = calculate_kdj(&bars, 9, 3, 3);
        for i in 8..28 {
            let (k, d, _) = kdj_at(&series, i);
            assert!((0.0..=100.0).contains(&k));
            assert!((0.0..=100.0).contains(&d));
        }
    }
}
