//! OBV (On-Balance Volume).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

/// Calculate OBV.
///
/// OBV[0] = volume[0]
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// No warmup; every point is defined.
pub fn calculate_obv(bars: &[OhlcvBar]) -> IndicatorSeries {
    let mut obv = 0.0;
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let volume = bar.volume as f64;
            if i == 0 {
                obv = volume;
            } else if bar.close > bars[i - 1].close {
                obv += volume;
            } else if bar.close < bars[i - 1].close {
                obv -= volume;
            }
            IndicatorPoint::simple(bar.date, obv)
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Obv,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(date: &str, close: f64, volume: i64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    #[test]
    fn up_down_flat_days() {
        let bars = vec![
            make_bar("2024-01-01", 10.0, 100),
            make_bar("2024-01-02", 11.0, 200),
            make_bar("2024-01-03", 10.5, 50),
            make_bar("2024-01-04", 10.5, 999),
        ];
        let series = calculate_obv(&bars);
        assert_eq!(series.simple_at(0), Some(100.0));
        assert_eq!(series.simple_at(1), Some(300.0));
        assert_eq!(series.simple_at(2), Some(250.0));
        assert_eq!(series.simple_at(3), Some(250.0));
    }

    #[test]
    fn empty_input() {
        assert!(calculate_obv(&[]).values.is_empty());
    }
}
