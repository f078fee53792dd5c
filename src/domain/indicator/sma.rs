//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). The first (n-1) points are undefined.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

/// Rolling mean over `values`, `None` until the window is full.
pub fn sma_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = sma_values(&closes, period)
        .into_iter()
        .zip(bars)
        .map(|(v, bar)| match v {
            Some(v) => IndicatorPoint::simple(bar.date, v),
            None => IndicatorPoint::undefined(bar.date),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Sma { period },
        values,
    }
}
