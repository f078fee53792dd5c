//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the SMA of the first n values, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). The first (n-1) points are undefined.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

/// EMA over the defined tail of `values`.
///
/// Leading `None`s are skipped; the seed window starts at the first defined
/// value. Used directly by MACD to smooth its own line.
pub fn ema_values(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    let Some(start) = values.iter().position(Option::is_some) else {
        return out;
    };

    let k = 2.0 / (period as f64 + 1.0);
    let mut sum = 0.0;
    let mut ema = 0.0;

    for (offset, v) in values[start..].iter().enumerate() {
        let Some(v) = *v else {
            break;
        };
        let i = start + offset;
        if offset + 1 < period {
            sum += v;
        } else if offset + 1 == period {
            sum += v;
            ema = sum / period as f64;
            out[i] = Some(ema);
        } else {
            ema = v * k + ema * (1.0 - k);
            out[i] = Some(ema);
        }
    }
    out
}

pub fn calculate_ema(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
    let values = ema_values(&closes, period)
        .into_iter()
        .zip(bars)
        .map(|(v, bar)| match v {
            Some(v) => IndicatorPoint::simple(bar.date, v),
            None => IndicatorPoint::undefined(bar.date),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema { period },
        values,
    }
}
