//! Bollinger Bands.
//!
//! - Middle: SMA over n closes
//! - Upper/Lower: Middle ± (multiplier × population StdDev)
//! - %B: (C - Lower) / (Upper - Lower), 0.5 when the bands collapse
//! - Bandwidth: (Upper - Lower) / Middle
//!
//! Warmup: the first (period-1) bars are undefined.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::population_stddev;
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

pub fn calculate_bollinger(
    bars: &[OhlcvBar],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let mult = stddev_mult_x100 as f64 / 100.0;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if period == 0 || i + 1 < period {
                return IndicatorPoint::undefined(bar.date);
            }
            let window = &closes[i + 1 - period..=i];
            let middle = window.iter().sum::<f64>() / period as f64;
            let stddev = population_stddev(window, middle);
            let upper = middle + mult * stddev;
            let lower = middle - mult * stddev;
            let width = upper - lower;
            let percent_b = if width > 0.0 {
                (bar.close - lower) / width
            } else {
                0.5
            };

            IndicatorPoint {
                date: bar.date,
                value: Some(IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                    percent_b,
                    bandwidth: width / middle,
                }),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    }
}
