//! OHLCV bar representation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Describes the first violated bar invariant, if any.
    pub fn check(&self) -> Option<String> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Some("prices must be finite".into());
        }
        if prices.iter().any(|&p| p <= 0.0) {
            return Some("prices must be positive".into());
        }
        if self.low > self.high {
            return Some(format!("low {} above high {}", self.low, self.high));
        }
        if self.open < self.low || self.open > self.high {
            return Some(format!("open {} outside [{}, {}]", self.open, self.low, self.high));
        }
        if self.close < self.low || self.close > self.high {
            return Some(format!(
                "close {} outside [{}, {}]",
                self.close, self.low, self.high
            ));
        }
        if self.volume < 0 {
            return Some(format!("negative volume {}", self.volume));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000,
        }
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = sample_bar();
        // high-low=20, |high-100|=10, |low-100|=10 → 20
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = sample_bar();
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = sample_bar();
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn valid_bar_passes_check() {
        assert!(sample_bar().check().is_none());
    }

    #[test]
    fn close_above_high_fails_check() {
        let bar = OhlcvBar {
            close: 111.0,
            ..sample_bar()
        };
        assert!(bar.check().unwrap().contains("close"));
    }

    #[test]
    fn negative_volume_fails_check() {
        let bar = OhlcvBar {
            volume: -1,
            ..sample_bar()
        };
        assert!(bar.check().unwrap().contains("volume"));
    }

    #[test]
    fn non_positive_price_fails_check() {
        let bar = OhlcvBar {
            low: 0.0,
            ..sample_bar()
        };
        assert!(bar.check().is_some());
    }
}
