//! Canonical, validated daily price series.
//!
//! A `PriceSeries` is built once from bars supplied by a data collaborator and is
//! read-only afterwards. Engines derive their own result structures from it.

use crate::domain::error::StockscopeError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    code: String,
    bars: Vec<OhlcvBar>,
}

impl PriceSeries {
    /// Validate and wrap `bars`.
    ///
    /// Fails on an empty series, non-increasing dates, or any bar that breaks
    /// `low <= open, close <= high`, positive prices, or `volume >= 0`.
    pub fn new(code: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, StockscopeError> {
        let code = code.into();
        if bars.is_empty() {
            return Err(StockscopeError::EmptySeries { code });
        }

        for (index, bar) in bars.iter().enumerate() {
            if let Some(reason) = bar.check() {
                return Err(StockscopeError::InvalidBar {
                    code,
                    index,
                    reason,
                });
            }
            if index > 0 && bar.date <= bars[index - 1].date {
                return Err(StockscopeError::NonMonotonicDates { code, index });
            }
        }

        Ok(Self { code, bars })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &OhlcvBar {
        &self.bars[0]
    }

    pub fn last(&self) -> &OhlcvBar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn close_by_date(&self) -> HashMap<NaiveDate, f64> {
        self.bars.iter().map(|b| (b.date, b.close)).collect()
    }

    /// ln(C[i] / C[i-1]) for every consecutive pair.
    pub fn log_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| (w[1].close / w[0].close).ln())
            .collect()
    }

    /// C[i] / C[i-1] - 1 for every consecutive pair.
    pub fn simple_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| w[1].close / w[0].close - 1.0)
            .collect()
    }
}
