#![allow(dead_code)]

use chrono::NaiveDate;
use stockscope::domain::error::StockscopeError;
pub use stockscope::domain::ohlcv::OhlcvBar;
use stockscope::domain::option::{OptionContract, OptionType};
use stockscope::domain::price_series::PriceSeries;
use stockscope::domain::pricing::black_scholes_price;
use stockscope::domain::screener::WarrantTerms;
use stockscope::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub warrants: HashMap<String, Vec<WarrantTerms>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            warrants: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_warrants(mut self, underlying: &str, warrants: Vec<WarrantTerms>) -> Self {
        self.warrants.insert(underlying.to_string(), warrants);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    fn check(&self, code: &str) -> Result<(), StockscopeError> {
        match self.errors.get(code) {
            Some(reason) => Err(StockscopeError::Data {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, StockscopeError> {
        self.check(code)?;
        let bars = self
            .data
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        PriceSeries::new(code, bars)
    }

    fn list_codes(&self) -> Result<Vec<String>, StockscopeError> {
        let mut codes: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        codes.sort();
        codes.dedup();
        Ok(codes)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StockscopeError> {
        self.check(code)?;
        match self.data.get(code) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }

    fn fetch_warrants(&self, underlying: &str) -> Result<Vec<WarrantTerms>, StockscopeError> {
        self.check(underlying)?;
        Ok(self.warrants.get(underlying).cloned().unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A bar with open = close and a 1% range either side.
pub fn make_bar(date: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1000,
    }
}

/// One bar per calendar day from 2024-01-01.
pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    let start = date(2024, 1, 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(start + chrono::Duration::days(i as i64), c))
        .collect()
}

pub fn series_from_closes(code: &str, closes: &[f64]) -> PriceSeries {
    PriceSeries::new(code, bars_from_closes(closes)).unwrap()
}

/// 100, 101, 100, 101, ...
pub fn alternating_closes(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
        .collect()
}

/// Close path that rises, falls and recovers; long enough for every default indicator.
pub fn wave_closes(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            100.0 + 15.0 * (t / 12.0).sin() + 0.05 * t
        })
        .collect()
}

/// Warrant listing priced at `sigma` against spot 100, valued on `asof`.
pub fn priced_warrant(
    id: &str,
    option_type: OptionType,
    strike: f64,
    asof: NaiveDate,
    days: i64,
    sigma: f64,
) -> WarrantTerms {
    let multiplier = 0.1;
    let contract = OptionContract {
        spot: 100.0,
        strike,
        time_to_expiry: days as f64 / 365.0,
        rate: 0.015,
        volatility: sigma,
        option_type,
        multiplier,
    };
    WarrantTerms {
        id: id.to_string(),
        option_type,
        strike,
        expiry: asof + chrono::Duration::days(days),
        multiplier,
        market_price: black_scholes_price(&contract) * multiplier,
        volatility: Some(sigma),
    }
}
