//! CSV file data adapter.
//!
//! Layout under the base directory: `{code}.csv` holds daily bars with header
//! `date,open,high,low,close,volume`; `{underlying}_warrants.csv` holds warrant
//! listings with header `id,type,strike,expiry,multiplier,market_price[,volatility]`.

use crate::domain::error::StockscopeError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::option::OptionType;
use crate::domain::price_series::PriceSeries;
use crate::domain::screener::WarrantTerms;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const WARRANT_SUFFIX: &str = "_warrants.csv";

pub struct CsvAdapter {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct WarrantRow {
    id: String,
    #[serde(rename = "type")]
    option_type: String,
    strike: f64,
    expiry: NaiveDate,
    multiplier: f64,
    market_price: f64,
    #[serde(default)]
    volatility: Option<f64>,
}

fn data_error(path: &Path, e: impl std::fmt::Display) -> StockscopeError {
    StockscopeError::Data {
        reason: format!("{}: {}", path.display(), e),
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn series_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }

    fn warrants_path(&self, underlying: &str) -> PathBuf {
        self.base_path.join(format!("{}{}", underlying, WARRANT_SUFFIX))
    }

    /// All bars in `path`, sorted by date, unvalidated.
    pub fn read_bars(path: &Path) -> Result<Vec<OhlcvBar>, StockscopeError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| data_error(path, e))?;
        let mut bars = rdr
            .deserialize::<OhlcvBar>()
            .enumerate()
            .map(|(i, row)| {
                row.map_err(|e| data_error(path, format!("row {}: {}", i + 1, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    /// Whole file at `path` as a validated series named `code`.
    pub fn load_series(path: &Path, code: &str) -> Result<PriceSeries, StockscopeError> {
        let bars = Self::read_bars(path)?;
        debug!(path = %path.display(), bars = bars.len(), "loaded price file");
        PriceSeries::new(code, bars)
    }

    pub fn load_warrants(path: &Path) -> Result<Vec<WarrantTerms>, StockscopeError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| data_error(path, e))?;
        let mut warrants = Vec::new();
        for (i, row) in rdr.deserialize::<WarrantRow>().enumerate() {
            let row = row.map_err(|e| data_error(path, format!("row {}: {}", i + 1, e)))?;
            let option_type: OptionType = row
                .option_type
                .parse()
                .map_err(|e| data_error(path, format!("row {}: {}", i + 1, e)))?;
            warrants.push(WarrantTerms {
                id: row.id,
                option_type,
                strike: row.strike,
                expiry: row.expiry,
                multiplier: row.multiplier,
                market_price: row.market_price,
                volatility: row.volatility,
            });
        }
        debug!(path = %path.display(), warrants = warrants.len(), "loaded warrant file");
        Ok(warrants)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_series(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, StockscopeError> {
        let bars: Vec<OhlcvBar> = Self::read_bars(&self.series_path(code))?
            .into_iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .collect();
        PriceSeries::new(code, bars)
    }

    fn list_codes(&self) -> Result<Vec<String>, StockscopeError> {
        let entries =
            fs::read_dir(&self.base_path).map_err(|e| data_error(&self.base_path, e))?;

        let mut codes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_error(&self.base_path, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(WARRANT_SUFFIX) {
                continue;
            }
            if let Some(code) = name.strip_suffix(".csv") {
                codes.push(code.to_string());
            }
        }

        codes.sort();
        Ok(codes)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StockscopeError> {
        let path = self.series_path(code);
        if !path.exists() {
            return Ok(None);
        }
        let bars = Self::read_bars(&path)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }

    fn fetch_warrants(&self, underlying: &str) -> Result<Vec<WarrantTerms>, StockscopeError> {
        Self::load_warrants(&self.warrants_path(underlying))
    }
}
