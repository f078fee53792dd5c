//! Data access port trait.
//!
//! The engines never fetch data themselves; a `DataPort` implementation hands them
//! validated series and warrant listings.

use crate::domain::error::StockscopeError;
use crate::domain::price_series::PriceSeries;
use crate::domain::screener::WarrantTerms;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `code` dated within `[start_date, end_date]`.
    fn fetch_series(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, StockscopeError>;

    fn list_codes(&self) -> Result<Vec<String>, StockscopeError>;

    /// First date, last date and bar count, or `None` when `code` has no data.
    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StockscopeError>;

    fn fetch_warrants(&self, underlying: &str) -> Result<Vec<WarrantTerms>, StockscopeError>;
}
