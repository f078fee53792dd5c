//! Single-position long-only backtest.
//!
//! The replay is one forward pass. A direction computed from data through bar
//! N is acted on at the open of bar N+1:
//!
//! - Buy while Flat: spend all cash on a position (Flat → Long)
//! - Sell while Long: close the position (Long → Flat)
//! - anything else: no transition
//!
//! Equity is recorded at every close and never revised. A position still open
//! after the last bar is marked to market, not closed.

use crate::domain::config_validation::validate_backtest_config;
use crate::domain::error::StockscopeError;
use crate::domain::execution::{CostModel, fill_entry, fill_exit};
use crate::domain::metrics::{ClosedTrade, Metrics};
use crate::domain::price_series::PriceSeries;
use crate::domain::signal::Direction;
use crate::domain::technical::TechnicalEngine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub costs: CostModel,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            costs: CostModel::default(),
            risk_free_rate: 0.015,
        }
    }
}

/// Produces one direction per bar of a series.
pub trait SignalPolicy {
    fn generate(&self, series: &PriceSeries) -> Vec<Direction>;
}

impl<F> SignalPolicy for F
where
    F: Fn(&PriceSeries) -> Vec<Direction>,
{
    fn generate(&self, series: &PriceSeries) -> Vec<Direction> {
        self(series)
    }
}

/// The technical composite verdict for each date.
impl SignalPolicy for TechnicalEngine {
    fn generate(&self, series: &PriceSeries) -> Vec<Direction> {
        self.analyze(series)
            .signals
            .into_iter()
            .map(|s| s.direction)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Flat,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TradeMarker {
    Entry { price: f64, shares: f64 },
    Exit { price: f64, pnl: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub date: NaiveDate,
    /// Position held at this bar's close.
    pub position: PositionSide,
    pub equity: f64,
    pub marker: Option<TradeMarker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: f64,
    /// Cash committed including entry cost.
    pub outlay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub code: String,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub trace: Vec<TracePoint>,
    pub trades: Vec<ClosedTrade>,
    pub open_position: Option<OpenPosition>,
    pub metrics: Metrics,
}

enum State {
    Flat,
    Long(OpenPosition),
}

#[derive(Debug)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Result<Self, StockscopeError> {
        validate_backtest_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run(
        &self,
        series: &PriceSeries,
        policy: &dyn SignalPolicy,
    ) -> Result<BacktestResult, StockscopeError> {
        let directions = policy.generate(series);
        if directions.len() != series.len() {
            return Err(StockscopeError::invalid(
                "signal policy",
                format!(
                    "produced {} directions for {} bars",
                    directions.len(),
                    series.len()
                ),
            ));
        }

        let costs = &self.config.costs;
        let mut cash = self.config.initial_capital;
        let mut state = State::Flat;
        let mut trace = Vec::with_capacity(series.len());
        let mut trades = Vec::new();

        for (i, bar) in series.bars().iter().enumerate() {
            let mut marker = None;
            let action = if i > 0 { directions[i - 1] } else { Direction::Hold };

            state = match (state, action) {
                (State::Flat, Direction::Buy) => {
                    let fill = fill_entry(cash, bar.open, costs);
                    cash -= fill.total_outlay();
                    marker = Some(TradeMarker::Entry {
                        price: fill.execution_price,
                        shares: fill.shares,
                    });
                    State::Long(OpenPosition {
                        entry_date: bar.date,
                        entry_price: fill.execution_price,
                        shares: fill.shares,
                        outlay: fill.total_outlay(),
                    })
                }
                (State::Long(pos), Direction::Sell) => {
                    let fill = fill_exit(pos.shares, bar.open, costs);
                    let proceeds = fill.net_proceeds();
                    let pnl = proceeds - pos.outlay;
                    cash += proceeds;
                    marker = Some(TradeMarker::Exit {
                        price: fill.execution_price,
                        pnl,
                    });
                    trades.push(ClosedTrade {
                        entry_date: pos.entry_date,
                        exit_date: bar.date,
                        entry_price: pos.entry_price,
                        exit_price: fill.execution_price,
                        shares: pos.shares,
                        pnl,
                        return_pct: pnl / pos.outlay,
                    });
                    State::Flat
                }
                (unchanged, _) => unchanged,
            };

            let (position, equity) = match &state {
                State::Flat => (PositionSide::Flat, cash),
                State::Long(pos) => (PositionSide::Long, cash + pos.shares * bar.close),
            };
            trace.push(TracePoint {
                date: bar.date,
                position,
                equity,
                marker,
            });
        }

        let open_position = match state {
            State::Long(pos) => Some(pos),
            State::Flat => None,
        };
        let equity_curve: Vec<f64> = trace.iter().map(|p| p.equity).collect();
        let final_equity = equity_curve
            .last()
            .copied()
            .unwrap_or(self.config.initial_capital);
        let metrics = Metrics::compute(
            &equity_curve,
            &trades,
            self.config.initial_capital,
            self.config.risk_free_rate,
        );

        debug!(
            code = series.code(),
            trades = trades.len(),
            final_equity,
            still_open = open_position.is_some(),
            "backtest finished"
        );

        Ok(BacktestResult {
            code: series.code().to_string(),
            initial_capital: self.config.initial_capital,
            final_equity,
            trace,
            trades,
            open_position,
            metrics,
        })
    }
}
