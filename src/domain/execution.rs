//! Fill simulation: slippage, proportional transaction cost and exit tax.
//!
//! Positions are sized in fractional shares so a full-position entry commits
//! all available cash including its own cost.

use serde::{Deserialize, Serialize};

/// Proportional costs, all expressed as fractions (0.001425 = 0.1425%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Charged on the traded value of every entry and exit.
    pub transaction_cost: f64,
    /// Charged on the traded value of exits only.
    pub exit_tax: f64,
    /// Adverse price move applied to every fill.
    pub slippage: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            transaction_cost: 0.001425,
            exit_tax: 0.003,
            slippage: 0.0,
        }
    }
}

/// Buy fills above the market price.
pub fn apply_slippage_entry(market_price: f64, slippage: f64) -> f64 {
    market_price * (1.0 + slippage)
}

/// Sell fills below the market price.
pub fn apply_slippage_exit(market_price: f64, slippage: f64) -> f64 {
    market_price * (1.0 - slippage)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub shares: f64,
    pub execution_price: f64,
    /// shares × execution_price
    pub gross_value: f64,
    pub costs: f64,
}

impl Fill {
    /// Cash paid for an entry.
    pub fn total_outlay(&self) -> f64 {
        self.gross_value + self.costs
    }

    /// Cash received for an exit.
    pub fn net_proceeds(&self) -> f64 {
        self.gross_value - self.costs
    }
}

/// Spend all of `cash` on a long entry at `market_price`.
pub fn fill_entry(cash: f64, market_price: f64, costs: &CostModel) -> Fill {
    let execution_price = apply_slippage_entry(market_price, costs.slippage);
    let shares = cash / (execution_price * (1.0 + costs.transaction_cost));
    let gross_value = shares * execution_price;
    Fill {
        shares,
        execution_price,
        gross_value,
        costs: gross_value * costs.transaction_cost,
    }
}

/// Sell `shares` at `market_price`.
pub fn fill_exit(shares: f64, market_price: f64, costs: &CostModel) -> Fill {
    let execution_price = apply_slippage_exit(market_price, costs.slippage);
    let gross_value = shares * execution_price;
    Fill {
        shares,
        execution_price,
        gross_value,
        costs: gross_value * (costs.transaction_cost + costs.exit_tax),
    }
}
