//! Option / warrant contract terms.

use crate::domain::error::StockscopeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Half-width of the at-the-money band and the deep-in-the-money cut, as a fraction of strike.
pub const MONEYNESS_BAND: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Moneyness {
    DeepInTheMoney,
    InTheMoney,
    AtTheMoney,
    OutOfTheMoney,
}

/// European contract terms. `volatility` is ignored when solving for implied volatility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub spot: f64,
    pub strike: f64,
    /// Years to expiry; ≤ 0 means expired.
    pub time_to_expiry: f64,
    pub rate: f64,
    pub volatility: f64,
    pub option_type: OptionType,
    /// Underlying units per contract.
    pub multiplier: f64,
}

impl OptionContract {
    /// Checks every term except volatility.
    pub fn validate_terms(&self) -> Result<(), StockscopeError> {
        let finite = [
            ("spot", self.spot),
            ("strike", self.strike),
            ("time_to_expiry", self.time_to_expiry),
            ("rate", self.rate),
            ("multiplier", self.multiplier),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(StockscopeError::invalid(name, "must be finite"));
            }
        }
        for (name, value) in [
            ("spot", self.spot),
            ("strike", self.strike),
            ("multiplier", self.multiplier),
        ] {
            if value <= 0.0 {
                return Err(StockscopeError::invalid(
                    name,
                    format!("must be positive, got {}", value),
                ));
            }
        }
        Ok(())
    }

    /// Checks every term including a strictly positive volatility.
    pub fn validate(&self) -> Result<(), StockscopeError> {
        self.validate_terms()?;
        if !self.volatility.is_finite() || self.volatility <= 0.0 {
            return Err(StockscopeError::invalid(
                "volatility",
                format!("must be positive, got {}", self.volatility),
            ));
        }
        Ok(())
    }

    /// Payoff of exercising one underlying unit now.
    pub fn unit_intrinsic(&self) -> f64 {
        match self.option_type {
            OptionType::Call => (self.spot - self.strike).max(0.0),
            OptionType::Put => (self.strike - self.spot).max(0.0),
        }
    }

    pub fn moneyness(&self) -> Moneyness {
        let (s, k) = (self.spot, self.strike);
        let (deep, itm, atm) = match self.option_type {
            OptionType::Call => (
                s > k * (1.0 + MONEYNESS_BAND),
                s > k,
                s > k * (1.0 - MONEYNESS_BAND),
            ),
            OptionType::Put => (
                s < k * (1.0 - MONEYNESS_BAND),
                s < k,
                s < k * (1.0 + MONEYNESS_BAND),
            ),
        };
        if deep {
            Moneyness::DeepInTheMoney
        } else if itm {
            Moneyness::InTheMoney
        } else if atm {
            Moneyness::AtTheMoney
        } else {
            Moneyness::OutOfTheMoney
        }
    }
}

impl FromStr for OptionType {
    type Err = StockscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "call" | "c" => Ok(OptionType::Call),
            "put" | "p" => Ok(OptionType::Put),
            other => Err(StockscopeError::invalid(
                "option_type",
                format!("expected call or put, got '{}'", other),
            )),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

impl fmt::Display for Moneyness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Moneyness::DeepInTheMoney => write!(f, "deep ITM"),
            Moneyness::InTheMoney => write!(f, "ITM"),
            Moneyness::AtTheMoney => write!(f, "ATM"),
            Moneyness::OutOfTheMoney => write!(f, "OTM"),
        }
    }
}
