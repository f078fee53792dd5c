//! Per-indicator signal rules and composite voting.
//!
//! Each rule reads a fixed indicator from an [`IndicatorSet`] and emits a
//! Buy/Sell/Hold [`SignalEvent`] for a bar, or nothing when the indicator (or
//! the previous bar it compares against) is undefined there.
//!
//! # Rule semantics
//!
//! - `MaCrossRule`: fast MA crosses above slow → Buy, below → Sell
//! - `MacdCrossRule`: histogram crosses zero upward → Buy, downward → Sell
//! - `RsiThresholdRule`: RSI < oversold → Buy, RSI > overbought → Sell
//! - `KdjCrossRule`: K crosses above D below the oversold line → Buy,
//!   K crosses below D above the overbought line → Sell
//! - `BollingerBreakRule`: close below the lower band → Buy, above the upper → Sell
//!
//! Crossing rules require `index >= 1` and never fire at index 0.

use crate::domain::error::StockscopeError;
use crate::domain::indicator::{IndicatorType, IndicatorValue};
use crate::domain::technical::IndicatorSet;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    MaCross,
    Macd,
    Rsi,
    Kdj,
    Bollinger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub date: NaiveDate,
    pub source: SignalSource,
    pub direction: Direction,
    /// Signed conviction in [-1, 1]; positive for Buy, negative for Sell, 0 for Hold.
    pub strength: f64,
}

/// Which output of a multi-value indicator a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorField {
    Value,
    MacdHistogram,
    KdjK,
    KdjD,
    BollingerPercentB,
}

pub fn extract_field(value: &IndicatorValue, field: IndicatorField) -> Option<f64> {
    match (value, field) {
        (IndicatorValue::Simple { value }, IndicatorField::Value) => Some(*value),
        (IndicatorValue::Macd { histogram, .. }, IndicatorField::MacdHistogram) => Some(*histogram),
        (IndicatorValue::Kdj { k, .. }, IndicatorField::KdjK) => Some(*k),
        (IndicatorValue::Kdj { d, .. }, IndicatorField::KdjD) => Some(*d),
        (IndicatorValue::Bollinger { percent_b, .. }, IndicatorField::BollingerPercentB) => {
            Some(*percent_b)
        }
        _ => None,
    }
}

/// A fixed Buy/Sell/Hold rule over one indicator.
pub trait SignalRule: fmt::Debug + Send + Sync {
    fn source(&self) -> SignalSource;

    /// Indicators this rule reads; the engine guarantees they are computed.
    fn required_indicators(&self) -> Vec<IndicatorType>;

    fn evaluate(&self, set: &IndicatorSet, index: usize) -> Option<SignalEvent>;
}

fn field_at(
    set: &IndicatorSet,
    indicator: &IndicatorType,
    field: IndicatorField,
    index: usize,
) -> Option<f64> {
    set.value(indicator, index)
        .and_then(|v| extract_field(v, field))
}

/// Current and previous values of `left - right`; `None` at index 0 or when undefined.
fn spread_pair(
    set: &IndicatorSet,
    left: (&IndicatorType, IndicatorField),
    right: (&IndicatorType, IndicatorField),
    index: usize,
) -> Option<(f64, f64)> {
    if index == 0 {
        return None;
    }
    let spread = |i: usize| -> Option<f64> {
        Some(field_at(set, left.0, left.1, i)? - field_at(set, right.0, right.1, i)?)
    };
    Some((spread(index - 1)?, spread(index)?))
}

fn event(
    set: &IndicatorSet,
    index: usize,
    source: SignalSource,
    direction: Direction,
    strength: f64,
) -> SignalEvent {
    SignalEvent {
        date: set.dates[index],
        source,
        direction,
        strength,
    }
}

fn cross_direction(prev: f64, curr: f64) -> Direction {
    if curr > 0.0 && prev <= 0.0 {
        Direction::Buy
    } else if curr < 0.0 && prev >= 0.0 {
        Direction::Sell
    } else {
        Direction::Hold
    }
}

fn unit_strength(direction: Direction) -> f64 {
    match direction {
        Direction::Buy => 1.0,
        Direction::Sell => -1.0,
        Direction::Hold => 0.0,
    }
}

#[derive(Debug, Clone)]
pub struct MaCrossRule {
    pub fast: IndicatorType,
    pub slow: IndicatorType,
}

impl MaCrossRule {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast: IndicatorType::Sma { period: fast_period },
            slow: IndicatorType::Sma { period: slow_period },
        }
    }
}

impl SignalRule for MaCrossRule {
    fn source(&self) -> SignalSource {
        SignalSource::MaCross
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![self.fast.clone(), self.slow.clone()]
    }

    fn evaluate(&self, set: &IndicatorSet, index: usize) -> Option<SignalEvent> {
        let (prev, curr) = spread_pair(
            set,
            (&self.fast, IndicatorField::Value),
            (&self.slow, IndicatorField::Value),
            index,
        )?;
        let direction = cross_direction(prev, curr);
        Some(event(set, index, self.source(), direction, unit_strength(direction)))
    }
}

#[derive(Debug, Clone)]
pub struct MacdCrossRule {
    pub macd: IndicatorType,
}

impl SignalRule for MacdCrossRule {
    fn source(&self) -> SignalSource {
        SignalSource::Macd
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![self.macd.clone()]
    }

    fn evaluate(&self, set: &IndicatorSet, index: usize) -> Option<SignalEvent> {
        if index == 0 {
            return None;
        }
        let prev = field_at(set, &self.macd, IndicatorField::MacdHistogram, index - 1)?;
        let curr = field_at(set, &self.macd, IndicatorField::MacdHistogram, index)?;
        let direction = cross_direction(prev, curr);
        Some(event(set, index, self.source(), direction, unit_strength(direction)))
    }
}

#[derive(Debug, Clone)]
pub struct RsiThresholdRule {
    pub rsi: IndicatorType,
    pub oversold: f64,
    pub overbought: f64,
}

impl SignalRule for RsiThresholdRule {
    fn source(&self) -> SignalSource {
        SignalSource::Rsi
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![self.rsi.clone()]
    }

    fn evaluate(&self, set: &IndicatorSet, index: usize) -> Option<SignalEvent> {
        let rsi = field_at(set, &self.rsi, IndicatorField::Value, index)?;
        let (direction, strength) = if rsi < self.oversold {
            let depth = (self.oversold - rsi) / self.oversold;
            (Direction::Buy, 0.5 + 0.5 * depth)
        } else if rsi > self.overbought {
            let depth = (rsi - self.overbought) / (100.0 - self.overbought);
            (Direction::Sell, -(0.5 + 0.5 * depth))
        } else {
            (Direction::Hold, 0.0)
        };
        Some(event(set, index, self.source(), direction, strength.clamp(-1.0, 1.0)))
    }
}

#[derive(Debug, Clone)]
pub struct KdjCrossRule {
    pub kdj: IndicatorType,
    pub oversold: f64,
    pub overbought: f64,
}

impl SignalRule for KdjCrossRule {
    fn source(&self) -> SignalSource {
        SignalSource::Kdj
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![self.kdj.clone()]
    }

    fn evaluate(&self, set: &IndicatorSet, index: usize) -> Option<SignalEvent> {
        let (prev, curr) = spread_pair(
            set,
            (&self.kdj, IndicatorField::KdjK),
            (&self.kdj, IndicatorField::KdjD),
            index,
        )?;
        let k = field_at(set, &self.kdj, IndicatorField::KdjK, index)?;
        let direction = match cross_direction(prev, curr) {
            Direction::Buy if k < self.oversold => Direction::Buy,
            Direction::Sell if k > self.overbought => Direction::Sell,
            _ => Direction::Hold,
        };
        Some(event(set, index, self.source(), direction, unit_strength(direction)))
    }
}

#[derive(Debug, Clone)]
pub struct BollingerBreakRule {
    pub bands: IndicatorType,
}

impl SignalRule for BollingerBreakRule {
    fn source(&self) -> SignalSource {
        SignalSource::Bollinger
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![self.bands.clone()]
    }

    fn evaluate(&self, set: &IndicatorSet, index: usize) -> Option<SignalEvent> {
        let percent_b = field_at(set, &self.bands, IndicatorField::BollingerPercentB, index)?;
        let (direction, strength) = if percent_b < 0.0 {
            (Direction::Buy, (0.5 - percent_b).min(1.0))
        } else if percent_b > 1.0 {
            (Direction::Sell, -(percent_b - 0.5).min(1.0))
        } else {
            (Direction::Hold, 0.0)
        };
        Some(event(set, index, self.source(), direction, strength))
    }
}

/// How defined SignalEvents at one date are folded into a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingRule {
    /// Buy and Sell votes compete; Hold votes abstain. Equal counts → Hold.
    #[default]
    BuySellMajority,
    /// Buy, Sell and Hold all vote; the largest count wins. Any tie for first → Hold.
    Plurality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSignal {
    pub date: NaiveDate,
    pub direction: Direction,
    /// (buy_votes - sell_votes) / voters, 0 when no indicator was defined.
    pub strength: f64,
    pub buy_votes: usize,
    pub sell_votes: usize,
    pub hold_votes: usize,
    /// The winning side reached the strong-vote threshold.
    pub strong: bool,
    pub events: Vec<SignalEvent>,
}

/// Fold the events of one date into a composite verdict.
pub fn combine(
    date: NaiveDate,
    events: Vec<SignalEvent>,
    rule: VotingRule,
    strong_threshold: usize,
) -> CompositeSignal {
    let count = |d: Direction| events.iter().filter(|e| e.direction == d).count();
    let buy_votes = count(Direction::Buy);
    let sell_votes = count(Direction::Sell);
    let hold_votes = count(Direction::Hold);

    let direction = match rule {
        VotingRule::BuySellMajority => {
            if buy_votes > sell_votes {
                Direction::Buy
            } else if sell_votes > buy_votes {
                Direction::Sell
            } else {
                Direction::Hold
            }
        }
        VotingRule::Plurality => {
            if buy_votes > sell_votes && buy_votes > hold_votes {
                Direction::Buy
            } else if sell_votes > buy_votes && sell_votes > hold_votes {
                Direction::Sell
            } else {
                Direction::Hold
            }
        }
    };

    let strong = match direction {
        Direction::Buy => buy_votes >= strong_threshold,
        Direction::Sell => sell_votes >= strong_threshold,
        Direction::Hold => false,
    };
    let strength = if events.is_empty() {
        0.0
    } else {
        (buy_votes as f64 - sell_votes as f64) / events.len() as f64
    };

    CompositeSignal {
        date,
        direction,
        strength,
        buy_votes,
        sell_votes,
        hold_votes,
        strong,
        events,
    }
}

impl FromStr for VotingRule {
    type Err = StockscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy_sell_majority" | "majority" => Ok(VotingRule::BuySellMajority),
            "plurality" => Ok(VotingRule::Plurality),
            other => Err(StockscopeError::invalid(
                "voting_rule",
                format!("expected buy_sell_majority or plurality, got '{}'", other),
            )),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::Hold => write!(f, "HOLD"),
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSource::MaCross => write!(f, "MA"),
            SignalSource::Macd => write!(f, "MACD"),
            SignalSource::Rsi => write!(f, "RSI"),
            SignalSource::Kdj => write!(f, "KDJ"),
            SignalSource::Bollinger => write!(f, "BB"),
        }
    }
}
