//! Warrant screening: value every quote, filter, score against the peer group, rank.

use crate::domain::config_validation::validate_screener_config;
use crate::domain::error::StockscopeError;
use crate::domain::option::{OptionContract, OptionType};
use crate::domain::pricing::{OptionPricingEngine, OptionValuation};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Warrants closer to expiry than this are flagged regardless of score.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// A contract with its observed per-contract market price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarrantQuote {
    pub id: String,
    pub contract: OptionContract,
    pub market_price: f64,
}

impl WarrantQuote {
    pub fn days_to_expiry(&self) -> i64 {
        (self.contract.time_to_expiry * 365.0).round() as i64
    }
}

/// Warrant terms as listed, with a calendar expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarrantTerms {
    pub id: String,
    pub option_type: OptionType,
    pub strike: f64,
    pub expiry: NaiveDate,
    pub multiplier: f64,
    pub market_price: f64,
    pub volatility: Option<f64>,
}

impl WarrantTerms {
    /// Quote against `spot` on `asof`, using `fallback_volatility` when the listing has none.
    pub fn to_quote(
        &self,
        spot: f64,
        asof: NaiveDate,
        rate: f64,
        fallback_volatility: f64,
    ) -> WarrantQuote {
        let days = (self.expiry - asof).num_days();
        WarrantQuote {
            id: self.id.clone(),
            contract: OptionContract {
                spot,
                strike: self.strike,
                time_to_expiry: days as f64 / 365.0,
                rate,
                volatility: self.volatility.unwrap_or(fallback_volatility),
                option_type: self.option_type,
                multiplier: self.multiplier,
            },
            market_price: self.market_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeveragePreference {
    Low,
    #[default]
    Balanced,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub leverage: f64,
    pub time_value: f64,
    pub iv_rank: f64,
}

impl RiskTolerance {
    pub fn weights(self) -> ScoreWeights {
        let (leverage, time_value, iv_rank) = match self {
            RiskTolerance::Conservative => (0.2, 0.4, 0.4),
            RiskTolerance::Moderate => (0.4, 0.3, 0.3),
            RiskTolerance::Aggressive => (0.6, 0.2, 0.2),
        };
        ScoreWeights {
            leverage,
            time_value,
            iv_rank,
        }
    }
}

impl LeveragePreference {
    /// Maps a leverage normalized to [0, 1] across the peer group onto a score.
    pub fn score(self, normalized: f64) -> f64 {
        match self {
            LeveragePreference::Low => 1.0 - normalized,
            LeveragePreference::High => normalized,
            LeveragePreference::Balanced => 1.0 - (normalized - 0.5).abs() * 2.0,
        }
    }
}

/// Rule filters applied after valuation. `None` disables a rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenFilters {
    pub min_days_to_expiry: Option<i64>,
    pub max_effective_leverage: Option<f64>,
    pub min_abs_delta: Option<f64>,
}

impl Default for ScreenFilters {
    fn default() -> Self {
        Self {
            min_days_to_expiry: Some(30),
            max_effective_leverage: Some(10.0),
            min_abs_delta: Some(0.3),
        }
    }
}

impl ScreenFilters {
    pub fn none() -> Self {
        Self {
            min_days_to_expiry: None,
            max_effective_leverage: None,
            min_abs_delta: None,
        }
    }

    fn rejection(&self, days: i64, valuation: &OptionValuation) -> Option<String> {
        if let Some(min) = self.min_days_to_expiry.filter(|&min| days < min) {
            return Some(format!("{} days to expiry, minimum {}", days, min));
        }
        if let Some(max) = self.max_effective_leverage {
            match valuation.effective_leverage.value() {
                Some(lev) if lev <= max => {}
                Some(lev) => {
                    return Some(format!("effective leverage {:.2} above {}", lev, max));
                }
                None => return Some("effective leverage undefined".to_string()),
            }
        }
        if let Some(min) = self.min_abs_delta {
            let delta = valuation.greeks.delta.abs();
            if delta < min {
                return Some(format!("|delta| {:.3} below {}", delta, min));
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenerConfig {
    pub risk_tolerance: RiskTolerance,
    pub leverage_preference: LeveragePreference,
    /// Overrides the risk tolerance weights.
    pub weights: Option<ScoreWeights>,
    pub top_n: usize,
    pub filters: ScreenFilters,
    /// Volatility for listings that carry none.
    pub fallback_volatility: f64,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            risk_tolerance: RiskTolerance::default(),
            leverage_preference: LeveragePreference::default(),
            weights: None,
            top_n: 5,
            filters: ScreenFilters::default(),
            fallback_volatility: 0.3,
        }
    }
}

impl ScreenerConfig {
    /// Effective weights, normalized to sum to 1.
    pub fn weights(&self) -> ScoreWeights {
        let w = self.weights.unwrap_or_else(|| self.risk_tolerance.weights());
        let total = w.leverage + w.time_value + w.iv_rank;
        ScoreWeights {
            leverage: w.leverage / total,
            time_value: w.time_value / total,
            iv_rank: w.iv_rank / total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Neutral,
    Avoid,
    StrongAvoid,
    ExpiryTooClose,
}

impl Recommendation {
    pub fn from_score(score: f64, days_to_expiry: i64) -> Self {
        if days_to_expiry < EXPIRY_WARNING_DAYS {
            Recommendation::ExpiryTooClose
        } else if score >= 0.8 {
            Recommendation::StrongBuy
        } else if score >= 0.65 {
            Recommendation::Buy
        } else if score >= 0.5 {
            Recommendation::Neutral
        } else if score >= 0.35 {
            Recommendation::Avoid
        } else {
            Recommendation::StrongAvoid
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::StrongBuy => "strong buy",
            Recommendation::Buy => "buy",
            Recommendation::Neutral => "neutral",
            Recommendation::Avoid => "avoid",
            Recommendation::StrongAvoid => "strong avoid",
            Recommendation::ExpiryTooClose => "expiry too close",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedWarrant {
    pub id: String,
    pub valuation: OptionValuation,
    pub implied_volatility: f64,
    pub days_to_expiry: i64,
    pub leverage_score: f64,
    pub time_value_score: f64,
    pub iv_score: f64,
    pub score: f64,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedWarrant {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenResult {
    pub ranked: Vec<RankedWarrant>,
    pub excluded: Vec<ExcludedWarrant>,
}

struct Candidate<'a> {
    quote: &'a WarrantQuote,
    valuation: OptionValuation,
    implied_volatility: f64,
    leverage: f64,
}

#[derive(Debug, Clone)]
pub struct WarrantScreener {
    config: ScreenerConfig,
    pricing: OptionPricingEngine,
}

impl WarrantScreener {
    pub fn new(
        config: ScreenerConfig,
        pricing: OptionPricingEngine,
    ) -> Result<Self, StockscopeError> {
        validate_screener_config(&config)?;
        Ok(Self { config, pricing })
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    pub fn pricing(&self) -> &OptionPricingEngine {
        &self.pricing
    }

    pub fn screen(&self, quotes: &[WarrantQuote]) -> ScreenResult {
        let mut excluded = Vec::new();
        let mut candidates = Vec::with_capacity(quotes.len());

        for quote in quotes {
            match self.evaluate(quote) {
                Ok(candidate) => candidates.push(candidate),
                Err(reason) => {
                    warn!(id = %quote.id, %reason, "warrant excluded");
                    excluded.push(ExcludedWarrant {
                        id: quote.id.clone(),
                        reason,
                    });
                }
            }
        }

        let ranked = self.rank(candidates);
        debug!(
            ranked = ranked.len(),
            excluded = excluded.len(),
            "screen complete"
        );
        ScreenResult { ranked, excluded }
    }

    fn evaluate<'a>(&self, quote: &'a WarrantQuote) -> Result<Candidate<'a>, String> {
        if !quote.market_price.is_finite() || quote.market_price <= 0.0 {
            return Err(format!("invalid market price {}", quote.market_price));
        }
        let valuation = self
            .pricing
            .value_at_market(&quote.contract, quote.market_price)
            .map_err(|e| format!("pricing failed: {}", e))?;
        let implied_volatility = self
            .pricing
            .implied_volatility(&quote.contract, quote.market_price)
            .map_err(|e| format!("implied volatility failed: {}", e))?
            .volatility;
        if let Some(reason) = self
            .config
            .filters
            .rejection(quote.days_to_expiry(), &valuation)
        {
            return Err(format!("filtered: {}", reason));
        }
        let leverage = valuation
            .effective_leverage
            .value()
            .ok_or_else(|| "effective leverage undefined".to_string())?;
        Ok(Candidate {
            quote,
            valuation,
            implied_volatility,
            leverage,
        })
    }

    fn rank(&self, candidates: Vec<Candidate<'_>>) -> Vec<RankedWarrant> {
        let weights = self.config.weights();
        let leverages: Vec<f64> = candidates.iter().map(|c| c.leverage).collect();
        let ivs: Vec<f64> = candidates.iter().map(|c| c.implied_volatility).collect();
        let (lev_min, lev_max) = min_max(&leverages);

        let mut ranked: Vec<RankedWarrant> = candidates
            .into_iter()
            .map(|c| {
                let normalized = if lev_max > lev_min {
                    (c.leverage - lev_min) / (lev_max - lev_min)
                } else {
                    0.5
                };
                let leverage_score = self.config.leverage_preference.score(normalized);
                let time_value_score =
                    (1.0 - c.valuation.time_value / c.quote.market_price).clamp(0.0, 1.0);
                let iv_score = 1.0 - percentile_rank(&ivs, c.implied_volatility);
                let score = weights.leverage * leverage_score
                    + weights.time_value * time_value_score
                    + weights.iv_rank * iv_score;
                let days_to_expiry = c.quote.days_to_expiry();
                RankedWarrant {
                    id: c.quote.id.clone(),
                    valuation: c.valuation,
                    implied_volatility: c.implied_volatility,
                    days_to_expiry,
                    leverage_score,
                    time_value_score,
                    iv_score,
                    score,
                    recommendation: Recommendation::from_score(score, days_to_expiry),
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.valuation.time_value.total_cmp(&b.valuation.time_value))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(self.config.top_n);
        ranked
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Share of peers strictly below `value`, ties counted half. 0.5 for a lone contract.
fn percentile_rank(values: &[f64], value: f64) -> f64 {
    if values.len() < 2 {
        return 0.5;
    }
    let (below, equal) = values.iter().fold((0usize, 0usize), |(b, e), &v| {
        match v.partial_cmp(&value) {
            Some(Ordering::Less) => (b + 1, e),
            Some(Ordering::Equal) => (b, e + 1),
            _ => (b, e),
        }
    });
    // `equal` includes the value itself
    (below as f64 + (equal - 1) as f64 * 0.5) / (values.len() - 1) as f64
}

impl FromStr for RiskTolerance {
    type Err = StockscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(RiskTolerance::Conservative),
            "moderate" => Ok(RiskTolerance::Moderate),
            "aggressive" => Ok(RiskTolerance::Aggressive),
            other => Err(StockscopeError::invalid(
                "risk_tolerance",
                format!("expected conservative, moderate or aggressive, got '{}'", other),
            )),
        }
    }
}

impl FromStr for LeveragePreference {
    type Err = StockscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(LeveragePreference::Low),
            "balanced" => Ok(LeveragePreference::Balanced),
            "high" => Ok(LeveragePreference::High),
            other => Err(StockscopeError::invalid(
                "leverage_preference",
                format!("expected low, balanced or high, got '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pricing::{PricingConfig, black_scholes_price};

    fn pricing() -> OptionPricingEngine {
        OptionPricingEngine::new(PricingConfig::default()).unwrap()
    }

    fn quote(id: &str, strike: f64, sigma: f64, days: i64) -> WarrantQuote {
        let contract = OptionContract {
            spot: 100.0,
            strike,
            time_to_expiry: days as f64 / 365.0,
            rate: 0.015,
            volatility: sigma,
            option_type: OptionType::Call,
            multiplier: 0.1,
        };
        WarrantQuote {
            id: id.to_string(),
            market_price: black_scholes_price(&contract) * contract.multiplier,
            contract,
        }
    }

    fn screener(filters: ScreenFilters, top_n: usize) -> WarrantScreener {
        let config = ScreenerConfig {
            filters,
            top_n,
            ..ScreenerConfig::default()
        };
        WarrantScreener::new(config, pricing()).unwrap()
    }

    #[test]
    fn invalid_contract_is_excluded_not_fatal() {
        let quotes = vec![
            quote("A", 90.0, 0.25, 180),
            quote("B", 100.0, 0.30, 120),
            quote("C", 105.0, 0.35, 90),
            quote("D", 95.0, 0.28, 200),
            WarrantQuote {
                contract: OptionContract {
                    volatility: 0.0,
                    ..quote("E", 100.0, 0.3, 100).contract
                },
                ..quote("E", 100.0, 0.3, 100)
            },
        ];
        let result = screener(ScreenFilters::none(), 10).screen(&quotes);
        assert_eq!(result.ranked.len(), 4);
        assert_eq!(result.excluded.len(), 1);
        assert_eq!(result.excluded[0].id, "E");
        assert!(result.ranked.iter().all(|w| w.id != "E"));
    }

    #[test]
    fn ranked_by_score_descending_and_truncated() {
        let terms = [
            (90.0, 0.22),
            (95.0, 0.26),
            (100.0, 0.3),
            (105.0, 0.34),
            (110.0, 0.4),
        ];
        let quotes: Vec<_> = terms
            .iter()
            .enumerate()
            .map(|(i, &(k, s))| quote(&format!("W{}", i), k, s, 180))
            .collect();
        let result = screener(ScreenFilters::none(), 3).screen(&quotes);
        assert_eq!(result.ranked.len(), 3);
        for pair in result.ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for w in &result.ranked {
            assert!((0.0..=1.0).contains(&w.score));
            let quoted = quotes.iter().find(|q| q.id == w.id).unwrap();
            assert!((w.implied_volatility - quoted.contract.volatility).abs() < 1e-5);
        }
    }

    #[test]
    fn ties_break_by_lower_time_value() {
        let a = quote("A", 100.0, 0.3, 180);
        let mut b = a.clone();
        b.id = "B".to_string();
        let result = screener(ScreenFilters::none(), 5).screen(&[b, a]);
        assert_eq!(result.ranked.len(), 2);
        assert_eq!(result.ranked[0].score, result.ranked[1].score);
        // equal time value falls through to id
        assert_eq!(result.ranked[0].id, "A");
    }

    #[test]
    fn filters_record_exclusions() {
        let quotes = vec![quote("near", 90.0, 0.3, 10), quote("far", 90.0, 0.3, 200)];
        let filters = ScreenFilters {
            max_effective_leverage: None,
            min_abs_delta: None,
            ..ScreenFilters::default()
        };
        let result = screener(filters, 5).screen(&quotes);
        assert_eq!(result.ranked.len(), 1);
        assert_eq!(result.ranked[0].id, "far");
        assert!(result.excluded[0].reason.contains("days to expiry"));
    }

    #[test]
    fn delta_filter_drops_far_out_of_the_money() {
        let quotes = vec![quote("otm", 130.0, 0.3, 60)];
        let filters = ScreenFilters {
            min_days_to_expiry: None,
            max_effective_leverage: None,
            min_abs_delta: Some(0.3),
        };
        let result = screener(filters, 5).screen(&quotes);
        assert!(result.ranked.is_empty());
        assert!(result.excluded[0].reason.contains("delta"));
    }

    #[test]
    fn non_positive_market_price_is_excluded() {
        let mut q = quote("zero", 100.0, 0.3, 100);
        q.market_price = 0.0;
        let result = screener(ScreenFilters::none(), 5).screen(&[q]);
        assert!(result.ranked.is_empty());
        assert!(result.excluded[0].reason.contains("market price"));
    }

    #[test]
    fn recommendation_tiers() {
        assert_eq!(Recommendation::from_score(0.85, 90), Recommendation::StrongBuy);
        assert_eq!(Recommendation::from_score(0.7, 90), Recommendation::Buy);
        assert_eq!(Recommendation::from_score(0.5, 90), Recommendation::Neutral);
        assert_eq!(Recommendation::from_score(0.4, 90), Recommendation::Avoid);
        assert_eq!(Recommendation::from_score(0.1, 90), Recommendation::StrongAvoid);
        assert_eq!(Recommendation::from_score(0.95, 20), Recommendation::ExpiryTooClose);
    }

    #[test]
    fn leverage_preference_shapes() {
        assert_eq!(LeveragePreference::Low.score(0.0), 1.0);
        assert_eq!(LeveragePreference::High.score(1.0), 1.0);
        assert_eq!(LeveragePreference::Balanced.score(0.5), 1.0);
        assert_eq!(LeveragePreference::Balanced.score(1.0), 0.0);
    }

    #[test]
    fn percentile_rank_handles_ties_and_singletons() {
        assert_eq!(percentile_rank(&[0.3], 0.3), 0.5);
        assert_eq!(percentile_rank(&[0.1, 0.2, 0.3], 0.1), 0.0);
        assert_eq!(percentile_rank(&[0.1, 0.2, 0.3], 0.3), 1.0);
        assert_eq!(percentile_rank(&[0.2, 0.2], 0.2), 0.5);
    }

    #[test]
    fn weight_overrides_are_normalized() {
        let config = ScreenerConfig {
            weights: Some(ScoreWeights {
                leverage: 2.0,
                time_value: 1.0,
                iv_rank: 1.0,
            }),
            ..ScreenerConfig::default()
        };
        let w = config.weights();
        assert!((w.leverage - 0.5).abs() < 1e-12);
        assert!((w.leverage + w.time_value + w.iv_rank - 1.0).abs() < 1e-12);
    }

    #[test]
    fn terms_convert_to_quote() {
        let terms = WarrantTerms {
            id: "030001".to_string(),
            option_type: OptionType::Put,
            strike: 500.0,
            expiry: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            multiplier: 0.05,
            market_price: 1.2,
            volatility: None,
        };
        let asof = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let q = terms.to_quote(520.0, asof, 0.015, 0.27);
        assert_eq!(q.days_to_expiry(), 181);
        assert_eq!(q.contract.volatility, 0.27);
        assert_eq!(q.contract.option_type, OptionType::Put);
    }
}
