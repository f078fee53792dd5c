//! Statistical risk measures over a price series.
//!
//! # Conventions
//!
//! - Volatility: sample stdev of daily log returns × √annualization_factor
//! - VaR / CVaR: historical simulation on daily simple returns, reported as a
//!   positive loss scaled by √horizon_days × portfolio_value
//! - Beta: sample cov / sample var over returns on the dates both series share
//! - Sharpe: (mean simple return × annualization − rf) / volatility
//! - Max drawdown: single forward scan over closes tracking the running peak

use crate::domain::config_validation::validate_risk_config;
use crate::domain::error::StockscopeError;
use crate::domain::metric_value::{MetricValue, UndefinedReason};
use crate::domain::price_series::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Annualized volatilities below this are reported as exactly 0.
const ZERO_VOLATILITY_EPSILON: f64 = 1e-12;

/// Cut points for the composite risk level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub volatility_medium: f64,
    pub volatility_high: f64,
    pub volatility_extreme: f64,
    /// VaR (fraction of portfolio) above this escalates one level.
    pub var_escalation: f64,
    /// Max drawdown above this escalates one level.
    pub drawdown_escalation: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            volatility_medium: 0.20,
            volatility_high: 0.35,
            volatility_extreme: 0.50,
            var_escalation: 0.03,
            drawdown_escalation: 0.30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub annualization_factor: f64,
    pub var_confidence: f64,
    pub var_horizon_days: u32,
    pub portfolio_value: f64,
    pub risk_free_rate: f64,
    pub thresholds: RiskThresholds,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            annualization_factor: 252.0,
            var_confidence: 0.95,
            var_horizon_days: 1,
            portfolio_value: 1.0,
            risk_free_rate: 0.015,
            thresholds: RiskThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskLevel {
    fn escalate(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High | RiskLevel::Extreme => RiskLevel::Extreme,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationFactor {
    ValueAtRisk,
    Drawdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Level from volatility alone, before escalation.
    pub volatility_level: RiskLevel,
    pub escalations: Vec<EscalationFactor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueAtRisk {
    pub confidence: f64,
    pub horizon_days: u32,
    /// Positive loss magnitude.
    pub var: f64,
    /// Mean loss of the returns at or below the VaR quantile.
    pub cvar: f64,
}

/// Peak-to-trough result of a drawdown scan, by index into the scanned values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    /// Fraction in [0, 1].
    pub depth: f64,
    pub peak_index: usize,
    pub trough_index: usize,
    /// Longest run of consecutive points below a prior peak.
    pub longest_underwater: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownReport {
    pub depth: f64,
    pub peak_date: NaiveDate,
    pub trough_date: NaiveDate,
    pub longest_underwater: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskResult {
    pub code: String,
    pub observations: usize,
    pub volatility: f64,
    pub value_at_risk: ValueAtRisk,
    pub beta: MetricValue,
    pub sharpe: MetricValue,
    pub max_drawdown: DrawdownReport,
    pub assessment: RiskAssessment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanExclusion {
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScan {
    pub results: Vec<RiskResult>,
    pub excluded: Vec<ScanExclusion>,
}

/// Greatest peak-to-trough decline of `values`, one forward pass.
pub fn compute_drawdown(values: &[f64]) -> Drawdown {
    let mut result = Drawdown {
        depth: 0.0,
        peak_index: 0,
        trough_index: 0,
        longest_underwater: 0,
    };
    let Some(&first) = values.first() else {
        return result;
    };

    let mut peak = first;
    let mut peak_index = 0;
    let mut underwater = 0usize;

    for (i, &value) in values.iter().enumerate() {
        if value >= peak {
            peak = value;
            peak_index = i;
            underwater = 0;
            continue;
        }
        underwater += 1;
        result.longest_underwater = result.longest_underwater.max(underwater);
        if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > result.depth {
                result.depth = dd;
                result.peak_index = peak_index;
                result.trough_index = i;
            }
        }
    }

    result.depth = result.depth.clamp(0.0, 1.0);
    result
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample (n-1) covariance.
fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    let (ma, mb) = (mean(a), mean(b));
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (a.len() - 1) as f64
}

/// Percentile with linear interpolation between the bracketing order statistics.
///
/// `sorted` must be ascending and non-empty; `p` in [0, 1].
pub fn percentile_linear(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[derive(Debug)]
pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Result<Self, StockscopeError> {
        validate_risk_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Annualized stdev of daily log returns; needs at least 2 returns.
    pub fn volatility(&self, series: &PriceSeries) -> Result<f64, StockscopeError> {
        let returns = series.log_returns();
        if returns.len() < 2 {
            return Err(StockscopeError::insufficient("volatility", returns.len(), 2));
        }
        let variance = sample_covariance(&returns, &returns);
        let annualized = variance.sqrt() * self.config.annualization_factor.sqrt();
        Ok(if annualized < ZERO_VOLATILITY_EPSILON {
            0.0
        } else {
            annualized
        })
    }

    pub fn value_at_risk(&self, series: &PriceSeries) -> Result<ValueAtRisk, StockscopeError> {
        let mut returns = series.simple_returns();
        if returns.is_empty() {
            return Err(StockscopeError::insufficient("value at risk", 0, 1));
        }
        returns.sort_by(f64::total_cmp);

        let quantile = percentile_linear(&returns, 1.0 - self.config.var_confidence);
        let tail: Vec<f64> = returns
            .iter()
            .copied()
            .filter(|r| *r <= quantile)
            .collect();
        let scale = (self.config.var_horizon_days as f64).sqrt() * self.config.portfolio_value;

        Ok(ValueAtRisk {
            confidence: self.config.var_confidence,
            horizon_days: self.config.var_horizon_days,
            var: (-quantile).max(0.0) * scale,
            cvar: (-mean(&tail)).max(0.0) * scale,
        })
    }

    /// Beta against `benchmark` over shared dates; undefined without enough overlap.
    pub fn beta(&self, series: &PriceSeries, benchmark: Option<&PriceSeries>) -> MetricValue {
        let Some(benchmark) = benchmark else {
            return MetricValue::Undefined(UndefinedReason::NoBenchmark);
        };

        let bench_closes = benchmark.close_by_date();
        let (asset, market): (Vec<f64>, Vec<f64>) = series
            .bars()
            .iter()
            .filter_map(|b| bench_closes.get(&b.date).map(|m| (b.close, *m)))
            .unzip();

        let returns = |closes: &[f64]| -> Vec<f64> {
            closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
        };
        let asset_returns = returns(&asset);
        let market_returns = returns(&market);
        if market_returns.len() < 2 {
            return MetricValue::Undefined(UndefinedReason::InsufficientOverlap);
        }

        let market_variance = sample_covariance(&market_returns, &market_returns);
        if market_variance <= 0.0 {
            return MetricValue::Undefined(UndefinedReason::ZeroBenchmarkVariance);
        }
        MetricValue::Defined(sample_covariance(&asset_returns, &market_returns) / market_variance)
    }

    /// Excess annualized return per unit of `volatility`; needs at least 2 returns.
    pub fn sharpe(
        &self,
        series: &PriceSeries,
        volatility: f64,
    ) -> Result<MetricValue, StockscopeError> {
        let returns = series.simple_returns();
        if returns.len() < 2 {
            return Err(StockscopeError::insufficient("sharpe", returns.len(), 2));
        }
        if !volatility.is_finite() || volatility < 0.0 {
            return Err(StockscopeError::invalid(
                "volatility",
                format!("must be finite and non-negative, got {}", volatility),
            ));
        }
        if volatility == 0.0 {
            return Ok(MetricValue::Undefined(UndefinedReason::ZeroVolatility));
        }
        let annual_return = mean(&returns) * self.config.annualization_factor;
        Ok(MetricValue::Defined(
            (annual_return - self.config.risk_free_rate) / volatility,
        ))
    }

    pub fn max_drawdown(&self, series: &PriceSeries) -> DrawdownReport {
        let dd = compute_drawdown(&series.closes());
        let bars = series.bars();
        DrawdownReport {
            depth: dd.depth,
            peak_date: bars[dd.peak_index].date,
            trough_date: bars[dd.trough_index].date,
            longest_underwater: dd.longest_underwater,
        }
    }

    /// Volatility sets the base level; VaR and drawdown each escalate one step.
    pub fn assess(&self, volatility: f64, var_fraction: f64, drawdown: f64) -> RiskAssessment {
        let t = &self.config.thresholds;
        let volatility_level = if volatility < t.volatility_medium {
            RiskLevel::Low
        } else if volatility < t.volatility_high {
            RiskLevel::Medium
        } else if volatility < t.volatility_extreme {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        };

        let mut level = volatility_level;
        let mut escalations = Vec::new();
        if var_fraction > t.var_escalation {
            level = level.escalate();
            escalations.push(EscalationFactor::ValueAtRisk);
        }
        if drawdown > t.drawdown_escalation {
            level = level.escalate();
            escalations.push(EscalationFactor::Drawdown);
        }

        RiskAssessment {
            level,
            volatility_level,
            escalations,
        }
    }

    pub fn analyze(
        &self,
        series: &PriceSeries,
        benchmark: Option<&PriceSeries>,
    ) -> Result<RiskResult, StockscopeError> {
        let volatility = self.volatility(series)?;
        let value_at_risk = self.value_at_risk(series)?;
        let beta = self.beta(series, benchmark);
        let sharpe = self.sharpe(series, volatility)?;
        let max_drawdown = self.max_drawdown(series);

        let var_fraction = value_at_risk.var / self.config.portfolio_value;
        let assessment = self.assess(volatility, var_fraction, max_drawdown.depth);

        debug!(
            code = series.code(),
            volatility,
            var = value_at_risk.var,
            max_drawdown = max_drawdown.depth,
            level = %assessment.level,
            "risk computed"
        );

        Ok(RiskResult {
            code: series.code().to_string(),
            observations: series.len(),
            volatility,
            value_at_risk,
            beta,
            sharpe,
            max_drawdown,
            assessment,
        })
    }

    /// Analyze many series; failures are excluded with a reason instead of aborting.
    pub fn scan<'a, I>(&self, series: I, benchmark: Option<&PriceSeries>) -> RiskScan
    where
        I: IntoIterator<Item = &'a PriceSeries>,
    {
        let mut results = Vec::new();
        let mut excluded = Vec::new();

        for s in series {
            match self.analyze(s, benchmark) {
                Ok(result) => results.push(result),
                Err(err) => {
                    warn!(code = s.code(), reason = %err, "excluded from risk scan");
                    excluded.push(ScanExclusion {
                        code: s.code().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        RiskScan { results, excluded }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Extreme => write!(f, "EXTREME"),
        }
    }
}
