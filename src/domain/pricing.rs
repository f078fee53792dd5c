//! Black-Scholes valuation, Greeks and implied volatility for European contracts.

use crate::domain::config_validation::validate_pricing_config;
use crate::domain::error::StockscopeError;
use crate::domain::metric_value::{MetricValue, UndefinedReason};
use crate::domain::normal::{norm_cdf, norm_pdf};
use crate::domain::option::{Moneyness, OptionContract, OptionType};
use serde::{Deserialize, Serialize};
use tracing::debug;

const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;
const MIN_BRACKET_WIDTH: f64 = 1e-12;

/// Sensitivities per underlying unit. Theta is per year, vega and rho per 1.0 of σ or r.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

impl Greeks {
    pub fn theta_per_day(&self) -> f64 {
        self.theta / CALENDAR_DAYS_PER_YEAR
    }

    pub fn vega_per_point(&self) -> f64 {
        self.vega / 100.0
    }

    pub fn rho_per_point(&self) -> f64 {
        self.rho / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionValuation {
    /// Model price of one underlying unit.
    pub unit_price: f64,
    /// unit_price × multiplier
    pub theoretical_price: f64,
    pub greeks: Greeks,
    /// Per contract.
    pub intrinsic_value: f64,
    /// Per contract, never negative.
    pub time_value: f64,
    pub breakeven: f64,
    pub effective_leverage: MetricValue,
    pub theoretical_leverage: MetricValue,
    pub moneyness: Moneyness,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IvSolverConfig {
    pub lower: f64,
    pub upper: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub initial_guess: f64,
}

impl Default for IvSolverConfig {
    fn default() -> Self {
        Self {
            lower: 0.001,
            upper: 5.0,
            tolerance: 1e-8,
            max_iterations: 100,
            initial_guess: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub risk_free_rate: f64,
    pub iv: IvSolverConfig,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.015,
            iv: IvSolverConfig::default(),
        }
    }
}

/// Outcome of a successful implied volatility solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpliedVolatility {
    pub volatility: f64,
    pub iterations: usize,
}

fn d1_d2(c: &OptionContract) -> (f64, f64) {
    let sqrt_t = c.time_to_expiry.sqrt();
    let drift = (c.rate + 0.5 * c.volatility * c.volatility) * c.time_to_expiry;
    let d1 = ((c.spot / c.strike).ln() + drift) / (c.volatility * sqrt_t);
    (d1, d1 - c.volatility * sqrt_t)
}

/// Black-Scholes price of one underlying unit. Falls back to intrinsic value at or after expiry.
pub fn black_scholes_price(c: &OptionContract) -> f64 {
    if c.time_to_expiry <= 0.0 {
        return c.unit_intrinsic();
    }
    let (d1, d2) = d1_d2(c);
    let discounted_strike = c.strike * (-c.rate * c.time_to_expiry).exp();
    match c.option_type {
        OptionType::Call => c.spot * norm_cdf(d1) - discounted_strike * norm_cdf(d2),
        OptionType::Put => discounted_strike * norm_cdf(-d2) - c.spot * norm_cdf(-d1),
    }
}

/// Closed-form Greeks. At or after expiry only delta survives, as a step at the strike.
pub fn black_scholes_greeks(c: &OptionContract) -> Greeks {
    if c.time_to_expiry <= 0.0 {
        let itm = match c.option_type {
            OptionType::Call => c.spot > c.strike,
            OptionType::Put => c.spot < c.strike,
        };
        let magnitude = if c.spot == c.strike {
            0.5
        } else if itm {
            1.0
        } else {
            0.0
        };
        let delta = match c.option_type {
            OptionType::Call => magnitude,
            OptionType::Put => -magnitude,
        };
        return Greeks {
            delta,
            ..Greeks::default()
        };
    }

    let (s, k, t, r, sigma) = (c.spot, c.strike, c.time_to_expiry, c.rate, c.volatility);
    let (d1, d2) = d1_d2(c);
    let sqrt_t = t.sqrt();
    let pdf_d1 = norm_pdf(d1);
    let discount = (-r * t).exp();

    let gamma = pdf_d1 / (s * sigma * sqrt_t);
    let vega = s * pdf_d1 * sqrt_t;
    let decay = -s * pdf_d1 * sigma / (2.0 * sqrt_t);

    match c.option_type {
        OptionType::Call => Greeks {
            delta: norm_cdf(d1),
            gamma,
            theta: decay - r * k * discount * norm_cdf(d2),
            vega,
            rho: k * t * discount * norm_cdf(d2),
        },
        OptionType::Put => Greeks {
            delta: norm_cdf(d1) - 1.0,
            gamma,
            theta: decay + r * k * discount * norm_cdf(-d2),
            vega,
            rho: -k * t * discount * norm_cdf(-d2),
        },
    }
}

/// Breakeven underlying price at expiry for a holder who paid `unit_price`.
pub fn breakeven(option_type: OptionType, strike: f64, unit_price: f64) -> f64 {
    match option_type {
        OptionType::Call => strike + unit_price,
        OptionType::Put => strike - unit_price,
    }
}

/// |Δ| × S / unit price.
pub fn effective_leverage(delta: f64, spot: f64, unit_price: f64) -> MetricValue {
    if unit_price > 0.0 {
        MetricValue::Defined(delta.abs() * spot / unit_price)
    } else {
        MetricValue::Undefined(UndefinedReason::ZeroOptionPrice)
    }
}

/// S / unit price, the gearing of the contract.
pub fn theoretical_leverage(spot: f64, unit_price: f64) -> MetricValue {
    if unit_price > 0.0 {
        MetricValue::Defined(spot / unit_price)
    } else {
        MetricValue::Undefined(UndefinedReason::ZeroOptionPrice)
    }
}

#[derive(Debug, Clone)]
pub struct OptionPricingEngine {
    config: PricingConfig,
}

impl OptionPricingEngine {
    pub fn new(config: PricingConfig) -> Result<Self, StockscopeError> {
        validate_pricing_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Values `contract` at its own volatility.
    pub fn value(&self, contract: &OptionContract) -> Result<OptionValuation, StockscopeError> {
        contract.validate()?;
        Ok(self.value_unchecked(contract))
    }

    /// Values `contract` against an observed per-contract `market_price`: time value,
    /// breakeven and leverage use the market price instead of the model price.
    pub fn value_at_market(
        &self,
        contract: &OptionContract,
        market_price: f64,
    ) -> Result<OptionValuation, StockscopeError> {
        contract.validate()?;
        if !market_price.is_finite() || market_price <= 0.0 {
            return Err(StockscopeError::invalid(
                "market_price",
                format!("must be positive, got {}", market_price),
            ));
        }
        let model = self.value_unchecked(contract);
        let unit_market = market_price / contract.multiplier;
        Ok(OptionValuation {
            time_value: (market_price - model.intrinsic_value).max(0.0),
            breakeven: breakeven(contract.option_type, contract.strike, unit_market),
            effective_leverage: effective_leverage(model.greeks.delta, contract.spot, unit_market),
            theoretical_leverage: theoretical_leverage(contract.spot, unit_market),
            ..model
        })
    }

    fn value_unchecked(&self, contract: &OptionContract) -> OptionValuation {
        let unit_price = black_scholes_price(contract);
        let greeks = black_scholes_greeks(contract);
        let theoretical_price = unit_price * contract.multiplier;
        let intrinsic_value = contract.unit_intrinsic() * contract.multiplier;

        debug!(
            spot = contract.spot,
            strike = contract.strike,
            option_type = %contract.option_type,
            unit_price,
            delta = greeks.delta,
            "valued contract"
        );

        OptionValuation {
            unit_price,
            theoretical_price,
            greeks,
            intrinsic_value,
            time_value: (theoretical_price - intrinsic_value).max(0.0),
            breakeven: breakeven(contract.option_type, contract.strike, unit_price),
            effective_leverage: effective_leverage(greeks.delta, contract.spot, unit_price),
            theoretical_leverage: theoretical_leverage(contract.spot, unit_price),
            moneyness: contract.moneyness(),
        }
    }

    /// Solves for the σ that reproduces a per-contract `market_price`.
    ///
    /// Newton steps on vega, falling back to bisection whenever a step leaves the
    /// bracket. The contract's own volatility is ignored.
    pub fn implied_volatility(
        &self,
        contract: &OptionContract,
        market_price: f64,
    ) -> Result<ImpliedVolatility, StockscopeError> {
        contract.validate_terms()?;
        if contract.time_to_expiry <= 0.0 {
            return Err(StockscopeError::invalid(
                "time_to_expiry",
                "implied volatility needs a contract before expiry",
            ));
        }
        if !market_price.is_finite() || market_price <= 0.0 {
            return Err(StockscopeError::invalid(
                "market_price",
                format!("must be positive, got {}", market_price),
            ));
        }

        let iv = &self.config.iv;
        let target = market_price / contract.multiplier;
        let price_at = |sigma: f64| {
            black_scholes_price(&OptionContract {
                volatility: sigma,
                ..*contract
            })
        };

        let (mut lo, mut hi) = (iv.lower, iv.upper);
        let (p_lo, p_hi) = (price_at(lo), price_at(hi));
        if target < p_lo - iv.tolerance || target > p_hi + iv.tolerance {
            return Err(StockscopeError::invalid(
                "market_price",
                format!(
                    "{} per unit is outside the model range [{:.6}, {:.6}] for σ in [{}, {}]",
                    target, p_lo, p_hi, iv.lower, iv.upper
                ),
            ));
        }

        let mut sigma = iv.initial_guess.clamp(lo, hi);
        let mut residual = f64::INFINITY;

        for iteration in 1..=iv.max_iterations {
            let trial = OptionContract {
                volatility: sigma,
                ..*contract
            };
            let diff = black_scholes_price(&trial) - target;
            residual = diff.abs();
            if residual < iv.tolerance || hi - lo < MIN_BRACKET_WIDTH {
                debug!(sigma, iterations = iteration, residual, "implied volatility converged");
                return Ok(ImpliedVolatility {
                    volatility: sigma,
                    iterations: iteration,
                });
            }

            // price is increasing in σ
            if diff > 0.0 {
                hi = sigma;
            } else {
                lo = sigma;
            }

            let vega = black_scholes_greeks(&trial).vega;
            let newton = sigma - diff / vega;
            sigma = if vega > 1e-12 && newton > lo && newton < hi {
                newton
            } else {
                0.5 * (lo + hi)
            };
        }

        Err(StockscopeError::Convergence {
            iterations: iv.max_iterations,
            last_estimate: sigma,
            residual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn engine() -> OptionPricingEngine {
        OptionPricingEngine::new(PricingConfig::default()).unwrap()
    }

    fn reference(option_type: OptionType) -> OptionContract {
        OptionContract {
            spot: 100.0,
            strike: 100.0,
            time_to_expiry: 1.0,
            rate: 0.05,
            volatility: 0.2,
            option_type,
            multiplier: 1.0,
        }
    }

    #[test]
    fn reference_call() {
        let v = engine().value(&reference(OptionType::Call)).unwrap();
        assert_abs_diff_eq!(v.unit_price, 10.4506, epsilon = 1e-3);
        assert_abs_diff_eq!(v.greeks.delta, 0.6368, epsilon = 1e-3);
        assert_abs_diff_eq!(v.greeks.gamma, 0.018762, epsilon = 1e-4);
        assert_abs_diff_eq!(v.greeks.vega, 37.524, epsilon = 1e-2);
        assert_abs_diff_eq!(v.greeks.theta, -6.414, epsilon = 1e-2);
        assert_abs_diff_eq!(v.greeks.rho, 53.232, epsilon = 1e-2);
        assert_eq!(v.moneyness, Moneyness::AtTheMoney);
    }

    #[test]
    fn reference_put() {
        let v = engine().value(&reference(OptionType::Put)).unwrap();
        assert_abs_diff_eq!(v.unit_price, 5.5735, epsilon = 1e-3);
        assert_abs_diff_eq!(v.greeks.delta, -0.3632, epsilon = 1e-3);
        assert_abs_diff_eq!(v.greeks.theta, -1.658, epsilon = 1e-2);
        assert_abs_diff_eq!(v.greeks.rho, -41.890, epsilon = 1e-2);
    }

    #[test]
    fn put_call_parity() {
        let call = black_scholes_price(&reference(OptionType::Call));
        let put = black_scholes_price(&reference(OptionType::Put));
        assert_abs_diff_eq!(call - put, 100.0 - 100.0 * (-0.05f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn multiplier_scales_contract_values() {
        let mut c = reference(OptionType::Call);
        c.multiplier = 0.1;
        c.spot = 110.0;
        let v = engine().value(&c).unwrap();
        assert_abs_diff_eq!(v.theoretical_price, v.unit_price * 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(v.intrinsic_value, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.breakeven, 100.0 + v.unit_price, epsilon = 1e-12);
        let lev = v.effective_leverage.value().unwrap();
        assert_abs_diff_eq!(lev, v.greeks.delta * 110.0 / v.unit_price, epsilon = 1e-9);
    }

    #[test]
    fn expired_contract_is_intrinsic() {
        let mut c = reference(OptionType::Call);
        c.time_to_expiry = 0.0;
        c.spot = 105.0;
        let v = engine().value(&c).unwrap();
        assert_eq!(v.unit_price, 5.0);
        assert_eq!(v.greeks.delta, 1.0);
        assert_eq!(v.greeks.gamma, 0.0);
        assert_eq!(v.greeks.vega, 0.0);
        assert_eq!(v.time_value, 0.0);

        c.spot = 100.0;
        assert_eq!(black_scholes_greeks(&c).delta, 0.5);
        c.option_type = OptionType::Put;
        assert_eq!(black_scholes_greeks(&c).delta, -0.5);
        c.spot = 90.0;
        assert_eq!(black_scholes_greeks(&c).delta, -1.0);
    }

    #[test]
    fn worthless_contract_has_undefined_leverage() {
        let mut c = reference(OptionType::Call);
        c.time_to_expiry = 0.0;
        c.spot = 90.0;
        let v = engine().value(&c).unwrap();
        assert_eq!(
            v.effective_leverage,
            MetricValue::Undefined(UndefinedReason::ZeroOptionPrice)
        );
    }

    #[test]
    fn zero_volatility_is_rejected() {
        let mut c = reference(OptionType::Call);
        c.volatility = 0.0;
        assert!(matches!(
            engine().value(&c),
            Err(StockscopeError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn implied_volatility_round_trip() {
        let e = engine();
        for sigma in [0.05, 0.2, 0.65, 1.5] {
            let mut c = reference(OptionType::Put);
            c.volatility = sigma;
            c.multiplier = 0.5;
            let price = black_scholes_price(&c) * c.multiplier;
            let solved = e.implied_volatility(&c, price).unwrap();
            assert_abs_diff_eq!(solved.volatility, sigma, epsilon = 1e-5);
        }
    }

    #[test]
    fn implied_volatility_outside_range_is_invalid() {
        let c = reference(OptionType::Call);
        // a call is worth less than spot
        assert!(matches!(
            engine().implied_volatility(&c, 150.0),
            Err(StockscopeError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn implied_volatility_budget_exhausted() {
        let config = PricingConfig {
            iv: IvSolverConfig {
                max_iterations: 1,
                tolerance: 1e-14,
                initial_guess: 4.0,
                ..IvSolverConfig::default()
            },
            ..PricingConfig::default()
        };
        let e = OptionPricingEngine::new(config).unwrap();
        let c = reference(OptionType::Call);
        let price = black_scholes_price(&c);
        assert!(matches!(
            e.implied_volatility(&c, price),
            Err(StockscopeError::Convergence { iterations: 1, .. })
        ));
    }

    #[test]
    fn market_valuation_uses_market_price() {
        let c = reference(OptionType::Call);
        let v = engine().value_at_market(&c, 12.0).unwrap();
        assert_abs_diff_eq!(v.breakeven, 112.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.time_value, 12.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            v.theoretical_leverage.value().unwrap(),
            100.0 / 12.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn greek_unit_conversions() {
        let g = black_scholes_greeks(&reference(OptionType::Call));
        assert_abs_diff_eq!(g.theta_per_day(), g.theta / 365.0, epsilon = 1e-15);
        assert_abs_diff_eq!(g.vega_per_point(), g.vega / 100.0, epsilon = 1e-15);
    }
}
