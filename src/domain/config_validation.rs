//! Configuration validation.
//!
//! Checks every engine config before the engine is built. Failures name the INI
//! section and key the value is read from.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::StockscopeError;
use crate::domain::pricing::PricingConfig;
use crate::domain::risk::RiskConfig;
use crate::domain::screener::ScreenerConfig;
use crate::domain::technical::TechnicalConfig;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> StockscopeError {
    StockscopeError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn require_window(section: &str, key: &str, value: usize) -> Result<(), StockscopeError> {
    if value == 0 {
        return Err(invalid(section, key, format!("{} must be at least 1", key)));
    }
    Ok(())
}

fn require_positive(section: &str, key: &str, value: f64) -> Result<(), StockscopeError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(section, key, format!("{} must be positive", key)));
    }
    Ok(())
}

/// Band multipliers are keyed in hundredths.
fn require_hundredths(section: &str, key: &str, value: f64) -> Result<(), StockscopeError> {
    let scaled = (value * 100.0).round();
    if scaled < 1.0 || scaled > u32::MAX as f64 || (scaled / 100.0 - value).abs() > 1e-9 {
        return Err(invalid(
            section,
            key,
            format!("{} must be a multiple of 0.01, got {}", key, value),
        ));
    }
    Ok(())
}

fn require_fraction(section: &str, key: &str, value: f64) -> Result<(), StockscopeError> {
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            section,
            key,
            format!("{} must be in [0, 1)", key),
        ));
    }
    Ok(())
}

fn require_ordered_thresholds(
    section: &str,
    low_key: &str,
    low: f64,
    high_key: &str,
    high: f64,
) -> Result<(), StockscopeError> {
    if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low >= high {
        return Err(invalid(
            section,
            high_key,
            format!("{} must exceed {} within [0, 100]", high_key, low_key),
        ));
    }
    Ok(())
}

pub fn validate_technical_config(config: &TechnicalConfig) -> Result<(), StockscopeError> {
    const S: &str = "technical";
    for &w in &config.ma_windows {
        require_window(S, "ma_windows", w)?;
    }
    for &w in &config.ema_windows {
        require_window(S, "ema_windows", w)?;
    }
    require_window(S, "rsi_period", config.rsi_period)?;
    require_ordered_thresholds(
        S,
        "rsi_oversold",
        config.rsi_oversold,
        "rsi_overbought",
        config.rsi_overbought,
    )?;
    require_window(S, "macd_fast", config.macd_fast)?;
    require_window(S, "macd_slow", config.macd_slow)?;
    require_window(S, "macd_signal", config.macd_signal)?;
    if config.macd_fast >= config.macd_slow {
        return Err(invalid(S, "macd_fast", "macd_fast must be less than macd_slow"));
    }
    require_window(S, "kdj_period", config.kdj_period)?;
    require_window(S, "kdj_k_smoothing", config.kdj_k_smoothing)?;
    require_window(S, "kdj_d_smoothing", config.kdj_d_smoothing)?;
    require_ordered_thresholds(
        S,
        "kdj_oversold",
        config.kdj_oversold,
        "kdj_overbought",
        config.kdj_overbought,
    )?;
    require_window(S, "bollinger_period", config.bollinger_period)?;
    require_positive(S, "bollinger_multiplier", config.bollinger_multiplier)?;
    require_hundredths(S, "bollinger_multiplier", config.bollinger_multiplier)?;
    require_window(S, "atr_period", config.atr_period)?;
    require_window(S, "signal_fast_ma", config.signal_fast_ma)?;
    require_window(S, "signal_slow_ma", config.signal_slow_ma)?;
    if config.signal_fast_ma >= config.signal_slow_ma {
        return Err(invalid(
            S,
            "signal_fast_ma",
            "signal_fast_ma must be less than signal_slow_ma",
        ));
    }
    require_window(S, "strong_vote_threshold", config.strong_vote_threshold)?;
    Ok(())
}

pub fn validate_risk_config(config: &RiskConfig) -> Result<(), StockscopeError> {
    const S: &str = "risk";
    require_positive(S, "annualization_factor", config.annualization_factor)?;
    if !(config.var_confidence > 0.0 && config.var_confidence < 1.0) {
        return Err(invalid(
            S,
            "var_confidence",
            "var_confidence must be strictly between 0 and 1",
        ));
    }
    if config.var_horizon_days == 0 {
        return Err(invalid(S, "var_horizon_days", "var_horizon_days must be at least 1"));
    }
    require_positive(S, "portfolio_value", config.portfolio_value)?;
    require_fraction(S, "risk_free_rate", config.risk_free_rate)?;

    let t = &config.thresholds;
    require_positive(S, "volatility_medium", t.volatility_medium)?;
    if !(t.volatility_medium < t.volatility_high && t.volatility_high < t.volatility_extreme) {
        return Err(invalid(
            S,
            "volatility_high",
            "volatility thresholds must be strictly increasing",
        ));
    }
    require_positive(S, "var_escalation", t.var_escalation)?;
    if !(t.drawdown_escalation > 0.0 && t.drawdown_escalation <= 1.0) {
        return Err(invalid(
            S,
            "drawdown_escalation",
            "drawdown_escalation must be in (0, 1]",
        ));
    }
    Ok(())
}

pub fn validate_backtest_config(config: &BacktestConfig) -> Result<(), StockscopeError> {
    const S: &str = "backtest";
    require_positive(S, "initial_capital", config.initial_capital)?;
    require_fraction(S, "transaction_cost", config.costs.transaction_cost)?;
    require_fraction(S, "exit_tax", config.costs.exit_tax)?;
    require_fraction(S, "slippage", config.costs.slippage)?;
    require_fraction(S, "risk_free_rate", config.risk_free_rate)?;
    Ok(())
}

pub fn validate_pricing_config(config: &PricingConfig) -> Result<(), StockscopeError> {
    const S: &str = "pricing";
    if !config.risk_free_rate.is_finite() {
        return Err(invalid(S, "risk_free_rate", "risk_free_rate must be finite"));
    }
    let iv = &config.iv;
    require_positive(S, "iv_lower", iv.lower)?;
    if !iv.upper.is_finite() || iv.upper <= iv.lower {
        return Err(invalid(S, "iv_upper", "iv_upper must exceed iv_lower"));
    }
    require_positive(S, "iv_tolerance", iv.tolerance)?;
    if iv.max_iterations == 0 {
        return Err(invalid(S, "iv_max_iterations", "iv_max_iterations must be at least 1"));
    }
    if !(iv.lower..=iv.upper).contains(&iv.initial_guess) {
        return Err(invalid(
            S,
            "iv_initial_guess",
            "iv_initial_guess must lie within [iv_lower, iv_upper]",
        ));
    }
    Ok(())
}

pub fn validate_screener_config(config: &ScreenerConfig) -> Result<(), StockscopeError> {
    const S: &str = "screener";
    require_window(S, "top_n", config.top_n)?;
    require_positive(S, "fallback_volatility", config.fallback_volatility)?;
    if let Some(w) = config.weights {
        for (key, value) in [
            ("weight_leverage", w.leverage),
            ("weight_time_value", w.time_value),
            ("weight_iv_rank", w.iv_rank),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(S, key, format!("{} must be non-negative", key)));
            }
        }
        if w.leverage + w.time_value + w.iv_rank <= 0.0 {
            return Err(invalid(S, "weight_leverage", "weights must not all be zero"));
        }
    }
    let f = &config.filters;
    if f.min_days_to_expiry.is_some_and(|days| days < 0) {
        return Err(invalid(S, "min_days_to_expiry", "min_days_to_expiry must be non-negative"));
    }
    if let Some(lev) = f.max_effective_leverage {
        require_positive(S, "max_effective_leverage", lev)?;
    }
    if f.min_abs_delta.is_some_and(|delta| !(0.0..=1.0).contains(&delta)) {
        return Err(invalid(S, "min_abs_delta", "min_abs_delta must be in [0, 1]"));
    }
    Ok(())
}
