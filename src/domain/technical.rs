//! Technical analysis: indicator overlays and composite signals.
//!
//! `TechnicalEngine::compute_indicators` derives an [`IndicatorSet`] aligned 1:1
//! with the series dates; `synthesize_signals` folds per-rule events into one
//! [`CompositeSignal`] per date. Both are pure functions of their inputs.

use crate::domain::config_validation::validate_technical_config;
use crate::domain::error::StockscopeError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::compute_indicator;
use crate::domain::price_series::PriceSeries;
use crate::domain::signal::{
    BollingerBreakRule, CompositeSignal, KdjCrossRule, MaCrossRule, MacdCrossRule,
    RsiThresholdRule, SignalRule, VotingRule, combine,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalConfig {
    pub ma_windows: Vec<usize>,
    pub ema_windows: Vec<usize>,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub kdj_period: usize,
    pub kdj_k_smoothing: usize,
    pub kdj_d_smoothing: usize,
    pub kdj_oversold: f64,
    pub kdj_overbought: f64,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    pub atr_period: usize,
    pub signal_fast_ma: usize,
    pub signal_slow_ma: usize,
    pub voting_rule: VotingRule,
    pub strong_vote_threshold: usize,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            ma_windows: vec![5, 20, 60],
            ema_windows: vec![12, 26],
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            kdj_period: 9,
            kdj_k_smoothing: 3,
            kdj_d_smoothing: 3,
            kdj_oversold: 20.0,
            kdj_overbought: 80.0,
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
            atr_period: 14,
            signal_fast_ma: 5,
            signal_slow_ma: 20,
            voting_rule: VotingRule::BuySellMajority,
            strong_vote_threshold: 2,
        }
    }
}

impl TechnicalConfig {
    pub fn macd_type(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        }
    }

    pub fn kdj_type(&self) -> IndicatorType {
        IndicatorType::Kdj {
            period: self.kdj_period,
            k_smoothing: self.kdj_k_smoothing,
            d_smoothing: self.kdj_d_smoothing,
        }
    }

    pub fn bollinger_type(&self) -> IndicatorType {
        IndicatorType::Bollinger {
            period: self.bollinger_period,
            stddev_mult_x100: (self.bollinger_multiplier * 100.0).round() as u32,
        }
    }

    /// Overlay indicators, in display order.
    pub fn overlays(&self) -> Vec<IndicatorType> {
        let mut out: Vec<IndicatorType> = self
            .ma_windows
            .iter()
            .map(|&period| IndicatorType::Sma { period })
            .collect();
        out.extend(self.ema_windows.iter().map(|&period| IndicatorType::Ema { period }));
        out.push(IndicatorType::Rsi {
            period: self.rsi_period,
        });
        out.push(self.macd_type());
        out.push(self.kdj_type());
        out.push(self.bollinger_type());
        out.push(IndicatorType::Atr {
            period: self.atr_period,
        });
        out.push(IndicatorType::Obv);
        out
    }
}

/// Indicator columns derived from one series, aligned 1:1 with its dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub code: String,
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<f64>,
    pub series: Vec<IndicatorSeries>,
}

impl IndicatorSet {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn get(&self, indicator: &IndicatorType) -> Option<&IndicatorSeries> {
        self.series.iter().find(|s| &s.indicator_type == indicator)
    }

    pub fn value(&self, indicator: &IndicatorType, index: usize) -> Option<&IndicatorValue> {
        self.get(indicator).and_then(|s| s.at(index))
    }

    /// Every indicator's value at `index`, keyed by display name.
    pub fn row(&self, index: usize) -> Vec<(String, Option<IndicatorValue>)> {
        self.series
            .iter()
            .map(|s| (s.indicator_type.to_string(), s.at(index).cloned()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAnalysis {
    pub indicators: IndicatorSet,
    pub signals: Vec<CompositeSignal>,
}

impl TechnicalAnalysis {
    pub fn latest_signal(&self) -> Option<&CompositeSignal> {
        self.signals.last()
    }
}

#[derive(Debug)]
pub struct TechnicalEngine {
    config: TechnicalConfig,
    rules: Vec<Box<dyn SignalRule>>,
}

impl TechnicalEngine {
    pub fn new(config: TechnicalConfig) -> Result<Self, StockscopeError> {
        validate_technical_config(&config)?;

        let rules: Vec<Box<dyn SignalRule>> = vec![
            Box::new(MaCrossRule::new(config.signal_fast_ma, config.signal_slow_ma)),
            Box::new(MacdCrossRule {
                macd: config.macd_type(),
            }),
            Box::new(RsiThresholdRule {
                rsi: IndicatorType::Rsi {
                    period: config.rsi_period,
                },
                oversold: config.rsi_oversold,
                overbought: config.rsi_overbought,
            }),
            Box::new(KdjCrossRule {
                kdj: config.kdj_type(),
                oversold: config.kdj_oversold,
                overbought: config.kdj_overbought,
            }),
            Box::new(BollingerBreakRule {
                bands: config.bollinger_type(),
            }),
        ];

        Ok(Self { config, rules })
    }

    pub fn config(&self) -> &TechnicalConfig {
        &self.config
    }

    pub fn rules(&self) -> &[Box<dyn SignalRule>] {
        &self.rules
    }

    /// Overlays plus anything a rule reads, each computed once.
    fn required_indicators(&self) -> Vec<IndicatorType> {
        let mut out = self.config.overlays();
        for rule in &self.rules {
            for indicator in rule.required_indicators() {
                if !out.contains(&indicator) {
                    out.push(indicator);
                }
            }
        }
        out
    }

    pub fn compute_indicators(&self, series: &PriceSeries) -> IndicatorSet {
        let bars = series.bars();
        let computed: Vec<IndicatorSeries> = self
            .required_indicators()
            .iter()
            .map(|indicator| compute_indicator(bars, indicator))
            .collect();

        debug!(
            code = series.code(),
            bars = bars.len(),
            indicators = computed.len(),
            "computed indicator set"
        );

        IndicatorSet {
            code: series.code().to_string(),
            dates: series.dates(),
            closes: series.closes(),
            series: computed,
        }
    }

    /// One composite verdict per date, from rules with a defined value that date.
    pub fn synthesize_signals(&self, set: &IndicatorSet) -> Vec<CompositeSignal> {
        (0..set.len())
            .map(|index| {
                let events = self
                    .rules
                    .iter()
                    .filter_map(|rule| rule.evaluate(set, index))
                    .collect();
                combine(
                    set.dates[index],
                    events,
                    self.config.voting_rule,
                    self.config.strong_vote_threshold,
                )
            })
            .collect()
    }

    pub fn analyze(&self, series: &PriceSeries) -> TechnicalAnalysis {
        let indicators = self.compute_indicators(series);
        let signals = self.synthesize_signals(&indicators);
        TechnicalAnalysis {
            indicators,
            signals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::signal::Direction;
    use chrono::Duration;

    fn make_series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                date: start + Duration::days(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1000,
            })
            .collect();
        PriceSeries::new("TEST", bars).unwrap()
    }

    #[test]
    fn default_set_has_every_overlay() {
        let engine = TechnicalEngine::new(TechnicalConfig::default()).unwrap();
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 0.5).collect();
        let set = engine.compute_indicators(&make_series(&closes));

        let names: Vec<String> = set
            .series
            .iter()
            .map(|s| s.indicator_type.to_string())
            .collect();
        let expected = [
            "MA5",
            "MA20",
            "MA60",
            "EMA12",
            "EMA26",
            "RSI14",
            "MACD(12,26,9)",
            "KDJ(9,3,3)",
            "BB(20,2)",
            "ATR14",
            "OBV",
        ];
        for name in expected {
            assert!(names.contains(&name.to_string()), "missing {}", name);
        }
        assert!(set.series.iter().all(|s| s.values.len() == 80));
    }

    #[test]
    fn warmup_entries_are_undefined_not_zero() {
        let engine = TechnicalEngine::new(TechnicalConfig::default()).unwrap();
        let set = engine.compute_indicators(&make_series(&[100.0; 30]));
        let ma60 = set.get(&IndicatorType::Sma { period: 60 }).unwrap();
        assert!(ma60.values.iter().all(|p| p.value.is_none()));
        assert!(set.value(&IndicatorType::Sma { period: 5 }, 3).is_none());
        assert!(set.value(&IndicatorType::Sma { period: 5 }, 4).is_some());
    }

    #[test]
    fn one_composite_per_date() {
        let engine = TechnicalEngine::new(TechnicalConfig::default()).unwrap();
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.4).sin() * 6.0)
            .collect();
        let analysis = engine.analyze(&make_series(&closes));
        assert_eq!(analysis.signals.len(), 60);
        for (signal, date) in analysis.signals.iter().zip(&analysis.indicators.dates) {
            assert_eq!(&signal.date, date);
        }
        // nothing is defined on the first bar
        assert!(analysis.signals[0].events.is_empty());
        assert_eq!(analysis.signals[0].direction, Direction::Hold);
    }

    #[test]
    fn synthesis_is_deterministic() {
        let engine = TechnicalEngine::new(TechnicalConfig::default()).unwrap();
        let closes: Vec<f64> = (0..50).map(|i| 50.0 + (i % 7) as f64).collect();
        let set = engine.compute_indicators(&make_series(&closes));
        assert_eq!(engine.synthesize_signals(&set), engine.synthesize_signals(&set));
    }

    #[test]
    fn signal_ma_pair_is_added_when_not_an_overlay() {
        let config = TechnicalConfig {
            ma_windows: vec![60],
            signal_fast_ma: 3,
            signal_slow_ma: 8,
            ..TechnicalConfig::default()
        };
        let engine = TechnicalEngine::new(config).unwrap();
        let set = engine.compute_indicators(&make_series(&[10.0; 12]));
        assert!(set.get(&IndicatorType::Sma { period: 3 }).is_some());
        assert!(set.get(&IndicatorType::Sma { period: 8 }).is_some());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = TechnicalConfig {
            macd_fast: 30,
            ..TechnicalConfig::default()
        };
        assert!(TechnicalEngine::new(config).is_err());
    }

    #[test]
    fn sub_hundredth_band_multiplier_is_rejected() {
        let config = TechnicalConfig {
            bollinger_multiplier: 0.004,
            ..TechnicalConfig::default()
        };
        assert!(matches!(
            TechnicalEngine::new(config),
            Err(StockscopeError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn row_reports_names_and_values() {
        let engine = TechnicalEngine::new(TechnicalConfig::default()).unwrap();
        let set = engine.compute_indicators(&make_series(&[100.0; 10]));
        let row = set.row(9);
        let ma5 = row.iter().find(|(name, _)| name == "MA5").unwrap();
        assert_eq!(ma5.1.as_ref().and_then(IndicatorValue::as_simple), Some(100.0));
    }
}
