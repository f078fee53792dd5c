//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestEngine, BacktestResult};
use crate::domain::error::StockscopeError;
use crate::domain::execution::CostModel;
use crate::domain::indicator::IndicatorValue;
use crate::domain::metric_value::MetricValue;
use crate::domain::option::{OptionContract, OptionType};
use crate::domain::price_series::PriceSeries;
use crate::domain::pricing::{
    ImpliedVolatility, IvSolverConfig, OptionPricingEngine, OptionValuation, PricingConfig,
};
use crate::domain::risk::{
    RiskConfig, RiskEngine, RiskResult, RiskScan, RiskThresholds, ScanExclusion,
};
use crate::domain::screener::{
    ScoreWeights, ScreenFilters, ScreenResult, ScreenerConfig, WarrantScreener, WarrantTerms,
};
use crate::domain::signal::CompositeSignal;
use crate::domain::technical::{TechnicalAnalysis, TechnicalConfig, TechnicalEngine};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(
    name = "stockscope",
    about = "Risk, technical-signal and warrant analytics for daily price series"
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// INI file overriding engine defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Risk metrics for one price series
    Risk {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        benchmark: Option<PathBuf>,
    },
    /// Indicator snapshot and composite signals
    Signals {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        data: PathBuf,
        #[arg(long, default_value_t = 10)]
        last: usize,
    },
    /// Backtest the composite technical signal
    Backtest {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        data: PathBuf,
    },
    /// Value one option or warrant contract
    Price {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        contract: PriceArgs,
    },
    /// Rank warrants on an underlying
    Screen {
        #[command(flatten)]
        common: CommonArgs,
        /// Underlying price file
        #[arg(long, requires = "warrants", conflicts_with_all = ["dir", "code"])]
        data: Option<PathBuf>,
        /// Warrant listing file
        #[arg(long, requires = "data")]
        warrants: Option<PathBuf>,
        /// Data directory holding {code}.csv and {code}_warrants.csv
        #[arg(long, requires = "code")]
        dir: Option<PathBuf>,
        #[arg(long, requires = "dir")]
        code: Option<String>,
        #[arg(long)]
        top: Option<usize>,
    },
    /// Risk metrics for every series in a data directory
    Scan {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        dir: PathBuf,
        /// Code of the benchmark series within the directory
        #[arg(long)]
        benchmark: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Show data range for code(s) in a data directory
    Info {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        code: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct PriceArgs {
    #[arg(long)]
    pub spot: f64,
    #[arg(long)]
    pub strike: f64,
    /// Time to expiry in years
    #[arg(long)]
    pub years: f64,
    #[arg(long)]
    pub volatility: f64,
    #[arg(long = "type", default_value = "call")]
    pub option_type: OptionType,
    /// Defaults to [pricing] risk_free_rate
    #[arg(long)]
    pub rate: Option<f64>,
    #[arg(long, default_value_t = 1.0)]
    pub multiplier: f64,
    /// Observed price per contract; adds implied volatility
    #[arg(long)]
    pub market_price: Option<f64>,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Risk {
            common,
            data,
            benchmark,
        } => run_risk(&common, &data, benchmark.as_deref()),
        Command::Signals { common, data, last } => run_signals(&common, &data, last),
        Command::Backtest { common, data } => run_backtest(&common, &data),
        Command::Price { common, contract } => run_price(&common, &contract),
        Command::Screen {
            common,
            data,
            warrants,
            dir,
            code,
            top,
        } => run_screen(&common, data, warrants, dir, code, top),
        Command::Scan {
            common,
            dir,
            benchmark,
            start,
            end,
        } => run_scan(&common, dir, benchmark.as_deref(), start, end),
        Command::Info { dir, code } => run_info(dir, code.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// The INI file at `path`, or an empty config (all defaults) when none is given.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, StockscopeError> {
    match path {
        Some(p) => {
            info!(path = %p.display(), "loading config");
            FileConfigAdapter::from_file(p)
        }
        None => FileConfigAdapter::from_string(""),
    }
}

/// Series code taken from the file stem, `2330.csv` → `2330`.
pub fn load_series(path: &Path) -> Result<PriceSeries, StockscopeError> {
    let code = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "series".to_string());
    CsvAdapter::load_series(path, &code)
}

fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> StockscopeError {
    StockscopeError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: reason.into(),
    }
}

fn get_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, StockscopeError> {
    let value = config.get_int(section, key, default as i64);
    usize::try_from(value).map_err(|_| config_invalid(section, key, "must be non-negative"))
}

fn get_windows(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: &[usize],
) -> Result<Vec<usize>, StockscopeError> {
    match config.get_list(section, key) {
        None => Ok(default.to_vec()),
        Some(items) => items
            .iter()
            .map(|item| {
                item.parse::<usize>().map_err(|_| {
                    config_invalid(section, key, format!("'{}' is not a window length", item))
                })
            })
            .collect(),
    }
}

fn get_parsed<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, StockscopeError>
where
    T: FromStr<Err = StockscopeError>,
{
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e: StockscopeError| config_invalid(section, key, e.to_string())),
    }
}

pub fn build_risk_config(config: &dyn ConfigPort) -> Result<RiskConfig, StockscopeError> {
    const S: &str = "risk";
    let d = RiskConfig::default();
    let t = d.thresholds;
    let horizon = config.get_int(S, "var_horizon_days", d.var_horizon_days as i64);
    Ok(RiskConfig {
        annualization_factor: config.get_double(S, "annualization_factor", d.annualization_factor),
        var_confidence: config.get_double(S, "var_confidence", d.var_confidence),
        var_horizon_days: u32::try_from(horizon)
            .map_err(|_| config_invalid(S, "var_horizon_days", "must be non-negative"))?,
        portfolio_value: config.get_double(S, "portfolio_value", d.portfolio_value),
        risk_free_rate: config.get_double(S, "risk_free_rate", d.risk_free_rate),
        thresholds: RiskThresholds {
            volatility_medium: config.get_double(S, "volatility_medium", t.volatility_medium),
            volatility_high: config.get_double(S, "volatility_high", t.volatility_high),
            volatility_extreme: config.get_double(S, "volatility_extreme", t.volatility_extreme),
            var_escalation: config.get_double(S, "var_escalation", t.var_escalation),
            drawdown_escalation: config.get_double(
                S,
                "drawdown_escalation",
                t.drawdown_escalation,
            ),
        },
    })
}

pub fn build_technical_config(config: &dyn ConfigPort) -> Result<TechnicalConfig, StockscopeError> {
    const S: &str = "technical";
    let d = TechnicalConfig::default();
    Ok(TechnicalConfig {
        ma_windows: get_windows(config, S, "ma_windows", &d.ma_windows)?,
        ema_windows: get_windows(config, S, "ema_windows", &d.ema_windows)?,
        rsi_period: get_usize(config, S, "rsi_period", d.rsi_period)?,
        rsi_oversold: config.get_double(S, "rsi_oversold", d.rsi_oversold),
        rsi_overbought: config.get_double(S, "rsi_overbought", d.rsi_overbought),
        macd_fast: get_usize(config, S, "macd_fast", d.macd_fast)?,
        macd_slow: get_usize(config, S, "macd_slow", d.macd_slow)?,
        macd_signal: get_usize(config, S, "macd_signal", d.macd_signal)?,
        kdj_period: get_usize(config, S, "kdj_period", d.kdj_period)?,
        kdj_k_smoothing: get_usize(config, S, "kdj_k_smoothing", d.kdj_k_smoothing)?,
        kdj_d_smoothing: get_usize(config, S, "kdj_d_smoothing", d.kdj_d_smoothing)?,
        kdj_oversold: config.get_double(S, "kdj_oversold", d.kdj_oversold),
        kdj_overbought: config.get_double(S, "kdj_overbought", d.kdj_overbought),
        bollinger_period: get_usize(config, S, "bollinger_period", d.bollinger_period)?,
        bollinger_multiplier: config.get_double(S, "bollinger_multiplier", d.bollinger_multiplier),
        atr_period: get_usize(config, S, "atr_period", d.atr_period)?,
        signal_fast_ma: get_usize(config, S, "signal_fast_ma", d.signal_fast_ma)?,
        signal_slow_ma: get_usize(config, S, "signal_slow_ma", d.signal_slow_ma)?,
        voting_rule: get_parsed(config, S, "voting_rule", d.voting_rule)?,
        strong_vote_threshold: get_usize(
            config,
            S,
            "strong_vote_threshold",
            d.strong_vote_threshold,
        )?,
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, StockscopeError> {
    const S: &str = "backtest";
    let d = BacktestConfig::default();
    Ok(BacktestConfig {
        initial_capital: config.get_double(S, "initial_capital", d.initial_capital),
        costs: CostModel {
            transaction_cost: config.get_double(S, "transaction_cost", d.costs.transaction_cost),
            exit_tax: config.get_double(S, "exit_tax", d.costs.exit_tax),
            slippage: config.get_double(S, "slippage", d.costs.slippage),
        },
        risk_free_rate: config.get_double(S, "risk_free_rate", d.risk_free_rate),
    })
}

pub fn build_pricing_config(config: &dyn ConfigPort) -> Result<PricingConfig, StockscopeError> {
    const S: &str = "pricing";
    let d = PricingConfig::default();
    Ok(PricingConfig {
        risk_free_rate: config.get_double(S, "risk_free_rate", d.risk_free_rate),
        iv: IvSolverConfig {
            lower: config.get_double(S, "iv_lower", d.iv.lower),
            upper: config.get_double(S, "iv_upper", d.iv.upper),
            tolerance: config.get_double(S, "iv_tolerance", d.iv.tolerance),
            max_iterations: get_usize(config, S, "iv_max_iterations", d.iv.max_iterations)?,
            initial_guess: config.get_double(S, "iv_initial_guess", d.iv.initial_guess),
        },
    })
}

pub fn build_screener_config(config: &dyn ConfigPort) -> Result<ScreenerConfig, StockscopeError> {
    const S: &str = "screener";
    let d = ScreenerConfig::default();
    let risk_tolerance = get_parsed(config, S, "risk_tolerance", d.risk_tolerance)?;

    let weight_keys = ["weight_leverage", "weight_time_value", "weight_iv_rank"];
    let weights = if weight_keys
        .iter()
        .any(|key| config.get_string(S, key).is_some())
    {
        let base = risk_tolerance.weights();
        Some(ScoreWeights {
            leverage: config.get_double(S, "weight_leverage", base.leverage),
            time_value: config.get_double(S, "weight_time_value", base.time_value),
            iv_rank: config.get_double(S, "weight_iv_rank", base.iv_rank),
        })
    } else {
        None
    };

    let df = d.filters;
    Ok(ScreenerConfig {
        risk_tolerance,
        leverage_preference: get_parsed(config, S, "leverage_preference", d.leverage_preference)?,
        weights,
        top_n: get_usize(config, S, "top_n", d.top_n)?,
        filters: ScreenFilters {
            min_days_to_expiry: Some(config.get_int(
                S,
                "min_days_to_expiry",
                df.min_days_to_expiry.unwrap_or(0),
            )),
            max_effective_leverage: Some(config.get_double(
                S,
                "max_effective_leverage",
                df.max_effective_leverage.unwrap_or(f64::INFINITY),
            )),
            min_abs_delta: Some(config.get_double(
                S,
                "min_abs_delta",
                df.min_abs_delta.unwrap_or(0.0),
            )),
        },
        fallback_volatility: config.get_double(S, "fallback_volatility", d.fallback_volatility),
    })
}

/// Quotes `terms` against the last bar of `series`. Listings without a volatility use the
/// series' historical volatility, or the configured fallback when that is unavailable.
pub fn screen_series(
    series: &PriceSeries,
    terms: &[WarrantTerms],
    risk: &RiskEngine,
    screener: &WarrantScreener,
) -> ScreenResult {
    let last = series.last();
    let rate = screener.pricing().config().risk_free_rate;
    let fallback = match risk.volatility(series) {
        Ok(vol) if vol > 0.0 => vol,
        Ok(_) | Err(_) => {
            warn!(
                code = series.code(),
                fallback = screener.config().fallback_volatility,
                "historical volatility unavailable, using fallback"
            );
            screener.config().fallback_volatility
        }
    };
    let quotes: Vec<_> = terms
        .iter()
        .map(|t| t.to_quote(last.close, last.date, rate, fallback))
        .collect();
    screener.screen(&quotes)
}

/// Fetches the underlying and its warrants through `port`, then screens them.
pub fn screen_from_port(
    port: &dyn DataPort,
    code: &str,
    risk: &RiskEngine,
    screener: &WarrantScreener,
) -> Result<ScreenResult, StockscopeError> {
    let series = port.fetch_series(code, NaiveDate::MIN, NaiveDate::MAX)?;
    let terms = port.fetch_warrants(code)?;
    Ok(screen_series(&series, &terms, risk, screener))
}

/// Risk scan over every code `port` lists. Codes that fail to load are excluded alongside
/// codes whose analysis fails.
pub fn scan_from_port(
    port: &dyn DataPort,
    risk: &RiskEngine,
    benchmark: Option<&str>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RiskScan, StockscopeError> {
    let benchmark_series = benchmark
        .map(|code| port.fetch_series(code, start, end))
        .transpose()?;

    let mut loaded = Vec::new();
    let mut load_failures = Vec::new();
    for code in port.list_codes()? {
        if Some(code.as_str()) == benchmark {
            continue;
        }
        match port.fetch_series(&code, start, end) {
            Ok(series) => loaded.push(series),
            Err(err) => {
                warn!(code = %code, reason = %err, "excluded from risk scan");
                load_failures.push(ScanExclusion {
                    code,
                    reason: err.to_string(),
                });
            }
        }
    }

    let mut scan = risk.scan(&loaded, benchmark_series.as_ref());
    scan.excluded.extend(load_failures);
    Ok(scan)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), StockscopeError> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{}", text);
    Ok(())
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn run_risk(
    common: &CommonArgs,
    data: &Path,
    benchmark: Option<&Path>,
) -> Result<(), StockscopeError> {
    let config = load_config(common.config.as_deref())?;
    let engine = RiskEngine::new(build_risk_config(&config)?)?;
    let series = load_series(data)?;
    let benchmark = benchmark.map(load_series).transpose()?;
    let result = engine.analyze(&series, benchmark.as_ref())?;

    if common.json {
        return print_json(&result);
    }
    print_risk(&result);
    Ok(())
}

fn print_risk(r: &RiskResult) {
    println!("Risk report: {} ({} bars)", r.code, r.observations);
    println!("  Volatility (annualized): {}", pct(r.volatility));
    println!(
        "  VaR {:.0}% {}d: {}   CVaR: {}",
        r.value_at_risk.confidence * 100.0,
        r.value_at_risk.horizon_days,
        pct(r.value_at_risk.var),
        pct(r.value_at_risk.cvar)
    );
    println!("  Beta: {}", r.beta);
    println!("  Sharpe: {}", r.sharpe);
    println!(
        "  Max drawdown: {} ({} -> {}, longest underwater {} bars)",
        pct(r.max_drawdown.depth),
        r.max_drawdown.peak_date,
        r.max_drawdown.trough_date,
        r.max_drawdown.longest_underwater
    );
    let escalations: Vec<String> = r
        .assessment
        .escalations
        .iter()
        .map(|e| format!("{:?}", e))
        .collect();
    if escalations.is_empty() {
        println!("  Risk level: {}", r.assessment.level);
    } else {
        println!(
            "  Risk level: {} (volatility alone {}, escalated by {})",
            r.assessment.level,
            r.assessment.volatility_level,
            escalations.join(", ")
        );
    }
}

#[derive(Serialize)]
struct SignalSnapshot<'a> {
    date: NaiveDate,
    close: f64,
    indicators: BTreeMap<String, Option<IndicatorValue>>,
    signal: &'a CompositeSignal,
}

fn snapshots(analysis: &TechnicalAnalysis, last: usize) -> Vec<SignalSnapshot<'_>> {
    let set = &analysis.indicators;
    let start = set.len().saturating_sub(last);
    (start..set.len())
        .map(|i| SignalSnapshot {
            date: set.dates[i],
            close: set.closes[i],
            indicators: set.row(i).into_iter().collect(),
            signal: &analysis.signals[i],
        })
        .collect()
}

fn format_indicator(value: &Option<IndicatorValue>) -> String {
    match value {
        None => "-".to_string(),
        Some(IndicatorValue::Simple { value }) => format!("{:.4}", value),
        Some(IndicatorValue::Macd {
            line,
            signal,
            histogram,
        }) => format!("line {:.4} signal {:.4} hist {:.4}", line, signal, histogram),
        Some(IndicatorValue::Kdj { k, d, j }) => format!("K {:.2} D {:.2} J {:.2}", k, d, j),
        Some(IndicatorValue::Bollinger {
            upper,
            middle,
            lower,
            percent_b,
            bandwidth,
        }) => format!(
            "{:.4} / {:.4} / {:.4} %B {:.3} width {:.4}",
            upper, middle, lower, percent_b, bandwidth
        ),
    }
}

fn run_signals(common: &CommonArgs, data: &Path, last: usize) -> Result<(), StockscopeError> {
    let config = load_config(common.config.as_deref())?;
    let engine = TechnicalEngine::new(build_technical_config(&config)?)?;
    let series = load_series(data)?;
    let analysis = engine.analyze(&series);
    let rows = snapshots(&analysis, last);

    if common.json {
        return print_json(&rows);
    }

    println!("Signals: {} ({} bars)", series.code(), series.len());
    if let Some(latest) = rows.last() {
        println!("\nIndicators at {}:", latest.date);
        for (name, value) in &latest.indicators {
            println!("  {:<14} {}", name, format_indicator(value));
        }
    }
    println!(
        "\n{:<12} {:>10} {:<5} {:>8} {:>4} {:>4} {:>4}  sources",
        "date", "close", "dir", "strength", "buy", "sell", "hold"
    );
    for row in &rows {
        let s = row.signal;
        let sources: Vec<String> = s
            .events
            .iter()
            .map(|e| format!("{}:{}", e.source, e.direction))
            .collect();
        println!(
            "{:<12} {:>10.2} {:<5} {:>8.2} {:>4} {:>4} {:>4}  {}{}",
            row.date,
            row.close,
            s.direction,
            s.strength,
            s.buy_votes,
            s.sell_votes,
            s.hold_votes,
            sources.join(" "),
            if s.strong { "  (strong)" } else { "" }
        );
    }
    Ok(())
}

fn run_backtest(common: &CommonArgs, data: &Path) -> Result<(), StockscopeError> {
    let config = load_config(common.config.as_deref())?;
    let technical = TechnicalEngine::new(build_technical_config(&config)?)?;
    let engine = BacktestEngine::new(build_backtest_config(&config)?)?;
    let series = load_series(data)?;
    let result = engine.run(&series, &technical)?;

    if common.json {
        return print_json(&result);
    }
    print_backtest(&result);
    Ok(())
}

fn print_backtest(r: &BacktestResult) {
    let m = &r.metrics;
    println!("Backtest: {} ({} bars)", r.code, r.trace.len());
    println!("  Initial capital:   {:.2}", r.initial_capital);
    println!("  Final equity:      {:.2}", r.final_equity);
    println!("  Total return:      {}", pct(m.total_return));
    println!("  Annualized return: {}", pct(m.annualized_return));
    println!("  Sharpe:            {}", m.sharpe_ratio);
    println!("  Sortino:           {}", m.sortino_ratio);
    println!(
        "  Max drawdown:      {} ({} bars underwater)",
        pct(m.max_drawdown),
        m.max_drawdown_duration
    );
    println!(
        "  Trades:            {} ({} won, {} lost, {} breakeven)",
        m.total_trades, m.trades_won, m.trades_lost, m.trades_breakeven
    );
    println!("  Win rate:          {}", m.win_rate);
    println!("  Profit factor:     {}", m.profit_factor);
    println!("  Avg win / loss:    {:.2} / {:.2}", m.avg_win, m.avg_loss);
    println!("  Largest win / loss: {:.2} / {:.2}", m.largest_win, m.largest_loss);
    println!("  Avg holding days:  {:.1}", m.avg_trade_duration);
    if let Some(open) = &r.open_position {
        println!(
            "  Open position:     {:.4} shares since {} at {:.2}",
            open.shares, open.entry_date, open.entry_price
        );
    }
    if !r.trades.is_empty() {
        println!(
            "\n{:<12} {:<12} {:>10} {:>10} {:>12} {:>8}",
            "entry", "exit", "in", "out", "pnl", "return"
        );
        for t in &r.trades {
            println!(
                "{:<12} {:<12} {:>10.2} {:>10.2} {:>12.2} {:>8}",
                t.entry_date,
                t.exit_date,
                t.entry_price,
                t.exit_price,
                t.pnl,
                pct(t.return_pct)
            );
        }
    }
}

#[derive(Serialize)]
struct PriceReport {
    contract: OptionContract,
    valuation: OptionValuation,
    implied_volatility: Option<ImpliedVolatility>,
}

fn run_price(common: &CommonArgs, args: &PriceArgs) -> Result<(), StockscopeError> {
    let config = load_config(common.config.as_deref())?;
    let engine = OptionPricingEngine::new(build_pricing_config(&config)?)?;
    let contract = OptionContract {
        spot: args.spot,
        strike: args.strike,
        time_to_expiry: args.years,
        rate: args.rate.unwrap_or(engine.config().risk_free_rate),
        volatility: args.volatility,
        option_type: args.option_type,
        multiplier: args.multiplier,
    };
    let valuation = engine.value(&contract)?;
    let implied_volatility = args
        .market_price
        .map(|price| engine.implied_volatility(&contract, price))
        .transpose()?;

    let report = PriceReport {
        contract,
        valuation,
        implied_volatility,
    };
    if common.json {
        return print_json(&report);
    }

    let v = &report.valuation;
    let g = &v.greeks;
    println!(
        "{} S={} K={} T={}y r={} σ={} x{}",
        contract.option_type,
        contract.spot,
        contract.strike,
        contract.time_to_expiry,
        contract.rate,
        contract.volatility,
        contract.multiplier
    );
    println!("  Theoretical price: {:.4} ({:.4} per unit)", v.theoretical_price, v.unit_price);
    println!("  Intrinsic / time:  {:.4} / {:.4}", v.intrinsic_value, v.time_value);
    println!("  Moneyness:         {}", v.moneyness);
    println!("  Breakeven:         {:.4}", v.breakeven);
    println!("  Effective lev.:    {}", v.effective_leverage);
    println!("  Gearing:           {}", v.theoretical_leverage);
    println!("  Delta {:.4}  Gamma {:.6}", g.delta, g.gamma);
    println!(
        "  Theta {:.4}/day  Vega {:.4}/pt  Rho {:.4}/pt",
        g.theta_per_day(),
        g.vega_per_point(),
        g.rho_per_point()
    );
    if let Some(iv) = &report.implied_volatility {
        println!(
            "  Implied volatility: {} ({} iterations)",
            pct(iv.volatility),
            iv.iterations
        );
    }
    Ok(())
}

fn run_screen(
    common: &CommonArgs,
    data: Option<PathBuf>,
    warrants: Option<PathBuf>,
    dir: Option<PathBuf>,
    code: Option<String>,
    top: Option<usize>,
) -> Result<(), StockscopeError> {
    let config = load_config(common.config.as_deref())?;
    let risk = RiskEngine::new(build_risk_config(&config)?)?;
    let pricing = OptionPricingEngine::new(build_pricing_config(&config)?)?;
    let mut screener_config = build_screener_config(&config)?;
    if let Some(n) = top {
        screener_config.top_n = n;
    }
    let screener = WarrantScreener::new(screener_config, pricing)?;

    let result = match (data, warrants, dir, code) {
        (Some(data), Some(warrants), _, _) => {
            let series = load_series(&data)?;
            let terms = CsvAdapter::load_warrants(&warrants)?;
            screen_series(&series, &terms, &risk, &screener)
        }
        (_, _, Some(dir), Some(code)) => {
            screen_from_port(&CsvAdapter::new(dir), &code, &risk, &screener)?
        }
        _ => {
            return Err(StockscopeError::invalid(
                "screen",
                "give --data with --warrants, or --dir with --code",
            ));
        }
    };

    if common.json {
        return print_json(&result);
    }

    println!(
        "{:<4} {:<10} {:>7} {:>9} {:>8} {:>7} {:>6} {:>6}  recommendation",
        "rank", "id", "score", "leverage", "time val", "IV", "delta", "days"
    );
    for (i, w) in result.ranked.iter().enumerate() {
        let leverage = w
            .valuation
            .effective_leverage
            .value()
            .map(|l| format!("{:.2}", l))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<4} {:<10} {:>7.3} {:>9} {:>8.4} {:>7} {:>6.3} {:>6}  {}",
            i + 1,
            w.id,
            w.score,
            leverage,
            w.valuation.time_value,
            pct(w.implied_volatility),
            w.valuation.greeks.delta,
            w.days_to_expiry,
            w.recommendation
        );
    }
    if !result.excluded.is_empty() {
        println!("\nExcluded:");
        for e in &result.excluded {
            println!("  {}: {}", e.id, e.reason);
        }
    }
    Ok(())
}

fn run_scan(
    common: &CommonArgs,
    dir: PathBuf,
    benchmark: Option<&str>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), StockscopeError> {
    let config = load_config(common.config.as_deref())?;
    let risk = RiskEngine::new(build_risk_config(&config)?)?;
    let port = CsvAdapter::new(dir);
    let scan = scan_from_port(
        &port,
        &risk,
        benchmark,
        start.unwrap_or(NaiveDate::MIN),
        end.unwrap_or(NaiveDate::MAX),
    )?;

    if common.json {
        return print_json(&scan);
    }

    println!(
        "{:<10} {:>6} {:>9} {:>8} {:>10} {:>10} {:>9}  level",
        "code", "bars", "vol", "VaR", "beta", "sharpe", "max dd"
    );
    for r in &scan.results {
        let show = |m: &MetricValue| {
            m.value()
                .map(|v| format!("{:.3}", v))
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "{:<10} {:>6} {:>9} {:>8} {:>10} {:>10} {:>9}  {}",
            r.code,
            r.observations,
            pct(r.volatility),
            pct(r.value_at_risk.var),
            show(&r.beta),
            show(&r.sharpe),
            pct(r.max_drawdown.depth),
            r.assessment.level
        );
    }
    for e in &scan.excluded {
        println!("excluded {}: {}", e.code, e.reason);
    }
    Ok(())
}

fn run_info(dir: PathBuf, code: Option<&str>) -> Result<(), StockscopeError> {
    let port = CsvAdapter::new(dir);
    let codes = match code {
        Some(c) => vec![c.to_string()],
        None => port.list_codes()?,
    };

    for c in &codes {
        match port.get_data_range(c)? {
            Some((first, last, count)) => {
                println!("{}: {} to {} ({} bars)", c, first, last, count);
            }
            None => println!("{}: no data", c),
        }
    }
    Ok(())
}
