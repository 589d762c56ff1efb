//! Configuration validation.
//!
//! Checks every config field and turns the INI sections into a typed
//! [`RunConfig`] before a backtest runs.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::domain::backtest::{BacktestRequest, ModelSpec};
use crate::domain::bars::{BarMode, BarSpec, TailPolicy};
use crate::domain::error::AlphaginiError;
use crate::domain::ohlcv::PriceBasis;
use crate::domain::strategy::StrategyKind;
use crate::domain::timeframe::{parse_timestamp, Timeframe};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;
pub const DEFAULT_MODEL_WINDOW: i64 = 20;
pub const DEFAULT_FAST: i64 = 10;
pub const DEFAULT_SLOW: i64 = 50;

/// A validated configuration: where the data lives, where results are
/// cached, and the request to run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub csv: Option<String>,
    pub cache_dir: Option<String>,
    pub request: BacktestRequest,
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<RunConfig, AlphaginiError> {
    let (start, end) = validate_window(config)?;
    let timeframe = parse_field::<Timeframe>(config, "data", "timeframe")?;
    let (bars, periods_per_year) = validate_bars(config)?;
    let model = validate_model(config)?;
    let strategy = validate_strategy(config)?;
    let initial_cash = validate_initial_cash(config)?;
    let lookback_days = validate_lookback(config)?;

    let request = BacktestRequest {
        symbol: config.get_value("data", "symbol"),
        timeframe,
        bars,
        start,
        end,
        lookback_days,
        model,
        strategy,
        initial_cash,
        periods_per_year,
    };

    Ok(RunConfig {
        csv: config.get_value("data", "csv"),
        cache_dir: config.get_value("cache", "dir"),
        request,
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> AlphaginiError {
    AlphaginiError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn parse_field<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<T>, AlphaginiError>
where
    T: FromStr,
    T::Err: Display,
{
    config
        .get_value(section, key)
        .map(|v| v.parse::<T>().map_err(|e| invalid(section, key, e.to_string())))
        .transpose()
}

fn positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<usize, AlphaginiError> {
    let value = config.get_int(section, key)?.unwrap_or(default);
    if value < 1 {
        return Err(invalid(section, key, format!("{key} must be at least 1")));
    }
    usize::try_from(value).map_err(|_| invalid(section, key, format!("{value} is out of range")))
}

fn validate_window(
    config: &dyn ConfigPort,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AlphaginiError> {
    let parse = |key: &str| {
        config
            .get_value("data", key)
            .map(|v| parse_timestamp(&v).map_err(|e| invalid("data", key, e.to_string())))
            .transpose()
    };
    let start = parse("start")?;
    let end = parse("end")?;

    if let (Some(s), Some(e)) = (start, end) {
        if s >= e {
            return Err(invalid("data", "start", "start must be before end"));
        }
    }
    Ok((start, end))
}

fn validate_bars(config: &dyn ConfigPort) -> Result<(Option<BarSpec>, Option<f64>), AlphaginiError> {
    let periods_per_year = config.get_double("bars", "periods_per_year")?;
    if let Some(ppy) = periods_per_year {
        if ppy <= 0.0 {
            return Err(invalid("bars", "periods_per_year", "periods_per_year must be positive"));
        }
    }

    let mode = config.get_value("bars", "mode").unwrap_or_else(|| "time".into());
    if mode.eq_ignore_ascii_case("time") {
        return Ok((None, periods_per_year));
    }
    let mode: BarMode = mode.parse().map_err(|e: AlphaginiError| invalid("bars", "mode", e.to_string()))?;

    let threshold = config
        .get_double("bars", "threshold")?
        .ok_or_else(|| AlphaginiError::ConfigMissing {
            section: "bars".to_string(),
            key: "threshold".to_string(),
        })?;
    if threshold <= 0.0 {
        return Err(invalid("bars", "threshold", "threshold must be positive"));
    }
    if periods_per_year.is_none() {
        return Err(AlphaginiError::ConfigMissing {
            section: "bars".to_string(),
            key: "periods_per_year".to_string(),
        });
    }

    let price_basis = parse_field::<PriceBasis>(config, "bars", "price_basis")?.unwrap_or_default();
    let tail = parse_field::<TailPolicy>(config, "bars", "tail")?.unwrap_or_default();

    let spec = BarSpec::new(mode, threshold)
        .with_price_basis(price_basis)
        .with_tail(tail);
    Ok((Some(spec), periods_per_year))
}

fn validate_model(config: &dyn ConfigPort) -> Result<ModelSpec, AlphaginiError> {
    let name = config.get_value("model", "name").unwrap_or_else(|| "naive".into());
    let window = positive_int(config, "model", "window", DEFAULT_MODEL_WINDOW)?;
    ModelSpec::from_name(&name, window).map_err(|e| invalid("model", "name", e.to_string()))
}

fn validate_strategy(config: &dyn ConfigPort) -> Result<StrategyKind, AlphaginiError> {
    let name = config
        .get_value("strategy", "name")
        .unwrap_or_else(|| "buy_hold".into());
    let fast = positive_int(config, "strategy", "fast", DEFAULT_FAST)?;
    let slow = positive_int(config, "strategy", "slow", DEFAULT_SLOW)?;
    let kind = StrategyKind::from_name(&name, fast, slow)
        .map_err(|e| invalid("strategy", "name", e.to_string()))?;
    Ok(kind)
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<f64, AlphaginiError> {
    let value = config
        .get_double("backtest", "initial_cash")?
        .unwrap_or(DEFAULT_INITIAL_CASH);
    if value <= 0.0 {
        return Err(invalid("backtest", "initial_cash", "initial_cash must be positive"));
    }
    Ok(value)
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<u32, AlphaginiError> {
    let value = config.get_int("backtest", "lookback_days")?.unwrap_or(0);
    u32::try_from(value).map_err(|_| {
        invalid(
            "backtest",
            "lookback_days",
            format!("lookback_days must be a non-negative day count, got {value}"),
        )
    })
}
