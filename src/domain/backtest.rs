//! End-to-end backtest pipeline.
//!
//! bars -> [threshold bars] -> train/test split -> forecast -> positions
//! -> equity -> metrics. A run either returns a complete [`BacktestResult`]
//! or fails as a whole.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::bars::{build_series, BarSpec};
use super::error::AlphaginiError;
use super::forecast::{naive_forecast, Forecaster, ForecasterKind};
use super::metrics::{model_errors, score, MetricsRecord};
use super::ohlcv::BarSeries;
use super::simulator::{simulate, EquityPoint};
use super::strategy::{PositionModel, StrategyKind};
use super::timeframe::{resolve_periods_per_year, Sampling, Timeframe};

/// Which forecaster a request asks for. Built-in variants map onto
/// [`ForecasterKind`]; `Ar1` is served by an external model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelSpec {
    Naive,
    Sma { window: usize },
    Ar1,
}

impl ModelSpec {
    pub fn from_name(name: &str, window: usize) -> Result<Self, AlphaginiError> {
        let spec = match name.trim().to_lowercase().as_str() {
            "naive" => ModelSpec::Naive,
            "sma" => ModelSpec::Sma { window },
            "ar1" => ModelSpec::Ar1,
            other => {
                return Err(AlphaginiError::invalid(
                    "model",
                    format!("unknown model '{other}'"),
                ));
            }
        };
        if let Some(kind) = spec.builtin() {
            kind.validate()?;
        }
        Ok(spec)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelSpec::Naive => "naive",
            ModelSpec::Sma { .. } => "sma",
            ModelSpec::Ar1 => "ar1",
        }
    }

    /// The in-core forecaster for this spec, if it has one.
    pub fn builtin(&self) -> Option<ForecasterKind> {
        match self {
            ModelSpec::Naive => Some(ForecasterKind::Naive),
            ModelSpec::Sma { window } => Some(ForecasterKind::Sma { window: *window }),
            ModelSpec::Ar1 => None,
        }
    }
}

/// Everything that determines the outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub symbol: Option<String>,
    /// Native sampling interval; inferred from the data when absent.
    pub timeframe: Option<Timeframe>,
    /// Threshold bars to build before running. `None` keeps time bars.
    pub bars: Option<BarSpec>,
    pub start: Option<DateTime<Utc>>,
    /// Exclusive.
    pub end: Option<DateTime<Utc>>,
    /// Leading span reserved for forecaster training.
    pub lookback_days: u32,
    pub model: ModelSpec,
    pub strategy: StrategyKind,
    pub initial_cash: f64,
    /// Overrides the annualization factor derived from the sampling.
    pub periods_per_year: Option<f64>,
}

impl BacktestRequest {
    pub fn new(model: ModelSpec, strategy: StrategyKind, initial_cash: f64) -> Self {
        BacktestRequest {
            symbol: None,
            timeframe: None,
            bars: None,
            start: None,
            end: None,
            lookback_days: 0,
            model,
            strategy,
            initial_cash,
            periods_per_year: None,
        }
    }

    pub fn validate(&self) -> Result<(), AlphaginiError> {
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(AlphaginiError::invalid(
                "request",
                format!("initial cash {} must be positive", self.initial_cash),
            ));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(AlphaginiError::invalid(
                    "request",
                    format!("start {start} must be before end {end}"),
                ));
            }
        }
        if let Some(spec) = &self.bars {
            spec.validate()?;
        }
        if let Some(kind) = self.model.builtin() {
            kind.validate()?;
        }
        self.strategy.validate()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Stable hex digest of the request alone.
    pub fn fingerprint(&self) -> Result<String, AlphaginiError> {
        self.fingerprint_for(None)
    }

    /// Stable hex digest of the request together with the identity of the
    /// data source it runs against, used as the result cache key.
    pub fn fingerprint_for(&self, source: Option<&str>) -> Result<String, AlphaginiError> {
        #[derive(Serialize)]
        struct Keyed<'a> {
            source: Option<&'a str>,
            request: &'a BacktestRequest,
        }

        let json = serde_json::to_string(&Keyed {
            source,
            request: self,
        })
        .map_err(|e| AlphaginiError::invalid("request fingerprint", e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub fingerprint: String,
    pub symbol: Option<String>,
    pub forecaster: String,
    pub strategy: String,
    pub train_bars: usize,
    pub test_bars: usize,
    pub periods_per_year: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: MetricsRecord,
    /// RMSE of the naive forecast over the same test window.
    pub baseline_rmse: Option<f64>,
}

pub fn run_backtest(
    series: &BarSeries,
    request: &BacktestRequest,
    forecaster: &dyn Forecaster,
) -> Result<BacktestResult, AlphaginiError> {
    request.validate()?;

    let windowed = restrict_window(series, request.start, request.end)?;
    if windowed.is_empty() {
        return Err(AlphaginiError::empty("price series in requested window"));
    }

    let (sampled, sampling) = match &request.bars {
        Some(spec) => (
            build_series(&windowed, spec)?,
            Some(Sampling::Threshold(spec.mode)),
        ),
        None => {
            let timeframe = match (request.timeframe, request.periods_per_year) {
                (Some(tf), _) => Some(tf),
                (None, Some(_)) => None,
                (None, None) => Some(Timeframe::infer(&windowed)?),
            };
            (windowed, timeframe.map(Sampling::Time))
        }
    };
    let periods_per_year = resolve_periods_per_year(sampling.as_ref(), request.periods_per_year)?;

    let (train, test) = split_train_test(&sampled, request.lookback_days)?;
    tracing::debug!(
        train = train.len(),
        test = test.len(),
        periods_per_year,
        "split series"
    );

    let train_prices = train.closes();
    let test_prices = test.closes();

    let forecast = forecaster.fit_predict(&train_prices, &test_prices);
    if forecast.len() != test_prices.len() {
        return Err(AlphaginiError::misaligned(
            format!("{} forecast vs test window", forecaster.name()),
            forecast.len(),
            test_prices.len(),
        ));
    }

    let positions = request.strategy.generate(&test_prices, Some(&forecast))?;
    let equity_curve = simulate(&test, &positions, request.initial_cash)?;
    let metrics = score(
        &equity_curve,
        periods_per_year,
        request.initial_cash,
        Some(&test_prices),
        Some(&forecast),
    )?;
    let baseline = model_errors(&test_prices, &naive_forecast(&train_prices, &test_prices))?;

    Ok(BacktestResult {
        fingerprint: request.fingerprint()?,
        symbol: request.symbol.clone(),
        forecaster: forecaster.name().to_string(),
        strategy: request.strategy.name().to_string(),
        train_bars: train.len(),
        test_bars: test.len(),
        periods_per_year,
        equity_curve,
        metrics,
        baseline_rmse: baseline.rmse,
    })
}

/// Bars with `start <= ts < end`.
fn restrict_window(
    series: &BarSeries,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<BarSeries, AlphaginiError> {
    if start.is_none() && end.is_none() {
        return Ok(series.clone());
    }
    let bars = series
        .bars()
        .iter()
        .filter(|b| start.is_none_or(|s| b.ts >= s) && end.is_none_or(|e| b.ts < e))
        .cloned()
        .collect();
    BarSeries::new(bars)
}

/// Bars within `lookback_days` of the first bar train; the rest are tested.
pub fn split_train_test(
    series: &BarSeries,
    lookback_days: u32,
) -> Result<(BarSeries, BarSeries), AlphaginiError> {
    let first = series
        .first()
        .ok_or_else(|| AlphaginiError::empty("price series"))?;
    if lookback_days == 0 {
        return Ok((BarSeries::empty(), series.clone()));
    }

    let cutoff = first.ts + Duration::days(i64::from(lookback_days));
    let index = series.bars().partition_point(|b| b.ts < cutoff);
    let (train, test) = series.split_at(index);
    if test.is_empty() {
        return Err(AlphaginiError::empty(format!(
            "test window after a {lookback_days}-day lookback"
        )));
    }
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bars::BarMode;
    use crate::domain::ohlcv::Bar;
    use crate::domain::strategy::TrendFilter;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn make_series(closes: &[f64]) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                ts: start + Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 50.0,
                trades: None,
                vwap: None,
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    fn buy_hold() -> BacktestRequest {
        BacktestRequest::new(ModelSpec::Naive, StrategyKind::BuyHold, 1000.0)
    }

    #[test]
    fn buy_hold_pipeline() {
        let series = make_series(&[100.0, 110.0, 99.0]);
        let result = run_backtest(&series, &buy_hold(), &ForecasterKind::Naive).unwrap();

        let equity: Vec<f64> = result.equity_curve.iter().map(|p| p.equity).collect();
        assert_relative_eq!(equity[0], 1000.0);
        assert_relative_eq!(equity[1], 1100.0, epsilon = 1e-9);
        assert_relative_eq!(equity[2], 990.0, epsilon = 1e-9);
        assert_eq!(result.periods_per_year, 365.0);
        assert_eq!(result.train_bars, 0);
        assert_eq!(result.test_bars, 3);
        assert_eq!(result.forecaster, "naive");
        assert_eq!(result.strategy, "buy_hold");
        assert_relative_eq!(result.metrics.abs_return, -10.0, epsilon = 1e-9);
        assert_eq!(result.metrics.rmse, result.baseline_rmse);
    }

    #[test]
    fn degenerate_sma_cross_stays_in_cash() {
        let series = make_series(&[100.0, 110.0, 120.0]);
        let request = BacktestRequest::new(
            ModelSpec::Naive,
            StrategyKind::SmaCross(TrendFilter { fast: 2, slow: 3 }),
            1000.0,
        );
        let result = run_backtest(&series, &request, &ForecasterKind::Naive).unwrap();
        assert!(result.equity_curve.iter().all(|p| p.equity == 1000.0));
    }

    #[test]
    fn lookback_reserves_training_bars() {
        let series = make_series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let (train, test) = split_train_test(&series, 2).unwrap();
        assert_eq!(train.closes(), vec![1.0, 2.0]);
        assert_eq!(test.closes(), vec![3.0, 4.0, 5.0]);

        let mut request = buy_hold();
        request.lookback_days = 2;
        let result = run_backtest(&series, &request, &ForecasterKind::Naive).unwrap();
        assert_eq!(result.train_bars, 2);
        assert_eq!(result.test_bars, 3);
        assert_eq!(result.equity_curve[0].ts, series.bars()[2].ts);
    }

    #[test]
    fn lookback_covering_everything_is_empty() {
        let series = make_series(&[1.0, 2.0]);
        assert!(matches!(
            split_train_test(&series, 30),
            Err(AlphaginiError::EmptyInput { .. })
        ));
    }

    #[test]
    fn window_end_is_exclusive() {
        let series = make_series(&[1.0, 2.0, 3.0, 4.0]);
        let mut request = buy_hold();
        request.start = Some(series.bars()[1].ts);
        request.end = Some(series.bars()[3].ts);
        let result = run_backtest(&series, &request, &ForecasterKind::Naive).unwrap();
        assert_eq!(result.test_bars, 2);
    }

    #[test]
    fn empty_window_is_an_error() {
        let series = make_series(&[1.0, 2.0]);
        let mut request = buy_hold();
        request.start = Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
        assert!(matches!(
            run_backtest(&series, &request, &ForecasterKind::Naive),
            Err(AlphaginiError::EmptyInput { .. })
        ));
    }

    #[test]
    fn threshold_bars_need_explicit_frequency() {
        let series = make_series(&[10.0; 10]);
        let mut request = buy_hold();
        request.bars = Some(BarSpec::new(BarMode::Volume, 120.0));
        assert!(matches!(
            run_backtest(&series, &request, &ForecasterKind::Naive),
            Err(AlphaginiError::AmbiguousFrequency { .. })
        ));

        request.periods_per_year = Some(500.0);
        let result = run_backtest(&series, &request, &ForecasterKind::Naive).unwrap();
        assert_eq!(result.test_bars, 4);
        assert_eq!(result.periods_per_year, 500.0);
    }

    #[test]
    fn fingerprint_tracks_request_contents() {
        let a = buy_hold();
        let mut b = buy_hold();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        b.initial_cash = 2000.0;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
    }

    #[test]
    fn fingerprint_covers_data_source() {
        let req = buy_hold();
        assert_eq!(req.fingerprint().unwrap(), req.fingerprint_for(None).unwrap());
        assert_ne!(
            req.fingerprint_for(Some("/data/a.csv")).unwrap(),
            req.fingerprint_for(Some("/data/b.csv")).unwrap()
        );
        assert_ne!(
            req.fingerprint().unwrap(),
            req.fingerprint_for(Some("/data/a.csv")).unwrap()
        );
    }

    #[test]
    fn request_validation() {
        let mut request = buy_hold();
        request.initial_cash = 0.0;
        assert!(request.validate().is_err());

        let mut request = buy_hold();
        request.model = ModelSpec::Sma { window: 0 };
        assert!(request.validate().is_err());
    }

    #[test]
    fn model_spec_names() {
        assert_eq!(ModelSpec::from_name("naive", 5).unwrap(), ModelSpec::Naive);
        assert_eq!(
            ModelSpec::from_name("SMA", 5).unwrap(),
            ModelSpec::Sma { window: 5 }
        );
        assert_eq!(ModelSpec::from_name("ar1", 0).unwrap(), ModelSpec::Ar1);
        assert!(ModelSpec::from_name("prophet", 5).is_err());
        assert!(ModelSpec::from_name("sma", 0).is_err());
    }

    #[test]
    fn request_round_trips_through_json() {
        let mut request = buy_hold();
        request.timeframe = Some("1h".parse().unwrap());
        request.bars = Some(BarSpec::new(BarMode::Dollar, 1e6));
        let json = serde_json::to_string(&request).unwrap();
        let back: BacktestRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
