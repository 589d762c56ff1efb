#![allow(dead_code)]

use alphagini::domain::error::{AlphaginiError, ModelError};
pub use alphagini::domain::ohlcv::{Bar, BarSeries};
use alphagini::ports::data_port::DataPort;
use alphagini::ports::model_port::ModelPort;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::Cell;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
    pub fetches: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            fetches: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn lookup(&self, symbol: Option<&str>) -> Result<Vec<Bar>, AlphaginiError> {
        let symbol = symbol.unwrap_or("default");
        if let Some(reason) = self.errors.get(symbol) {
            return Err(AlphaginiError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: Option<&str>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<BarSeries, AlphaginiError> {
        self.fetches.set(self.fetches.get() + 1);
        let bars = self
            .lookup(symbol)?
            .into_iter()
            .filter(|b| start.is_none_or(|s| b.ts >= s) && end.is_none_or(|e| b.ts < e))
            .collect();
        BarSeries::new(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, AlphaginiError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: Option<&str>,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, AlphaginiError> {
        let bars = self.lookup(symbol)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.ts, last.ts, bars.len())),
            _ => None,
        })
    }
}

/// A model that always fails the way a non-converging fit would.
pub struct FailingModel;

impl ModelPort for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn fit_predict(&self, _train: &[f64], _horizon: usize) -> Result<Vec<f64>, ModelError> {
        Err(ModelError::NonConvergence {
            reason: "did not converge".into(),
        })
    }
}

pub fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub fn make_bar(at: DateTime<Utc>, close: f64, volume: f64) -> Bar {
    Bar {
        ts: at,
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume,
        trades: None,
        vwap: None,
    }
}

/// Daily bars starting 2024-01-01 with the given closes and unit volume.
pub fn daily_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(ts(2024, 1, 1) + Duration::days(i as i64), c, 1.0))
        .collect()
}

/// `count` bars `step_minutes` apart following a gentle zig-zag trend.
pub fn generate_bars(count: usize, step_minutes: i64, start_price: f64) -> Vec<Bar> {
    let start = ts(2024, 1, 1);
    (0..count)
        .map(|i| {
            let wiggle = if i % 3 == 0 { -1.5 } else { 1.0 };
            let close = start_price + i as f64 * 0.5 + wiggle;
            let mut bar = make_bar(start + Duration::minutes(step_minutes * i as i64), close, 10.0 + (i % 7) as f64);
            bar.trades = Some(3.0 + (i % 4) as f64);
            bar
        })
        .collect()
}

pub fn series(bars: Vec<Bar>) -> BarSeries {
    BarSeries::new(bars).unwrap()
}
