//! CSV file data adapter.
//!
//! Columns are matched by header name, case-insensitively. Required:
//! a timestamp (`ts`, `timestamp`, `time`, `date` or `open_time`), `open`,
//! `high`, `low`, `close`, `volume`. Optional: `trades` (or `num_trades`),
//! `vwap` and `symbol`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::bars::AggregatedBar;
use crate::domain::error::AlphaginiError;
use crate::domain::ohlcv::{Bar, BarSeries};
use crate::domain::timeframe::parse_timestamp;
use crate::ports::data_port::DataPort;

const TS_COLUMNS: &[&str] = &["ts", "timestamp", "time", "date", "open_time"];
const TRADES_COLUMNS: &[&str] = &["trades", "num_trades"];

pub struct CsvAdapter {
    path: PathBuf,
}

struct Columns {
    ts: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    trades: Option<usize>,
    vwap: Option<usize>,
    symbol: Option<usize>,
}

struct Row {
    symbol: Option<String>,
    bar: Bar,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn data_error(&self, reason: impl std::fmt::Display) -> AlphaginiError {
        AlphaginiError::Data {
            reason: format!("{}: {}", self.path.display(), reason),
        }
    }

    fn resolve_columns(&self, headers: &csv::StringRecord) -> Result<Columns, AlphaginiError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let require = |name: &str| {
            find(&[name]).ok_or_else(|| self.data_error(format!("missing {name} column")))
        };

        Ok(Columns {
            ts: find(TS_COLUMNS).ok_or_else(|| self.data_error("missing timestamp column"))?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: require("volume")?,
            trades: find(TRADES_COLUMNS),
            vwap: find(&["vwap"]),
            symbol: find(&["symbol"]),
        })
    }

    fn read_rows(&self) -> Result<Vec<Row>, AlphaginiError> {
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| self.data_error(e))?;
        let headers = rdr.headers().map_err(|e| self.data_error(e))?.clone();
        let cols = self.resolve_columns(&headers)?;

        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.data_error(format!("CSV parse error: {e}")))?;
            let field = |idx: usize, name: &str| {
                record
                    .get(idx)
                    .map(str::trim)
                    .ok_or_else(|| self.data_error(format!("row {}: missing {name}", line + 1)))
            };
            let number = |idx: usize, name: &str| -> Result<f64, AlphaginiError> {
                let raw = field(idx, name)?;
                raw.parse::<f64>().map_err(|_| {
                    self.data_error(format!("row {}: invalid {name} value '{raw}'", line + 1))
                })
            };
            let optional = |idx: Option<usize>, name: &str| -> Result<Option<f64>, AlphaginiError> {
                match idx {
                    Some(i) if !field(i, name)?.is_empty() => number(i, name).map(Some),
                    _ => Ok(None),
                }
            };

            let ts = parse_timestamp(field(cols.ts, "timestamp")?)
                .map_err(|e| self.data_error(format!("row {}: {e}", line + 1)))?;
            let bar = Bar {
                ts,
                open: number(cols.open, "open")?,
                high: number(cols.high, "high")?,
                low: number(cols.low, "low")?,
                close: number(cols.close, "close")?,
                volume: number(cols.volume, "volume")?,
                trades: optional(cols.trades, "trades")?,
                vwap: optional(cols.vwap, "vwap")?,
            };
            let symbol = cols
                .symbol
                .map(|i| field(i, "symbol").map(str::to_string))
                .transpose()?;
            rows.push(Row { symbol, bar });
        }
        Ok(rows)
    }

    fn select(&self, symbol: Option<&str>) -> Result<Vec<Bar>, AlphaginiError> {
        let mut bars: Vec<Bar> = self
            .read_rows()?
            .into_iter()
            .filter(|row| match (symbol, &row.symbol) {
                (Some(wanted), Some(have)) => wanted == have,
                _ => true,
            })
            .map(|row| row.bar)
            .collect();
        bars.sort_by_key(|b| b.ts);
        Ok(bars)
    }

    /// Write threshold bars with their source-bar counts.
    pub fn write_bars<P: AsRef<Path>>(path: P, bars: &[AggregatedBar]) -> Result<(), AlphaginiError> {
        #[derive(Serialize)]
        struct OutRow {
            ts: String,
            open: f64,
            high: f64,
            low: f64,
            close: f64,
            volume: f64,
            trades: Option<f64>,
            vwap: Option<f64>,
            n_src_bars: usize,
        }

        let path = path.as_ref();
        let csv_error = |e: csv::Error| AlphaginiError::Data {
            reason: format!("{}: {e}", path.display()),
        };
        let mut wtr = csv::Writer::from_path(path).map_err(csv_error)?;
        for agg in bars {
            let b = &agg.bar;
            wtr.serialize(OutRow {
                ts: b.ts.to_rfc3339(),
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                volume: b.volume,
                trades: b.trades,
                vwap: b.vwap,
                n_src_bars: agg.source_bars(),
            })
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: Option<&str>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<BarSeries, AlphaginiError> {
        let bars: Vec<Bar> = self
            .select(symbol)?
            .into_iter()
            .filter(|b| start.is_none_or(|s| b.ts >= s) && end.is_none_or(|e| b.ts < e))
            .collect();
        tracing::debug!(path = %self.path.display(), bars = bars.len(), "loaded csv bars");
        BarSeries::new(bars).map_err(|e| self.data_error(e))
    }

    fn source_id(&self) -> Option<String> {
        let path = std::fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        Some(format!("csv:{}", path.to_string_lossy()))
    }

    fn list_symbols(&self) -> Result<Vec<String>, AlphaginiError> {
        let mut symbols: Vec<String> = self
            .read_rows()?
            .into_iter()
            .filter_map(|row| row.symbol)
            .collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: Option<&str>,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, AlphaginiError> {
        let bars = self.select(symbol)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.ts, last.ts, bars.len())),
            _ => None,
        })
    }
}
