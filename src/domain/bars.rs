//! Threshold bars: volume, dollar and tick sampling.
//!
//! Consecutive source bars are folded into one output bar once the
//! accumulated volume, turnover (`price_basis * volume`) or trade count
//! reaches the threshold. The accumulator resets to zero after every
//! emitted bar; overshoot is not carried forward. An output bar is stamped
//! with the timestamp of the last source bar folded into it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use super::error::AlphaginiError;
use super::ohlcv::{Bar, BarSeries, PriceBasis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarMode {
    Volume,
    Dollar,
    Tick,
}

impl fmt::Display for BarMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BarMode::Volume => "volume",
            BarMode::Dollar => "dollar",
            BarMode::Tick => "tick",
        };
        f.write_str(name)
    }
}

impl FromStr for BarMode {
    type Err = AlphaginiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "volume" => Ok(BarMode::Volume),
            "dollar" => Ok(BarMode::Dollar),
            "tick" => Ok(BarMode::Tick),
            other => Err(AlphaginiError::invalid(
                "bar mode",
                format!("unknown bar mode '{other}'"),
            )),
        }
    }
}

/// What happens to a final run of source bars that never reached the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TailPolicy {
    #[default]
    Keep,
    Drop,
}

impl FromStr for TailPolicy {
    type Err = AlphaginiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" => Ok(TailPolicy::Keep),
            "drop" => Ok(TailPolicy::Drop),
            other => Err(AlphaginiError::invalid(
                "tail policy",
                format!("unknown tail policy '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSpec {
    pub mode: BarMode,
    pub threshold: f64,
    /// Only consulted in dollar mode.
    #[serde(default)]
    pub price_basis: PriceBasis,
    #[serde(default)]
    pub tail: TailPolicy,
}

impl BarSpec {
    pub fn new(mode: BarMode, threshold: f64) -> Self {
        BarSpec {
            mode,
            threshold,
            price_basis: PriceBasis::default(),
            tail: TailPolicy::default(),
        }
    }

    pub fn with_price_basis(mut self, price_basis: PriceBasis) -> Self {
        self.price_basis = price_basis;
        self
    }

    pub fn with_tail(mut self, tail: TailPolicy) -> Self {
        self.tail = tail;
        self
    }

    fn context(&self) -> String {
        format!("{} bars, threshold {}", self.mode, self.threshold)
    }

    pub fn validate(&self) -> Result<(), AlphaginiError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(AlphaginiError::invalid(
                self.context(),
                "threshold must be a positive number",
            ));
        }
        Ok(())
    }
}

/// One output bar together with the source bars it was folded from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedBar {
    pub bar: Bar,
    /// Half-open index range into the source series.
    pub source_range: Range<usize>,
    /// Accumulated volume/turnover/trades at the time the bar closed.
    pub accumulated: f64,
}

impl AggregatedBar {
    pub fn source_bars(&self) -> usize {
        self.source_range.len()
    }
}

/// Build threshold bars from a time-sampled series.
pub fn build(series: &BarSeries, spec: &BarSpec) -> Result<Vec<AggregatedBar>, AlphaginiError> {
    spec.validate()?;
    let weights = accumulation_weights(series.bars(), spec)?;

    let bars = series.bars();
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut acc = 0.0_f64;

    for (i, weight) in weights.iter().enumerate() {
        acc += weight;
        if acc >= spec.threshold {
            out.push(aggregate(bars, start..i + 1, acc));
            start = i + 1;
            acc = 0.0;
        }
    }

    if start < bars.len() {
        match spec.tail {
            TailPolicy::Keep => out.push(aggregate(bars, start..bars.len(), acc)),
            TailPolicy::Drop => tracing::debug!(
                mode = %spec.mode,
                dropped = bars.len() - start,
                "dropping under-threshold tail"
            ),
        }
    }

    tracing::debug!(
        mode = %spec.mode,
        threshold = spec.threshold,
        input = bars.len(),
        output = out.len(),
        "built threshold bars"
    );
    Ok(out)
}

/// Same as [`build`], returning only the output bars as a series.
pub fn build_series(series: &BarSeries, spec: &BarSpec) -> Result<BarSeries, AlphaginiError> {
    let aggregated = build(series, spec)?;
    BarSeries::new(aggregated.into_iter().map(|a| a.bar).collect())
}

fn accumulation_weights(bars: &[Bar], spec: &BarSpec) -> Result<Vec<f64>, AlphaginiError> {
    let mut weights = Vec::with_capacity(bars.len());
    for bar in bars {
        let weight = match spec.mode {
            BarMode::Volume => bar.volume,
            BarMode::Dollar => {
                let price = spec.price_basis.price(bar).ok_or_else(|| {
                    AlphaginiError::MissingColumn {
                        field: spec.price_basis.to_string(),
                        mode: spec.mode.to_string(),
                    }
                })?;
                price * bar.volume
            }
            BarMode::Tick => bar.trades.ok_or_else(|| AlphaginiError::MissingColumn {
                field: "trades".into(),
                mode: spec.mode.to_string(),
            })?,
        };
        if !weight.is_finite() || weight < 0.0 {
            return Err(AlphaginiError::invalid(
                spec.context(),
                format!("bar at {} contributes {weight}, expected a non-negative number", bar.ts),
            ));
        }
        weights.push(weight);
    }
    Ok(weights)
}

fn aggregate(bars: &[Bar], range: Range<usize>, accumulated: f64) -> AggregatedBar {
    let run = &bars[range.clone()];
    let first = &run[0];
    let last = &run[run.len() - 1];

    let high = run.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = run.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let volume: f64 = run.iter().map(|b| b.volume).sum();

    let trades = run.iter().map(|b| b.trades).sum::<Option<f64>>();

    let vwap = run.iter().map(|b| b.vwap).sum::<Option<f64>>().map(|vwap_sum| {
        if volume > 0.0 {
            let notional: f64 = run
                .iter()
                .filter_map(|b| b.vwap.map(|v| v * b.volume))
                .sum();
            notional / volume
        } else {
            vwap_sum / run.len() as f64
        }
    });

    AggregatedBar {
        bar: Bar {
            ts: last.ts,
            open: first.open,
            high,
            low,
            close: last.close,
            volume,
            trades,
            vwap,
        },
        source_range: range,
        accumulated,
    }
}
