//! OHLCV bar representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::AlphaginiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Number of trades in the interval, when the source provides it.
    pub trades: Option<f64>,
    pub vwap: Option<f64>,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn hlc3(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// (open + high + low + close) / 4
    pub fn ohlc4(&self) -> f64 {
        (self.open + self.high + self.low + self.close) / 4.0
    }

    fn check(&self) -> Result<(), String> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err("non-finite price".into());
        }
        if self.high < self.open.max(self.close) {
            return Err(format!("high {} below open/close", self.high));
        }
        if self.low > self.open.min(self.close) {
            return Err(format!("low {} above open/close", self.low));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(format!("volume {} must be a non-negative number", self.volume));
        }
        Ok(())
    }
}

/// Price used to weight volume when accumulating turnover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceBasis {
    Close,
    #[default]
    Hlc3,
    Ohlc4,
    Vwap,
}

impl PriceBasis {
    /// Price of `bar` under this basis, or `None` when the basis needs a
    /// field the bar lacks.
    pub fn price(&self, bar: &Bar) -> Option<f64> {
        match self {
            PriceBasis::Close => Some(bar.close),
            PriceBasis::Hlc3 => Some(bar.hlc3()),
            PriceBasis::Ohlc4 => Some(bar.ohlc4()),
            PriceBasis::Vwap => bar.vwap,
        }
    }
}

impl fmt::Display for PriceBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceBasis::Close => "close",
            PriceBasis::Hlc3 => "hlc3",
            PriceBasis::Ohlc4 => "ohlc4",
            PriceBasis::Vwap => "vwap",
        };
        f.write_str(name)
    }
}

impl FromStr for PriceBasis {
    type Err = AlphaginiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "close" => Ok(PriceBasis::Close),
            "hlc3" => Ok(PriceBasis::Hlc3),
            "ohlc4" => Ok(PriceBasis::Ohlc4),
            "vwap" => Ok(PriceBasis::Vwap),
            other => Err(AlphaginiError::invalid(
                "price_basis",
                format!("unknown price basis '{other}'"),
            )),
        }
    }
}

/// Ordered, validated sequence of bars with strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self, AlphaginiError> {
        for (i, bar) in bars.iter().enumerate() {
            bar.check().map_err(|reason| {
                AlphaginiError::invalid(format!("bar {i} at {}", bar.ts), reason)
            })?;
            if i > 0 && bar.ts <= bars[i - 1].ts {
                let reason = if bar.ts == bars[i - 1].ts {
                    "duplicate timestamp"
                } else {
                    "timestamps out of order"
                };
                return Err(AlphaginiError::invalid(
                    format!("bar {i} at {}", bar.ts),
                    reason,
                ));
            }
        }
        Ok(Self { bars })
    }

    pub fn empty() -> Self {
        Self { bars: Vec::new() }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.ts).collect()
    }

    /// Split at `index`: bars before it and bars from it onward.
    pub fn split_at(&self, index: usize) -> (BarSeries, BarSeries) {
        let index = index.min(self.bars.len());
        let (head, tail) = self.bars.split_at(index);
        (
            BarSeries {
                bars: head.to_vec(),
            },
            BarSeries {
                bars: tail.to_vec(),
            },
        )
    }
}
