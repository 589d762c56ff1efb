//! Position models: turn prices (and optionally a forecast) into a long-only
//! exposure fraction per bar.
//!
//! Position `i` depends only on data at or before bar `i`; the simulator
//! applies it to the return realized after bar `i`. Rolling windows here are
//! undefined until full, and undefined regions resolve to flat (0.0).

use serde::{Deserialize, Serialize};

use super::error::AlphaginiError;
use super::rolling::{rolling_mean, shift_forward, WindowPolicy};

pub trait PositionModel: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, prices: &[f64], forecast: Option<&[f64]>)
        -> Result<Vec<f64>, AlphaginiError>;
}

/// Relative margin the fast mean must clear before it counts as above the
/// slow mean, so equal means differing only by rounding never signal.
const CROSS_TOLERANCE: f64 = 1e-12;

/// Moving-average trend filter: long while the fast mean is above the slow one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendFilter {
    pub fast: usize,
    pub slow: usize,
}

impl TrendFilter {
    pub fn validate(&self) -> Result<(), AlphaginiError> {
        if self.fast == 0 || self.slow == 0 {
            return Err(AlphaginiError::invalid(
                format!("trend filter fast={} slow={}", self.fast, self.slow),
                "windows must be at least 1",
            ));
        }
        if self.fast >= self.slow {
            return Err(AlphaginiError::invalid(
                format!("trend filter fast={} slow={}", self.fast, self.slow),
                "fast window must be shorter than slow window",
            ));
        }
        Ok(())
    }

    /// Trend indicator over the whole window, shifted one bar forward.
    pub fn signal(&self, prices: &[f64]) -> Vec<f64> {
        let fast = rolling_mean(prices, self.fast, WindowPolicy::Full);
        let slow = rolling_mean(prices, self.slow, WindowPolicy::Full);
        let raw: Vec<f64> = fast
            .iter()
            .zip(&slow)
            .map(|(f, s)| match (f, s) {
                (Some(f), Some(s)) if f - s > CROSS_TOLERANCE * s.abs().max(1.0) => 1.0,
                _ => 0.0,
            })
            .collect();
        shift_forward(&raw, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyKind {
    BuyHold,
    SmaCross(TrendFilter),
    /// Long while the forecast is above the current price, optionally
    /// gated by a trend filter.
    ForecastEdge { trend: Option<TrendFilter> },
}

impl StrategyKind {
    /// Resolve a strategy by its configuration name.
    ///
    /// `rsi_meanrev` is the trend-filtered forecast edge.
    pub fn from_name(name: &str, fast: usize, slow: usize) -> Result<Self, AlphaginiError> {
        let kind = match name.trim().to_lowercase().as_str() {
            "buy_hold" => StrategyKind::BuyHold,
            "sma_cross" => StrategyKind::SmaCross(TrendFilter { fast, slow }),
            "forecast_edge" => StrategyKind::ForecastEdge { trend: None },
            "rsi_meanrev" => StrategyKind::ForecastEdge {
                trend: Some(TrendFilter { fast, slow }),
            },
            other => {
                return Err(AlphaginiError::invalid(
                    "strategy",
                    format!("unknown strategy '{other}'"),
                ));
            }
        };
        kind.validate()?;
        Ok(kind)
    }

    pub fn validate(&self) -> Result<(), AlphaginiError> {
        match self {
            StrategyKind::BuyHold => Ok(()),
            StrategyKind::SmaCross(trend) => trend.validate(),
            StrategyKind::ForecastEdge { trend } => trend.as_ref().map_or(Ok(()), |t| t.validate()),
        }
    }

    pub fn uses_forecast(&self) -> bool {
        matches!(self, StrategyKind::ForecastEdge { .. })
    }
}

impl PositionModel for StrategyKind {
    fn name(&self) -> &str {
        match self {
            StrategyKind::BuyHold => "buy_hold",
            StrategyKind::SmaCross(_) => "sma_cross",
            StrategyKind::ForecastEdge { trend: None } => "forecast_edge",
            StrategyKind::ForecastEdge { trend: Some(_) } => "rsi_meanrev",
        }
    }

    fn generate(
        &self,
        prices: &[f64],
        forecast: Option<&[f64]>,
    ) -> Result<Vec<f64>, AlphaginiError> {
        match self {
            StrategyKind::BuyHold => Ok(vec![1.0; prices.len()]),
            StrategyKind::SmaCross(trend) => Ok(trend.signal(prices)),
            StrategyKind::ForecastEdge { trend } => {
                let forecast = forecast.ok_or_else(|| {
                    AlphaginiError::invalid(self.name(), "strategy requires a forecast series")
                })?;
                if forecast.len() != prices.len() {
                    return Err(AlphaginiError::misaligned(
                        "forecast vs price",
                        forecast.len(),
                        prices.len(),
                    ));
                }
                let mut positions: Vec<f64> = forecast
                    .iter()
                    .zip(prices)
                    .map(|(f, p)| if f > p { 1.0 } else { 0.0 })
                    .collect();
                if let Some(trend) = trend {
                    for (pos, t) in positions.iter_mut().zip(trend.signal(prices)) {
                        *pos *= t;
                    }
                }
                Ok(positions)
            }
        }
    }
}
