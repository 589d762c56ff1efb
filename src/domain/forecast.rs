//! Price forecasters.
//!
//! A forecaster sees the training window and the realized test window and
//! returns one forecast per test point. Forecast `j` may only use prices up
//! to and including test point `j`. Built-in forecasters are variants of
//! [`ForecasterKind`]; external statistical models plug in through
//! [`ModelPort`] wrapped in a [`FallbackForecaster`].

use serde::{Deserialize, Serialize};

use super::error::AlphaginiError;
use super::rolling::{rolling_mean, WindowPolicy};
use crate::ports::model_port::ModelPort;

pub trait Forecaster: Send + Sync {
    fn name(&self) -> &str;

    /// Forecast aligned 1:1 with `test`. Never fails: implementations that
    /// can break internally degrade to the naive forecast.
    fn fit_predict(&self, train: &[f64], test: &[f64]) -> Vec<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ForecasterKind {
    /// forecast(t) = price(t - 1)
    Naive,
    /// forecast(t) = mean of the last `window` prices ending at t,
    /// shrinking at the start of the series.
    Sma { window: usize },
}

impl ForecasterKind {
    pub fn validate(&self) -> Result<(), AlphaginiError> {
        match self {
            ForecasterKind::Naive => Ok(()),
            ForecasterKind::Sma { window } if *window == 0 => Err(AlphaginiError::invalid(
                "sma forecaster",
                "window must be at least 1",
            )),
            ForecasterKind::Sma { .. } => Ok(()),
        }
    }
}

impl Forecaster for ForecasterKind {
    fn name(&self) -> &str {
        match self {
            ForecasterKind::Naive => "naive",
            ForecasterKind::Sma { .. } => "sma",
        }
    }

    fn fit_predict(&self, train: &[f64], test: &[f64]) -> Vec<f64> {
        match self {
            ForecasterKind::Naive => naive_forecast(train, test),
            ForecasterKind::Sma { window } => sma_forecast(train, test, *window),
        }
    }
}

/// Previous observed price; the first point of the whole series forecasts itself.
pub fn naive_forecast(train: &[f64], test: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(test.len());
    let mut prev = train.last().or(test.first()).copied();
    for &price in test {
        out.push(prev.unwrap_or(price));
        prev = Some(price);
    }
    out
}

fn sma_forecast(train: &[f64], test: &[f64], window: usize) -> Vec<f64> {
    let full: Vec<f64> = train.iter().chain(test).copied().collect();
    rolling_mean(&full, window, WindowPolicy::Shrinking)
        .into_iter()
        .skip(train.len())
        .map(|v| v.unwrap_or(f64::NAN))
        .collect()
}

/// Runs an external model and falls back to the naive forecast when the
/// model fails or returns an unusable forecast.
pub struct FallbackForecaster<M> {
    model: M,
}

impl<M: ModelPort> FallbackForecaster<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

impl<M: ModelPort> Forecaster for FallbackForecaster<M> {
    fn name(&self) -> &str {
        self.model.name()
    }

    fn fit_predict(&self, train: &[f64], test: &[f64]) -> Vec<f64> {
        match self.model.fit_predict(train, test.len()) {
            Ok(forecast)
                if forecast.len() == test.len() && forecast.iter().all(|v| v.is_finite()) =>
            {
                forecast
            }
            Ok(forecast) => {
                tracing::warn!(
                    model = self.model.name(),
                    expected = test.len(),
                    got = forecast.len(),
                    "unusable forecast, falling back to naive"
                );
                naive_forecast(train, test)
            }
            Err(err) => {
                tracing::warn!(
                    model = self.model.name(),
                    error = %err,
                    "model failed, falling back to naive"
                );
                naive_forecast(train, test)
            }
        }
    }
}
