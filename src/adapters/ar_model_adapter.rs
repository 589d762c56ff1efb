//! First-order autoregressive model fitted by ordinary least squares.
//!
//! `p[t] = c + phi * p[t-1]`, iterated forward from the last training price.

use crate::domain::error::ModelError;
use crate::ports::model_port::ModelPort;

/// Fewest training points that give a determined fit (three lagged pairs).
const MIN_TRAIN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArFit {
    pub intercept: f64,
    pub phi: f64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Ar1Model;

impl Ar1Model {
    pub fn new() -> Self {
        Ar1Model
    }

    pub fn fit(&self, train: &[f64]) -> Result<ArFit, ModelError> {
        if train.len() < MIN_TRAIN {
            return Err(ModelError::InsufficientData {
                have: train.len(),
                need: MIN_TRAIN,
            });
        }
        if train.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonConvergence {
                reason: "training window contains non-finite prices".into(),
            });
        }

        let xs = &train[..train.len() - 1];
        let ys = &train[1..];
        let n = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;

        let (mut sxx, mut sxy) = (0.0, 0.0);
        for (x, y) in xs.iter().zip(ys) {
            sxx += (x - mean_x) * (x - mean_x);
            sxy += (x - mean_x) * (y - mean_y);
        }
        if sxx <= f64::EPSILON * mean_x.abs().max(1.0) {
            return Err(ModelError::Singular {
                reason: "lagged prices have no variance".into(),
            });
        }

        let phi = sxy / sxx;
        let intercept = mean_y - phi * mean_x;
        if !phi.is_finite() || !intercept.is_finite() {
            return Err(ModelError::NonConvergence {
                reason: format!("coefficients not finite (c={intercept}, phi={phi})"),
            });
        }
        Ok(ArFit { intercept, phi })
    }
}

impl ModelPort for Ar1Model {
    fn name(&self) -> &str {
        "ar1"
    }

    fn fit_predict(&self, train: &[f64], horizon: usize) -> Result<Vec<f64>, ModelError> {
        let fit = self.fit(train)?;
        tracing::debug!(c = fit.intercept, phi = fit.phi, horizon, "fitted ar1");

        let mut last = train[train.len() - 1];
        let mut out = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            last = fit.intercept + fit.phi * last;
            out.push(last);
        }
        Ok(out)
    }
}
