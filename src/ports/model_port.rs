//! External forecasting model port.

use crate::domain::error::ModelError;

/// A statistical model fitted on a training window that forecasts the next
/// `horizon` observations.
pub trait ModelPort: Send + Sync {
    fn name(&self) -> &str;

    fn fit_predict(&self, train: &[f64], horizon: usize) -> Result<Vec<f64>, ModelError>;
}
