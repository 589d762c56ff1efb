//! Result cache port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::AlphaginiError;

/// Stores finished backtest results keyed by request fingerprint.
pub trait CachePort {
    fn get(&self, fingerprint: &str) -> Result<Option<BacktestResult>, AlphaginiError>;

    fn put(&self, fingerprint: &str, result: &BacktestResult) -> Result<(), AlphaginiError>;
}
