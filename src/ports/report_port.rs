//! Report generation port trait.

use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::AlphaginiError;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn render(&self, result: &BacktestResult) -> Result<String, AlphaginiError>;

    /// Default implementation: writes the rendered report to `output_path`.
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), AlphaginiError> {
        let rendered = self.render(result)?;
        std::fs::write(output_path, rendered)?;
        Ok(())
    }
}
