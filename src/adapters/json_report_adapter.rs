//! JSON report adapter: the full result, equity curve included.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::AlphaginiError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReportAdapter {
    pretty: bool,
}

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl ReportPort for JsonReportAdapter {
    fn render(&self, result: &BacktestResult) -> Result<String, AlphaginiError> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(result)
        } else {
            serde_json::to_string(result)
        };
        rendered.map_err(|e| AlphaginiError::Data {
            reason: format!("failed to serialize result: {e}"),
        })
    }
}
