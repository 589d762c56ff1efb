//! Domain error types.

/// Top-level error type for alphagini.
#[derive(Debug, thiserror::Error)]
pub enum AlphaginiError {
    #[error("invalid argument ({context}): {reason}")]
    InvalidArgument { context: String, reason: String },

    #[error("missing column '{field}' required by {mode} bars")]
    MissingColumn { field: String, mode: String },

    #[error("misaligned series: {what} ({left} vs {right} points)")]
    MisalignedSeries {
        what: String,
        left: usize,
        right: usize,
    },

    #[error("ambiguous sampling frequency: {reason}")]
    AmbiguousFrequency { reason: String },

    #[error("empty input: {what}")]
    EmptyInput { what: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("cache error: {reason}")]
    Cache { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure inside an external forecasting model.
///
/// Never surfaced to callers: forecasters recover by falling back to the
/// naive forecast.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("insufficient training data: have {have} points, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("singular fit: {reason}")]
    Singular { reason: String },

    #[error("model did not converge: {reason}")]
    NonConvergence { reason: String },
}

impl AlphaginiError {
    pub fn invalid(context: impl Into<String>, reason: impl Into<String>) -> Self {
        AlphaginiError::InvalidArgument {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn misaligned(what: impl Into<String>, left: usize, right: usize) -> Self {
        AlphaginiError::MisalignedSeries {
            what: what.into(),
            left,
            right,
        }
    }

    pub fn empty(what: impl Into<String>) -> Self {
        AlphaginiError::EmptyInput { what: what.into() }
    }
}

impl From<&AlphaginiError> for std::process::ExitCode {
    fn from(err: &AlphaginiError) -> Self {
        let code: u8 = match err {
            AlphaginiError::Io(_) => 1,
            AlphaginiError::ConfigParse { .. }
            | AlphaginiError::ConfigMissing { .. }
            | AlphaginiError::ConfigInvalid { .. } => 2,
            AlphaginiError::Data { .. } | AlphaginiError::EmptyInput { .. } => 3,
            AlphaginiError::InvalidArgument { .. } | AlphaginiError::MissingColumn { .. } => 4,
            AlphaginiError::MisalignedSeries { .. } | AlphaginiError::AmbiguousFrequency { .. } => {
                5
            }
            AlphaginiError::Cache { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
