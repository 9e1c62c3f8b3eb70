//! Domain error types.

/// Top-level error type for strattest.
#[derive(Debug, thiserror::Error)]
pub enum StratTestError {
    #[error("missing parameter '{key}' for strategy {strategy}")]
    MissingParameter { strategy: String, key: String },

    #[error("invalid parameter '{key}' for strategy {strategy}: {reason}")]
    InvalidParameter {
        strategy: String,
        key: String,
        reason: String,
    },

    #[error("unsupported strategy: {name}")]
    UnsupportedStrategy { name: String },

    #[error("unsupported indicator: {name}")]
    UnsupportedIndicator { name: String },

    #[error("unsupported execution timing: {name}")]
    UnsupportedTiming { name: String },

    #[error("invalid frequency '{value}': {reason}")]
    InvalidFrequency { value: String, reason: String },

    #[error("input is not strictly increasing at row {index}: {timestamp}")]
    UnorderedInput { index: usize, timestamp: String },

    #[error("stop-loss revision did not converge for trade opened at bar {start}")]
    StopLossDiverged { start: usize },

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

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StratTestError> for std::process::ExitCode {
    fn from(err: &StratTestError) -> Self {
        let code: u8 = match err {
            StratTestError::Io(_) | StratTestError::Report { .. } => 1,
            StratTestError::ConfigParse { .. }
            | StratTestError::ConfigMissing { .. }
            | StratTestError::ConfigInvalid { .. } => 2,
            StratTestError::Data { .. }
            | StratTestError::UnorderedInput { .. }
            | StratTestError::InvalidFrequency { .. } => 3,
            StratTestError::MissingParameter { .. }
            | StratTestError::InvalidParameter { .. }
            | StratTestError::UnsupportedStrategy { .. }
            | StratTestError::UnsupportedIndicator { .. }
            | StratTestError::UnsupportedTiming { .. } => 4,
            StratTestError::StopLossDiverged { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
