//! Domain error types.

/// Top-level error type for rsitrend.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    InvalidConfig {
        section: String,
        key: String,
        reason: String,
    },

    #[error("insufficient data: have {bars} bars, need at least {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("data read error: {reason}")]
    DataRead { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::InvalidConfig {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::Report { .. } => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::InvalidConfig { .. } => 2,
            TraderError::DataRead { .. } => 4,
            TraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
