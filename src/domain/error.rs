//! Domain error types.

/// A parse error with position information for condition parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!("{input}\n{caret}\n{err}", err = self)
    }
}

/// Failures of the ordinal <-> combination mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchSpaceError {
    #[error("{n} conditions exceed the encodable maximum of {max}")]
    TooManyConditions { n: usize, max: usize },

    #[error("ordinal {ordinal} is out of range (size {size})")]
    OrdinalOutOfRange { ordinal: u64, size: u64 },

    #[error("invalid combination: {reason}")]
    InvalidCombination { reason: String },
}

/// Top-level error type for combitrader.
#[derive(Debug, thiserror::Error)]
pub enum CombitraderError {
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

    #[error(transparent)]
    ConditionParse(#[from] ParseError),

    #[error("search space: {0}")]
    SearchSpace(#[from] SearchSpaceError),

    #[error("no data for {code}: {reason}")]
    NoData { code: String, reason: String },

    #[error("insufficient data for {code}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error("cache error: {reason}")]
    Cache { reason: String },

    #[error("trade log error: {reason}")]
    TradeLog { reason: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&CombitraderError> for std::process::ExitCode {
    fn from(err: &CombitraderError) -> Self {
        let code: u8 = match err {
            CombitraderError::Io(_) | CombitraderError::Serialization(_) => 1,
            CombitraderError::ConfigParse { .. }
            | CombitraderError::ConfigMissing { .. }
            | CombitraderError::ConfigInvalid { .. } => 2,
            CombitraderError::Cache { .. } | CombitraderError::TradeLog { .. } => 3,
            CombitraderError::ConditionParse(_) | CombitraderError::SearchSpace(_) => 4,
            CombitraderError::NoData { .. } | CombitraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
