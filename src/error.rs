use thiserror::Error;

/// Hard validation failures. A row that fails with one of these is
/// excluded from the batch results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("`{field}` is out of range: {value} (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("`{field}` is not a valid number: `{value}`")]
    NotNumeric { field: &'static str, value: String },
}

/// A soft failure: the value was replaced by a default and the row kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{field}` value `{value}` is not recognized, using `{substituted}`")]
pub struct CoercionWarning {
    pub field: &'static str,
    pub value: String,
    pub substituted: &'static str,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model returned a non-finite value: {0}")]
    NonFinite(f64),
    #[error("model failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("prediction failed: {0}")]
    Prediction(String),
}

impl From<ModelError> for ScoringError {
    fn from(err: ModelError) -> Self {
        ScoringError::Prediction(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no export fields selected")]
    EmptySelection,
    #[error("unknown export field `{0}`")]
    UnknownField(String),
    #[error("failed to write export: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
