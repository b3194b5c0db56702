use std::path::PathBuf;
use thiserror::Error;

/// A trained artifact could not be produced. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact `{name}` not found at {}", path.display())]
    NotFound { name: String, path: PathBuf },

    #[error("artifact `{name}` is malformed: {reason}")]
    Malformed { name: String, reason: String },

    #[error("fetching artifact `{name}` failed: {reason}")]
    Fetch { name: String, reason: String },

    #[error("checksum mismatch for `{name}`: expected {expected}, got {actual}")]
    Checksum {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("artifacts are inconsistent: {0}")]
    Inconsistent(String),
}

impl ArtifactError {
    pub fn malformed(name: &str, reason: impl ToString) -> Self {
        Self::Malformed {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn fetch(name: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Failure reported by a scoring backend.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("feature length mismatch: got {got}, expected {expected}")]
    Shape { got: usize, expected: usize },

    #[error("model produced a non-finite prediction")]
    NonFinite,

    #[error("model backend error: {0}")]
    Backend(String),
}

/// Per-request failure. Never takes the server down.
#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    #[error("`{field}` = {value} is outside the accepted range {range}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: String,
    },

    #[error("unknown weather description `{0}`")]
    UnknownCategory(String),

    /// The aligned vector did not fit the model. Points at an artifact
    /// version mismatch, not at the caller's input.
    #[error("internal alignment error: {0}")]
    InternalAlignment(String),
}

impl PredictError {
    /// Stable tag used in logs and JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "out_of_range",
            Self::UnknownCategory(_) => "unknown_category",
            Self::InternalAlignment(_) => "internal_alignment",
        }
    }

    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::InternalAlignment(_))
    }
}

impl From<ModelError> for PredictError {
    fn from(e: ModelError) -> Self {
        Self::InternalAlignment(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}
