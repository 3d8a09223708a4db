use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while running a relclass experiment.
///
/// Every variant is fatal: the pipeline has no retry or partial-failure path.
#[derive(Debug, Error)]
pub enum RelclassError {
    /// A hyperparameter or config key is missing or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// A required environment variable is unset.
    #[error("environment variable {0} is not set")]
    Environment(&'static str),

    /// A dataset or word-vector line could not be parsed.
    #[error("{}:{line}: malformed line: {reason}", path.display())]
    DataFormat {
        /// File containing the bad line.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A label appeared that was never seen in the training file.
    #[error("{}:{line}: label {label:?} was not seen in training data", path.display())]
    UnknownLabel {
        /// File containing the label.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// The offending label.
        label: String,
    },

    /// Tensor dimensions disagree, or the numeric backend failed.
    #[error("shape error: {0}")]
    Shape(String),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<candle_core::Error> for RelclassError {
    fn from(err: candle_core::Error) -> Self {
        RelclassError::Shape(err.to_string())
    }
}

/// Result type alias for relclass operations.
pub type Result<T> = std::result::Result<T, RelclassError>;
