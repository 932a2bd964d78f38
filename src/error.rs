use thiserror::Error;

/// Errors raised by the dataset and scoring pipelines.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Reasons a single YOLO label line cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("expected at least 5 fields, found {0}")]
    TooFewFields(usize),

    #[error("class id {0:?} is not a non-negative integer")]
    InvalidClassId(String),

    #[error("coordinate {0:?} is not a number")]
    InvalidCoordinate(String),
}

pub type Result<T> = std::result::Result<T, Error>;
