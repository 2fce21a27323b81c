//! Error taxonomy for the preprocessing stages.
//!
//! Parsing-level problems (a label that cannot be read) are reported per
//! token and never abort a batch; structural problems (a channel-count
//! mismatch) abort only the transformation that hit them.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    /// A channel label has no `<electrode><index>` structure.
    #[error("malformed channel label: {label:?}")]
    MalformedLabel { label: String },

    /// The same `(electrode, index)` appears twice in one recording.
    #[error("duplicate contact: {label}")]
    DuplicateContact { label: String },

    /// Label count and signal row count disagree.
    #[error("inconsistent channel count: {labels} labels but {rows} signal rows")]
    InconsistentChannelCount { labels: usize, rows: usize },

    /// A clip starts at or past the end of the recording.
    #[error("insufficient signal: clip starts at sample {start} but only {available} samples are available")]
    InsufficientSignal { start: usize, available: usize },

    #[error("invalid window: {0}")]
    InvalidWindow(String),

    #[error("invalid time value: {0}")]
    InvalidTime(String),

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, PrepError>;
