use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Errors surfaced by the pipeline.
///
/// Row-level problems (an unparseable date, a garbage numeric cell) never show
/// up here: they are absorbed during ingestion and counted in
/// [`LoadReport`](crate::data::loader::LoadReport).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source file could not be opened or read at all.
    #[error("source unavailable: {path}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported source extension: .{0}")]
    UnsupportedFormat(String),

    /// The file was readable but is not a usable table (bad workbook, missing
    /// date column, ...).
    #[error("malformed source {path}: {reason}")]
    MalformedSource { path: PathBuf, reason: String },

    /// Raised only under [`DuplicatePolicy::Reject`](crate::config::DuplicatePolicy::Reject).
    #[error("duplicate observation date {0}")]
    DuplicateTimestamp(NaiveDate),

    #[error("invalid year range {start}..={end}{}", observed_suffix(.observed))]
    Range {
        start: i32,
        end: i32,
        /// Observed year span of the dataset, when it has one.
        observed: Option<(i32, i32)>,
    },

    #[error("insufficient data for {context}: need at least {needed} points, found {found}")]
    InsufficientData {
        context: &'static str,
        needed: usize,
        found: usize,
    },

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn observed_suffix(observed: &Option<(i32, i32)>) -> String {
    match observed {
        Some((min, max)) => format!(" (observed years {min}..={max})"),
        None => " (dataset is empty)".to_string(),
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

impl PipelineError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::MalformedSource {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error is a typed "undefined result" rather than a failure.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, PipelineError::InsufficientData { .. })
    }
}
