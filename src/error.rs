//! Error taxonomy for a single pipeline run.
//!
//! Each variant names the stage that failed and the input it was working on,
//! so the binary can print the message as-is.

use std::path::PathBuf;
use thiserror::Error;

use crate::month::MonthKey;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    // === Resource Locator ===
    /// No link on the index page matched the month.
    #[error("locate: no download link for {month} found on {index_url}")]
    NotFound { month: MonthKey, index_url: String },

    /// More than one distinct link matched the month.
    #[error(
        "locate: {} download links for {month} found on {index_url}: {}",
        .candidates.len(),
        .candidates.join(", ")
    )]
    AmbiguousResult {
        month: MonthKey,
        index_url: String,
        candidates: Vec<String>,
    },

    // === Fetcher / Extractor ===
    #[error("fetch: {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("extract: {origin} is not a readable zip archive: {source}")]
    Format {
        origin: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("extract: {origin} has no entry matching `{pattern}`")]
    MissingEntry { origin: String, pattern: String },

    // === Aggregator / history parsing ===
    #[error("parse: {input}: {reason}")]
    Parse { input: String, reason: String },

    #[error(
        "aggregate: {bad} of {total} rows for {month} are unusable (limit {:.1}%)",
        .max_ratio * 100.0
    )]
    DataQuality {
        month: MonthKey,
        bad: usize,
        total: usize,
        max_ratio: f64,
    },

    // === Inputs & environment ===
    #[error("invalid month `{0}`: expected YYYY-MM")]
    InvalidMonth(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn fetch(url: impl ToString, reason: impl ToString) -> Self {
        Error::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
