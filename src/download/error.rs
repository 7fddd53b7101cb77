use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Ways a single report download can fail.
///
/// None of these are retried in place; the next scheduled tick is the retry.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Session is not logged in")]
    NotAuthenticated,

    #[error("Session is no longer logged in")]
    SessionExpired,

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Could not reach {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    ExportRejected { url: String, status: u16 },

    #[error("Could not read export results from {url}: {source}")]
    MalformedPage {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("No usable download link on the export page from {0}")]
    NoDownloadLink(String),

    #[error("Download link {href:?} on the export page from {url} is not a valid address: {source}")]
    BadDownloadLink {
        url: String,
        href: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to download report from {url}: {source}")]
    DownloadFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to write report to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether the failure means the session itself is unusable, as opposed
    /// to a problem with this one report.
    pub fn is_session_error(&self) -> bool {
        matches!(self, FetchError::NotAuthenticated | FetchError::SessionExpired)
    }
}
