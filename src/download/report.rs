//! Export-and-download flow for ShopKeep reports.
//!
//! Each report is three requests on an already signed-in session: submit the
//! export form, scrape the generated file's address from the result page,
//! download it. The bytes are opaque and written to disk verbatim.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use scraper::Html;

use super::error::FetchError;
use super::file;
use crate::auth::{self, Session};
use crate::markup;

/// Date format of the `start_date`/`end_date` form fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const RETRIEVE_LABEL: &str = "Retrieve";

/// Reports the site can export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    SoldItems,
}

impl ReportKind {
    /// Every kind the orchestrator downloads on each tick.
    pub const ALL: &'static [ReportKind] = &[ReportKind::SoldItems];

    /// Site-relative target of the export form.
    pub fn export_path(self) -> &'static str {
        match self {
            ReportKind::SoldItems => "/sold_items/create_export",
        }
    }

    /// File name in the output directory.
    pub fn file_name(self) -> &'static str {
        match self {
            ReportKind::SoldItems => "sold_items.csv",
        }
    }

    /// Fields the export form requires even though they are left blank.
    fn blank_fields(self) -> &'static [&'static str] {
        match self {
            ReportKind::SoldItems => &["chart_requested", "grouped_by"],
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::SoldItems => f.write_str("sold items"),
        }
    }
}

/// Inclusive range of calendar days. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FetchError> {
        if start > end {
            return Err(FetchError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// `days` days back from `today`, both ends included.
    pub fn trailing_days(today: NaiveDate, days: u64) -> Self {
        let start = today
            .checked_sub_days(chrono::Days::new(days))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

/// One report to export and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub kind: ReportKind,
    pub range: DateRange,
    pub destination: PathBuf,
}

impl ReportRequest {
    pub fn new(kind: ReportKind, range: DateRange, destination: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            range,
            destination: destination.into(),
        }
    }

    /// Request writing to the kind's default file inside `directory`.
    pub fn in_directory(kind: ReportKind, range: DateRange, directory: &Path) -> Self {
        Self::new(kind, range, directory.join(kind.file_name()))
    }
}

/// A downloaded report, exactly as the site served it.
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    pub url: url::Url,
    pub bytes: Vec<u8>,
}

/// Export the requested report and write it to the request's destination.
///
/// The session is only read: a session that turns out to be signed out
/// fails with [`FetchError::SessionExpired`] instead of logging in again.
pub async fn fetch(session: &Session, request: &ReportRequest) -> Result<ReportArtifact, FetchError> {
    let token = session
        .authenticity_token()
        .ok_or(FetchError::NotAuthenticated)?;

    let still_logged_in = session
        .is_logged_in()
        .await
        .map_err(|source| FetchError::Unreachable {
            url: session.endpoints().home(),
            source,
        })?;
    if !still_logged_in {
        return Err(FetchError::SessionExpired);
    }

    let export_url = session.endpoints().page(request.kind.export_path());
    let start = request.range.start().format(DATE_FORMAT).to_string();
    let end = request.range.end().format(DATE_FORMAT).to_string();

    let mut fields: Vec<(&str, &str)> = vec![
        ("authenticity_token", token),
        ("utf8", auth::UTF8_MARKER),
        ("start_date", start.as_str()),
        ("end_date", end.as_str()),
    ];
    fields.extend(request.kind.blank_fields().iter().map(|name| (*name, "")));
    fields.push(("commit", RETRIEVE_LABEL));

    tracing::debug!(report = %request.kind, range = %request.range, "Requesting export");
    let response = session
        .post_form(&export_url, &fields)
        .await
        .map_err(|source| FetchError::Unreachable {
            url: export_url.clone(),
            source,
        })?;

    // Bad date ranges and lost sessions both surface here.
    if response.status() != reqwest::StatusCode::OK {
        return Err(FetchError::ExportRejected {
            url: export_url,
            status: response.status().as_u16(),
        });
    }

    let page = response
        .text()
        .await
        .map_err(|source| FetchError::MalformedPage {
            url: export_url.clone(),
            source,
        })?;
    let href = markup::report_file_url(&Html::parse_document(&page))
        .ok_or_else(|| FetchError::NoDownloadLink(export_url.clone()))?;
    let report_url = session
        .endpoints()
        .resolve(&href)
        .map_err(|source| FetchError::BadDownloadLink {
            url: export_url.clone(),
            href: href.clone(),
            source,
        })?;

    let bytes = match download_bytes(session, &report_url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            file::discard_report(&request.destination).await;
            return Err(e);
        }
    };

    if let Err(source) = file::write_report(&request.destination, &bytes).await {
        file::discard_report(&request.destination).await;
        return Err(FetchError::WriteFailed {
            path: request.destination.clone(),
            source,
        });
    }

    tracing::info!(
        report = %request.kind,
        range = %request.range,
        bytes = bytes.len(),
        path = %request.destination.display(),
        "Report saved"
    );
    Ok(ReportArtifact {
        url: report_url,
        bytes,
    })
}

async fn download_bytes(session: &Session, url: &url::Url) -> Result<Vec<u8>, FetchError> {
    let failed = |source: reqwest::Error| FetchError::DownloadFailed {
        url: url.to_string(),
        source,
    };
    let response = session
        .get(url.as_str())
        .await
        .and_then(|r| r.error_for_status())
        .map_err(failed)?;
    let bytes = response.bytes().await.map_err(failed)?;
    Ok(bytes.to_vec())
}
