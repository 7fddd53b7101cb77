//! Report refresh: one login, then every report downloaded concurrently on
//! that session. A failing report never affects its siblings; only a failed
//! login fails the whole refresh.

pub mod error;
pub mod file;
pub mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tokio::task::JoinSet;

use crate::auth::{self, AuthError, Session};
pub use self::report::{DateRange, ReportKind, ReportRequest};

/// Days before today included in each report.
pub const REPORT_WINDOW_DAYS: u64 = 7;

/// Subset of application config consumed by a refresh.
#[derive(Clone)]
pub struct DownloadConfig {
    pub(crate) site: String,
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) directory: PathBuf,
}

impl std::fmt::Debug for DownloadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadConfig")
            .field("site", &self.site)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("directory", &self.directory)
            .finish()
    }
}

/// Outcome counts of one refresh.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub saved: usize,
    pub failed: usize,
}

/// Requests for every known report over the trailing week ending `today`.
pub fn build_requests(directory: &Path, today: NaiveDate) -> Vec<ReportRequest> {
    let range = DateRange::trailing_days(today, REPORT_WINDOW_DAYS);
    ReportKind::ALL
        .iter()
        .map(|&kind| ReportRequest::in_directory(kind, range, directory))
        .collect()
}

/// Log in and download every report for the week ending `today`.
///
/// Returns an error only when the login fails; per-report failures are
/// logged and counted in the summary.
pub async fn run_once(config: &DownloadConfig, today: NaiveDate) -> Result<RefreshSummary, AuthError> {
    let session = auth::establish(&config.site, &config.username, &config.password).await?;
    let requests = build_requests(&config.directory, today);
    Ok(fetch_all(Arc::new(session), requests).await)
}

/// Run every request as its own task on the shared session and wait for all
/// of them, whatever their outcome.
pub async fn fetch_all(session: Arc<Session>, requests: Vec<ReportRequest>) -> RefreshSummary {
    let mut tasks = JoinSet::new();
    for request in requests {
        let session = Arc::clone(&session);
        tasks.spawn(async move {
            let result = report::fetch(&session, &request).await;
            (request, result)
        });
    }

    let mut summary = RefreshSummary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((request, Ok(artifact))) => {
                summary.saved += 1;
                tracing::debug!(
                    report = %request.kind,
                    url = %artifact.url,
                    bytes = artifact.bytes.len(),
                    "Report task finished"
                );
            }
            Ok((request, Err(e))) => {
                summary.failed += 1;
                tracing::warn!(
                    report = %request.kind,
                    path = %request.destination.display(),
                    "Failed to download {} report: {}",
                    request.kind,
                    e
                );
                if e.is_session_error() {
                    tracing::info!("Session lost mid-update; the next update logs in again");
                }
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!("Report task did not finish: {}", e);
            }
        }
    }
    summary
}

/// One scheduled refresh with its outcome logged. Never fails: a bad tick
/// must not stop the ones after it.
pub async fn update(config: &DownloadConfig) {
    tracing::info!("Updating...");
    match run_once(config, Local::now().date_naive()).await {
        Ok(summary) if summary.failed == 0 => {
            tracing::info!(saved = summary.saved, "Reports updated");
        }
        Ok(summary) => {
            tracing::warn!(
                saved = summary.saved,
                failed = summary.failed,
                "Reports partially updated"
            );
        }
        Err(e) => {
            tracing::error!("Update failed, will retry next interval: {}", e);
        }
    }
}
