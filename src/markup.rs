//! DOM predicates over ShopKeep back-office pages.
//!
//! The remote site has no API; every decision about session state is made by
//! looking for specific elements in the returned HTML. All of the selectors
//! the rest of the crate depends on live here, so a markup change on the
//! remote side is a one-file fix.

use std::sync::LazyLock;

use scraper::{Html, Selector};

/// Hidden anti-forgery input present on every form page.
static AUTHENTICITY_TOKEN: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"input[name="authenticity_token"]"#).expect("valid token selector")
});

/// Only rendered in the page chrome of a signed-in user.
static USER_CONTROLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#user-controls").expect("valid marker selector"));

/// Submit button on the export results page carrying the generated file URL.
static DOWNLOAD_BUTTON: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"#download_button input.button[type="submit"]"#)
        .expect("valid download selector")
});

const REPORT_FILE_ATTR: &str = "data_reportfile";

/// Value of the first `authenticity_token` input anywhere in the document.
///
/// Returns `None` when the input is missing or its value is empty; callers
/// treat both as "no token".
pub fn authenticity_token(doc: &Html) -> Option<String> {
    doc.select(&AUTHENTICITY_TOKEN)
        .next()
        .and_then(|input| input.value().attr("value"))
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Whether the page was rendered for an authenticated user.
///
/// The login endpoint answers 200 whether or not the credentials were
/// accepted and sends no redirect, so this marker is the only signal.
pub fn is_logged_in(doc: &Html) -> bool {
    doc.select(&USER_CONTROLS).next().is_some()
}

/// Download address of a generated report, as written in the export page.
///
/// May be relative; resolution against the site is the caller's job.
pub fn report_file_url(doc: &Html) -> Option<String> {
    doc.select(&DOWNLOAD_BUTTON)
        .find_map(|button| button.value().attr(REPORT_FILE_ATTR))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_owned)
}
