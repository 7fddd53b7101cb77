use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response};
use scraper::Html;

use super::endpoints::Endpoints;
use super::error::AuthError;
use crate::markup;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cookie jar that stops accepting `Set-Cookie` once frozen.
///
/// Login fills it; after that the cookies are part of the shared session
/// and responses to report requests must not change them.
#[derive(Default)]
pub(crate) struct SessionCookies {
    jar: Jar,
    frozen: AtomicBool,
}

impl SessionCookies {
    pub(crate) fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &url::Url) {
        if self.is_frozen() {
            tracing::debug!("Ignoring cookies set by {} on a shared session", url);
            return;
        }
        self.jar.set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &url::Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }
}

/// Authenticated context for one scheduler tick.
///
/// Holds the cookie-bearing client every request of the tick goes through,
/// plus the authenticity token scraped at login. Built by
/// [`crate::auth::establish`] and then shared read-only (behind an `Arc`)
/// with the report fetchers; nothing outside the `auth` module can change
/// the token after that. Never persisted: the next tick logs in from scratch.
pub struct Session {
    client: Client,
    cookies: Arc<SessionCookies>,
    endpoints: Endpoints,
    username: String,
    password: String,
    authenticity_token: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoints", &self.endpoints)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("authenticated", &self.authenticity_token.is_some())
            .field("cookies_frozen", &self.cookies.is_frozen())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a signed-out session with an empty cookie jar.
    pub fn new(site: &str, username: &str, password: &str) -> Result<Self, AuthError> {
        let cookies = Arc::new(SessionCookies::default());

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        let client = Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            cookies,
            endpoints: Endpoints::for_site(site),
            username: username.to_string(),
            password: password.to_string(),
            authenticity_token: None,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(super) fn password(&self) -> &str {
        &self.password
    }

    /// Token scraped from the login page, or `None` until login succeeded.
    pub fn authenticity_token(&self) -> Option<&str> {
        self.authenticity_token.as_deref()
    }

    /// Store the login token and stop accepting cookie changes.
    pub(super) fn complete_login(&mut self, token: String) {
        self.authenticity_token = Some(token);
        self.cookies.freeze();
    }

    /// Send a GET through the session's cookie jar.
    pub async fn get(&self, url: &str) -> reqwest::Result<Response> {
        tracing::debug!("GET {}", url);
        self.client.get(url).send().await
    }

    /// Submit a url-encoded form through the session's cookie jar.
    pub async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> reqwest::Result<Response> {
        tracing::debug!("POST {}", url);
        self.client.post(url).form(fields).send().await
    }

    /// Ask the site whether it still considers this session signed in.
    ///
    /// Loads the site root and looks for the signed-in marker; a session
    /// that never logged in reports `false` without touching the network.
    pub async fn is_logged_in(&self) -> reqwest::Result<bool> {
        if self.authenticity_token.is_none() {
            return Ok(false);
        }
        let body = self.get(&self.endpoints.home()).await?.text().await?;
        Ok(markup::is_logged_in(&Html::parse_document(&body)))
    }
}
