//! In-process stand-in for the ShopKeep back office.
//!
//! Mimics the behaviour the crate depends on: a login page with a hidden
//! token, a login endpoint that answers with the same status whether or not
//! the credentials were right, cookie-based sessions and the two-step
//! export/download flow.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use tokio::net::TcpListener;

pub const TOKEN: &str = "abc123";
pub const LOGIN: &str = "owner@example.com";
pub const PASSWORD: &str = "correct horse";
pub const REPORT: &[u8] = b"a,b,c\n1,2,3\n";

const VISITOR_COOKIE: &str = "_shopkeep_visitor=1";
const AUTH_COOKIE: &str = "_shopkeep_session=signed-in";
const ROTATED_COOKIE: &str = "_shopkeep_session=rotated";

/// Knobs for the misbehaviour a test wants to provoke.
#[derive(Debug, Clone)]
pub struct MockOptions {
    /// Leave the token input off the login page.
    pub omit_token: bool,
    /// Status of `POST /session`, for both accepted and rejected logins.
    pub login_status: StatusCode,
    /// Force a status on `POST /sold_items/create_export`.
    pub export_status: Option<StatusCode>,
    /// Leave the download button off the export page.
    pub omit_download_link: bool,
    /// Hand out a site-relative download link.
    pub relative_download_link: bool,
    /// Hand out exactly this download link.
    pub download_link: Option<String>,
    /// Status of the report download itself.
    pub download_status: StatusCode,
    /// Log the session out as soon as login succeeds.
    pub expire_after_login: bool,
    /// Replace the session cookie whenever a signed-in page or report is
    /// served after login. Requests carrying the replacement are treated as
    /// signed out.
    pub rotate_session_cookie: bool,
    pub report: Vec<u8>,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            omit_token: false,
            login_status: StatusCode::OK,
            export_status: None,
            omit_download_link: false,
            relative_download_link: false,
            download_link: None,
            download_status: StatusCode::OK,
            expire_after_login: false,
            rotate_session_cookie: false,
            report: REPORT.to_vec(),
        }
    }
}

#[derive(Debug)]
pub struct MockState {
    options: Mutex<MockOptions>,
    base: String,
    /// Form fields of every export submission, in arrival order.
    pub exports: Mutex<Vec<HashMap<String, String>>>,
    pub logins: AtomicUsize,
    pub downloads: AtomicUsize,
}

impl MockState {
    pub fn set_report(&self, report: &[u8]) {
        self.options.lock().unwrap().report = report.to_vec();
    }

    pub fn set_download_status(&self, status: StatusCode) {
        self.options.lock().unwrap().download_status = status;
    }

    pub fn export_count(&self) -> usize {
        self.exports.lock().unwrap().len()
    }

    fn options(&self) -> MockOptions {
        self.options.lock().unwrap().clone()
    }
}

pub struct MockSite {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockSite {
    pub async fn start() -> Self {
        Self::start_with(MockOptions::default()).await
    }

    pub async fn start_with(options: MockOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState {
            options: Mutex::new(options),
            base: format!("http://{}", addr),
            exports: Mutex::new(Vec::new()),
            logins: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/", get(home))
            .route("/session", post(login))
            .route("/sold_items/create_export", post(create_export))
            .route("/export/{file}", get(download))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        self.state.base.clone()
    }
}

fn has_cookie(headers: &HeaderMap, cookie: &str) -> bool {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .any(|c| c.trim() == cookie)
}

fn login_page(with_token: bool) -> String {
    let token = if with_token {
        format!(r#"<input name="authenticity_token" type="hidden" value="{}">"#, TOKEN)
    } else {
        String::new()
    };
    format!(
        r#"<html><body><form action="/session" method="post">
        <input name="utf8" type="hidden" value="&#x2713;">{}
        <input name="login" type="text"><input name="password" type="password">
        <input name="commit" type="submit" value="Sign in">
        </form></body></html>"#,
        token
    )
}

fn dashboard() -> String {
    format!(
        r#"<html><body><ul id="user-controls"><li>{}</li><li>Sign out</li></ul>
        <input name="authenticity_token" type="hidden" value="rotated-{}"></body></html>"#,
        LOGIN, TOKEN
    )
}

async fn home(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let options = state.options();
    if has_cookie(&headers, AUTH_COOKIE) && !options.expire_after_login {
        if options.rotate_session_cookie {
            return (
                [(header::SET_COOKIE, format!("{}; Path=/", ROTATED_COOKIE))],
                Html(dashboard()),
            )
                .into_response();
        }
        return Html(dashboard()).into_response();
    }
    (
        [(header::SET_COOKIE, format!("{}; Path=/", VISITOR_COOKIE))],
        Html(login_page(!options.omit_token)),
    )
        .into_response()
}

async fn login(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.logins.fetch_add(1, Ordering::SeqCst);
    let options = state.options();
    let field = |name: &str| form.get(name).map(String::as_str);

    let accepted = has_cookie(&headers, VISITOR_COOKIE)
        && field("authenticity_token") == Some(TOKEN)
        && field("utf8") == Some("✓")
        && field("commit") == Some("Sign in")
        && field("login") == Some(LOGIN)
        && field("password") == Some(PASSWORD);

    if accepted {
        (
            options.login_status,
            [(header::SET_COOKIE, format!("{}; Path=/", AUTH_COOKIE))],
            Html(dashboard()),
        )
            .into_response()
    } else {
        (options.login_status, Html(login_page(true))).into_response()
    }
}

async fn create_export(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let options = state.options();
    let signed_in = has_cookie(&headers, AUTH_COOKIE)
        && form.get("authenticity_token").map(String::as_str) == Some(TOKEN);
    let dates_ok = match (form.get("start_date"), form.get("end_date")) {
        (Some(start), Some(end)) => start <= end,
        _ => false,
    };
    state.exports.lock().unwrap().push(form);

    if let Some(status) = options.export_status {
        return (status, Html("<html><body>nope</body></html>")).into_response();
    }
    if !signed_in {
        return (StatusCode::UNAUTHORIZED, Html(login_page(true))).into_response();
    }
    if !dates_ok {
        return (StatusCode::UNPROCESSABLE_ENTITY, Html("<p>bad dates</p>")).into_response();
    }
    if options.omit_download_link {
        return Html("<html><body><p>Your report is being generated.</p></body></html>")
            .into_response();
    }

    let href = if let Some(link) = options.download_link {
        link
    } else if options.relative_download_link {
        "/export/42.csv".to_string()
    } else {
        format!("{}/export/42.csv", state.base)
    };
    Html(format!(
        r#"<html><body><div id="download_button">
        <input class="button" type="submit" value="Download" data_reportfile="{}">
        </div></body></html>"#,
        href
    ))
    .into_response()
}

async fn download(
    State(state): State<Arc<MockState>>,
    Path(_file): Path<String>,
) -> Response {
    state.downloads.fetch_add(1, Ordering::SeqCst);
    let options = state.options();
    if options.rotate_session_cookie {
        return (
            options.download_status,
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::SET_COOKIE, format!("{}; Path=/", ROTATED_COOKIE)),
            ],
            options.report,
        )
            .into_response();
    }
    (
        options.download_status,
        [(header::CONTENT_TYPE, "text/csv")],
        options.report,
    )
        .into_response()
}
