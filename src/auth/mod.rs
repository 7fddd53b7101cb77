//! ShopKeep back-office login.
//!
//! The site has no API and answers the login form with 200 either way, so
//! the flow is driven entirely by page content:
//! login page → authenticity token → credential POST → signed-in marker.

pub mod endpoints;
pub mod error;
pub mod session;

use scraper::Html;

pub use self::error::AuthError;
pub use self::session::Session;
use crate::markup;

/// Fixed value of the `utf8` field Rails forms carry.
pub(crate) const UTF8_MARKER: &str = "✓";

const SIGN_IN_LABEL: &str = "Sign in";

/// Log in to `site` and return a session ready for report downloads.
///
/// Every request goes through the one cookie jar owned by the returned
/// session, so cookies set by the login page carry over to the login POST
/// and from there to every report request.
pub async fn establish(site: &str, username: &str, password: &str) -> Result<Session, AuthError> {
    let mut session = Session::new(site, username, password)?;
    login(&mut session).await?;
    Ok(session)
}

/// Run the login flow on a fresh session, storing the token on success.
async fn login(session: &mut Session) -> Result<(), AuthError> {
    let home = session.endpoints().home();
    let login_page = fetch_page(session, &home).await?;

    let token = markup::authenticity_token(&Html::parse_document(&login_page))
        .ok_or_else(|| AuthError::TokenNotFound(home.clone()))?;
    tracing::debug!("Found authenticity_token");

    let session_url = session.endpoints().session();
    let response = session
        .post_form(
            &session_url,
            &[
                ("authenticity_token", token.as_str()),
                ("utf8", UTF8_MARKER),
                ("login", session.username()),
                ("password", session.password()),
                ("commit", SIGN_IN_LABEL),
            ],
        )
        .await
        .map_err(|source| AuthError::Unreachable {
            url: session_url.clone(),
            source,
        })?;
    // Status says nothing about the outcome; only the page does.
    let status = response.status();
    let landing_page = response
        .text()
        .await
        .map_err(|source| AuthError::MalformedPage {
            url: session_url.clone(),
            source,
        })?;

    if !markup::is_logged_in(&Html::parse_document(&landing_page)) {
        tracing::debug!(%status, "Signed-in marker missing after login");
        return Err(AuthError::InvalidCredentials);
    }

    session.complete_login(token);
    tracing::info!(user = %session.username(), "Login successful");
    Ok(())
}

async fn fetch_page(session: &Session, url: &str) -> Result<String, AuthError> {
    let response = session
        .get(url)
        .await
        .map_err(|source| AuthError::Unreachable {
            url: url.to_string(),
            source,
        })?;
    response
        .text()
        .await
        .map_err(|source| AuthError::MalformedPage {
            url: url.to_string(),
            source,
        })
}
