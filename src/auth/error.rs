use thiserror::Error;

/// Ways establishing a ShopKeep session can fail.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Could not reach {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Could not read page from {url}: {source}")]
    MalformedPage {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("No authenticity_token found on {0}")]
    TokenNotFound(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
