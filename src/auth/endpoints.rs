/// URLs of the ShopKeep back-office pages the session talks to.
/// Everything hangs off the configured site address.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    /// Build endpoints for a site such as `https://shop.shopkeepapp.com`.
    /// A trailing slash on the site is ignored.
    pub fn for_site(site: &str) -> Self {
        Self {
            base: site.trim_end_matches('/').to_string(),
        }
    }

    /// Site root. Serves the login form when signed out and the dashboard
    /// when signed in.
    pub fn home(&self) -> String {
        format!("{}/", self.base)
    }

    /// Login form target.
    pub fn session(&self) -> String {
        format!("{}/session", self.base)
    }

    /// Absolute URL for a site-relative path such as `/sold_items/create_export`.
    pub fn page(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Resolve a link found in a page. Absolute links pass through unchanged.
    pub fn resolve(&self, href: &str) -> Result<url::Url, url::ParseError> {
        url::Url::parse(&self.home())?.join(href)
    }
}
