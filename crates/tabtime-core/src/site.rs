//! Site keys: the ledger's aggregation key.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// URL schemes that belong to the browser itself rather than to a website.
pub const INTERNAL_SCHEMES: &[&str] = &[
    "about",
    "blob",
    "brave",
    "chrome",
    "chrome-extension",
    "chrome-search",
    "chrome-untrusted",
    "data",
    "devtools",
    "edge",
    "file",
    "javascript",
    "moz-extension",
    "opera",
    "view-source",
    "vivaldi",
];

/// Normalized host name of a page, e.g. `github.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteKey(String);

impl SiteKey {
    /// Wraps an already-normalized key.
    ///
    /// Use [`site_key_for`] to derive one from a URL.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SiteKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SiteKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns true for browser-internal pages (settings, new tab, extensions...).
///
/// Unparsable URLs count as internal: there is nothing to attribute them to.
pub fn is_internal_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => INTERNAL_SCHEMES.contains(&url.scheme()),
        Err(_) => true,
    }
}

/// Derives the site key for a URL.
///
/// Returns `None` for internal pages and URLs without a host. The key is the
/// lower-cased host with one leading `www.` removed.
pub fn site_key_for(raw: &str) -> Option<SiteKey> {
    let url = Url::parse(raw).ok()?;
    if INTERNAL_SCHEMES.contains(&url.scheme()) {
        return None;
    }

    let host = url.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        return None;
    }
    Some(SiteKey(host.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_key_strips_path_and_www() {
        assert_eq!(
            site_key_for("https://www.GitHub.com/rust-lang/rust?tab=readme"),
            Some(SiteKey::new("github.com"))
        );
        assert_eq!(
            site_key_for("http://news.ycombinator.com:8080/item?id=1"),
            Some(SiteKey::new("news.ycombinator.com"))
        );
    }

    #[test]
    fn test_internal_pages_have_no_key() {
        for url in [
            "chrome://newtab/",
            "chrome-extension://abcdef/popup.html",
            "about:blank",
            "edge://settings",
            "moz-extension://1234/options.html",
            "view-source:https://example.com",
            "file:///home/user/notes.txt",
            "data:text/html,hello",
        ] {
            assert!(is_internal_url(url), "{url} should be internal");
            assert_eq!(site_key_for(url), None, "{url} should have no site key");
        }
    }

    #[test]
    fn test_garbage_is_not_trackable() {
        assert!(is_internal_url("not a url"));
        assert_eq!(site_key_for(""), None);
    }

    #[test]
    fn test_regular_pages_are_not_internal() {
        assert!(!is_internal_url("https://example.com"));
        assert!(!is_internal_url("http://localhost:3000/"));
        assert_eq!(site_key_for("http://localhost:3000/"), Some(SiteKey::new("localhost")));
    }
}
