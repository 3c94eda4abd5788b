// src/scope/link.rs
// =============================================================================
// A Link is a normalized, absolute http(s) URL.
//
// Normalization rules:
// - relative references are resolved against the page they were found on
// - the fragment (#section) is dropped, it never changes what the server sends
// - an empty query ("?") is dropped
// - a trailing index document ("/docs/index.html") collapses to its
//   directory ("/docs/"), so both spellings are the same Link
//
// Two Links are equal iff their normalized strings are equal. Normalizing an
// already-normalized Link gives the same Link back.
// =============================================================================

use crate::error::UrlError;
use serde::Serialize;
use std::fmt;
use url::Url;

/// File name treated as the default document of a directory.
pub const DEFAULT_INDEX_DOCUMENT: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Link {
    url: Url,
}

impl Link {
    /// Parses an absolute URL using the default index document.
    pub fn new(raw: &str) -> Result<Self, UrlError> {
        Self::with_index(raw, DEFAULT_INDEX_DOCUMENT)
    }

    /// Parses an absolute URL, collapsing `index_document` onto its directory.
    pub fn with_index(raw: &str, index_document: &str) -> Result<Self, UrlError> {
        let url = Url::parse(raw.trim()).map_err(|e| UrlError::Malformed {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_url(url, index_document)
    }

    /// Resolves `href` (absolute or relative) against the page it was found on.
    ///
    /// Examples, with page = "https://example.com/docs/page.html":
    ///   "/about"            -> https://example.com/about
    ///   "../index.html"     -> https://example.com/
    ///   "intro.html#top"    -> https://example.com/docs/intro.html
    ///   "mailto:me@x.org"   -> Err(UnsupportedScheme)
    pub fn resolve(href: &str, page: &Link, index_document: &str) -> Result<Self, UrlError> {
        let url = page.url.join(href.trim()).map_err(|e| UrlError::Malformed {
            url: href.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_url(url, index_document)
    }

    fn from_url(mut url: Url, index_document: &str) -> Result<Self, UrlError> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(UrlError::UnsupportedScheme {
                    url: url.to_string(),
                    scheme: other.to_string(),
                })
            }
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(UrlError::Malformed {
                url: url.to_string(),
                reason: "missing host".to_string(),
            });
        }

        url.set_fragment(None);
        if url.query() == Some("") {
            url.set_query(None);
        }

        if !index_document.is_empty() {
            // Only a whole last segment counts: "/myindex.html" stays as is.
            let directory = url
                .path()
                .strip_suffix(index_document)
                .filter(|dir| dir.ends_with('/'))
                .map(str::to_string);
            if let Some(directory) = directory {
                url.set_path(&directory);
            }
        }

        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// True when both links carry the same query string (or both have none).
    pub fn has_same_query(&self, other: &Link) -> bool {
        self.query() == other.query()
    }

    /// Scheme, host and port all match.
    pub fn same_origin(&self, other: &Link) -> bool {
        self.url.origin() == other.url.origin()
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Link {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
