// src/scope/base.rs
// =============================================================================
// BaseUrl: the starting point of a crawl and the boundary of the site.
//
// The base path is the "directory" of the starting URL:
//   https://example.org                   -> ""          (root, everything)
//   https://example.org/docs/             -> "/docs/"
//   https://example.org/docs/sample.html  -> "/docs/"
//   https://example.org/docs/sample.html/ -> "/docs/sample.html/"
//
// A link is within the site when it has the same origin (scheme, host, port)
// and its path sits at or below the base path. The check works on whole path
// segments, so "/docs/" never contains "/docs-archive/".
// =============================================================================

use super::link::{Link, DEFAULT_INDEX_DOCUMENT};
use crate::error::{CrawlError, UrlError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    link: Link,
    base_path: String,
}

impl BaseUrl {
    pub fn new(raw: &str) -> Result<Self, CrawlError> {
        Self::with_index(raw, DEFAULT_INDEX_DOCUMENT)
    }

    /// Parses the starting URL. Anything that is not an absolute http(s) URL
    /// is an `InvalidBaseUrl` error: the crawl cannot begin without it.
    pub fn with_index(raw: &str, index_document: &str) -> Result<Self, CrawlError> {
        let link = Link::with_index(raw, index_document).map_err(|e| {
            let reason = match e {
                UrlError::Malformed { reason, .. } => reason,
                UrlError::UnsupportedScheme { scheme, .. } => {
                    format!("unsupported scheme '{}'", scheme)
                }
            };
            CrawlError::InvalidBaseUrl {
                url: raw.to_string(),
                reason,
            }
        })?;
        Ok(Self::from_link(link))
    }

    pub fn from_link(link: Link) -> Self {
        let base_path = directory_of(link.path());
        Self { link, base_path }
    }

    /// The normalized starting link.
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Always ends in '/' or is empty (site root).
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn same_origin(&self, link: &Link) -> bool {
        self.link.same_origin(link)
    }

    /// Same origin and at or below the base path. Query strings are ignored.
    pub fn within(&self, link: &Link) -> bool {
        self.same_origin(link) && path_within(&self.base_path, link.path())
    }
}

// Strips the last path segment (the "file name").
fn directory_of(path: &str) -> String {
    let directory = match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "",
    };

    if directory == "/" {
        String::new()
    } else {
        directory.to_string()
    }
}

// `base_path` ends in '/', so a plain prefix test already stops at a segment
// boundary. "/docs" (the directory without its slash) also counts as inside
// "/docs/".
fn path_within(base_path: &str, path: &str) -> bool {
    base_path.is_empty() || path.starts_with(base_path) || path == base_path.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(raw: &str) -> BaseUrl {
        BaseUrl::new(raw).unwrap()
    }

    fn link(raw: &str) -> Link {
        Link::new(raw).unwrap()
    }

    #[test]
    fn test_base_path() {
        let cases = [
            ("https://example.org", ""),
            ("https://example.org/", ""),
            ("https://example.org/docs/", "/docs/"),
            ("https://example.org/docs/sample.html", "/docs/"),
            ("https://example.org/docs/sample.html/", "/docs/sample.html/"),
            ("https://example.org/docs", ""),
        ];
        for (url, path) in cases {
            assert_eq!(base(url).base_path(), path, "base path of {}", url);
        }
    }

    #[test]
    fn test_within_is_symmetric_for_equivalent_pages() {
        let cases = [
            ("https://example.org/", "https://example.org/index.html"),
            ("https://example.org/docs/", "https://example.org/docs/"),
            ("https://example.org/docs/", "https://example.org/docs/index.html"),
            ("https://example.org/docs/example.html", "https://example.org/docs/index.html"),
            ("https://example.org/docs/example.html", "https://example.org/docs/"),
        ];
        for (url, internal) in cases {
            assert!(base(url).within(&link(internal)), "{} should contain {}", url, internal);
            assert!(base(internal).within(&link(url)), "{} should contain {}", internal, url);
        }
    }

    #[test]
    fn test_shallower_link_is_not_within() {
        let cases = [
            ("https://example.org/docs/", "https://example.org/index.html"),
            ("https://example.org/docs/samples/simple.html", "https://example.org/index.html"),
        ];
        for (url, shallow) in cases {
            assert!(!base(url).within(&link(shallow)), "{} should not contain {}", url, shallow);
            assert!(base(shallow).within(&link(url)), "{} should contain {}", shallow, url);
        }
    }

    #[test]
    fn test_cross_origin_is_never_within() {
        let (a, b) = ("https://example.org/docs/", "https://example.net/docs/");
        assert!(!base(a).within(&link(b)));
        assert!(!base(b).within(&link(a)));
    }

    #[test]
    fn test_within_respects_segment_boundaries() {
        let docs = base("https://example.org/docs/");
        assert!(!docs.within(&link("https://example.org/docs-archive/")));
        assert!(!docs.within(&link("https://example.org/docsx")));
        assert!(docs.within(&link("https://example.org/docs")));
        assert!(docs.within(&link("https://example.org/docs/deep/page.html?x=1")));
    }

    #[test]
    fn test_root_base_contains_whole_origin() {
        let root = base("https://example.org");
        assert!(root.within(&link("https://example.org/index.html")));
        assert!(root.within(&link("https://example.org/a/b/c")));
        assert!(!root.within(&link("https://other.org/")));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(BaseUrl::new("example.org"), Err(CrawlError::InvalidBaseUrl { .. })));
        assert!(matches!(BaseUrl::new("ftp://example.org/"), Err(CrawlError::InvalidBaseUrl { .. })));
    }
}
