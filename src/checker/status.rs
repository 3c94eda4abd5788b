// src/checker/status.rs
// =============================================================================
// Turns a link (and, if it was fetched, the fetch outcome) into a Status.
//
// Decision order, first match wins:
// 1. other origin and external checks off (and host not allowed) -> IGNORED
// 2. matches an ignore pattern / misses every allow pattern       -> IGNORED
// 3. redirect (3xx)                                                -> REDIRECTION
// 4. success (2xx)                                                 -> FOUND
// 5. anything else (4xx, 5xx, transport failure, redirect loop)    -> NOT_FOUND
//
// Steps 1-2 only need the link, so the crawler runs them *before* paying for
// a network request (classify_scope). Steps 3-5 need the response
// (classify_outcome).
// =============================================================================

use super::http::FetchOutcome;
use crate::crawl::CrawlSettings;
use crate::scope::Link;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final classification of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// 2xx response
    Found,
    /// 4xx/5xx, or the request failed after all retries
    NotFound,
    /// Out of scope or excluded by a pattern, never fetched
    Ignored,
    /// 3xx response; the target is checked on its own
    Redirection,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Found,
        Status::NotFound,
        Status::Ignored,
        Status::Redirection,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Status::Found => "found",
            Status::NotFound => "not found",
            Status::Ignored => "ignored",
            Status::Redirection => "redirected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scope and pattern decisions (steps 1-2). `None` means "go fetch it".
pub fn classify_scope(link: &Link, settings: &CrawlSettings) -> Option<Status> {
    let foreign = !settings.base().same_origin(link);
    if foreign && !settings.external() && !settings.allows_domain(link) {
        return Some(Status::Ignored);
    }

    if settings.is_excluded(link) {
        return Some(Status::Ignored);
    }

    None
}

/// Response decisions (steps 3-5).
pub fn classify_outcome(outcome: &FetchOutcome) -> Status {
    match outcome {
        FetchOutcome::Redirect { .. } => Status::Redirection,
        FetchOutcome::Response(page) if (200..300).contains(&page.status) => Status::Found,
        FetchOutcome::Response(_) | FetchOutcome::Failed(_) => Status::NotFound,
    }
}

/// The full decision for a link that has been fetched.
pub fn classify(link: &Link, settings: &CrawlSettings, outcome: &FetchOutcome) -> Status {
    classify_scope(link, settings).unwrap_or_else(|| classify_outcome(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::http::Page;
    use crate::error::{FetchError, TransportError};
    use url::Url;

    fn settings(external: bool) -> CrawlSettings {
        CrawlSettings::builder("https://example.org/docs/")
            .external(external)
            .ignore(r"/private/")
            .domain("cdn.example.org")
            .build()
            .unwrap()
    }

    fn link(raw: &str) -> Link {
        Link::new(raw).unwrap()
    }

    fn response(status: u16) -> FetchOutcome {
        FetchOutcome::Response(Page { status, body: None })
    }

    #[test]
    fn test_external_ignored_when_checks_off() {
        let status = classify_scope(&link("https://other.org/"), &settings(false));
        assert_eq!(status, Some(Status::Ignored));
    }

    #[test]
    fn test_external_fetched_when_checks_on() {
        assert_eq!(classify_scope(&link("https://other.org/"), &settings(true)), None);
    }

    #[test]
    fn test_allowed_domain_is_fetched_with_checks_off() {
        assert_eq!(classify_scope(&link("https://cdn.example.org/app.js"), &settings(false)), None);
    }

    #[test]
    fn test_same_origin_outside_base_path_is_still_checked() {
        assert_eq!(classify_scope(&link("https://example.org/about.html"), &settings(false)), None);
    }

    #[test]
    fn test_ignore_pattern() {
        let status = classify_scope(&link("https://example.org/docs/private/a.html"), &settings(false));
        assert_eq!(status, Some(Status::Ignored));
    }

    #[test]
    fn test_outcome_statuses() {
        assert_eq!(classify_outcome(&response(200)), Status::Found);
        assert_eq!(classify_outcome(&response(204)), Status::Found);
        assert_eq!(classify_outcome(&response(404)), Status::NotFound);
        assert_eq!(classify_outcome(&response(503)), Status::NotFound);

        let redirect = FetchOutcome::Redirect {
            status: 301,
            location: Url::parse("https://example.org/docs/new.html").unwrap(),
            final_url: Url::parse("https://example.org/docs/new.html").unwrap(),
        };
        assert_eq!(classify_outcome(&redirect), Status::Redirection);

        let failed = FetchOutcome::Failed(FetchError::Transport(TransportError::Timeout));
        assert_eq!(classify_outcome(&failed), Status::NotFound);

        let looped = FetchOutcome::Failed(FetchError::RedirectLoop { limit: 10 });
        assert_eq!(classify_outcome(&looped), Status::NotFound);
    }

    #[test]
    fn test_scope_short_circuits_outcome() {
        // even a 200 cannot turn an out-of-scope link into FOUND
        let status = classify(&link("https://other.org/"), &settings(false), &response(200));
        assert_eq!(status, Status::Ignored);

        let status = classify(&link("https://example.org/docs/a.html"), &settings(false), &response(200));
        assert_eq!(status, Status::Found);
    }
}
