// src/crawl/settings.rs
// =============================================================================
// CrawlSettings: the configuration snapshot of one crawl.
//
// Settings are assembled with a builder and validated once in build(). After
// that they are immutable for the lifetime of the crawl.
//
// Example:
//   let settings = CrawlSettings::builder("https://example.org/docs/")
//       .external(true)
//       .threads(8)
//       .retry(2)
//       .ignore(r"\.pdf$")
//       .build()?;
// =============================================================================

use crate::error::CrawlError;
use crate::scope::{BaseUrl, Link, DEFAULT_INDEX_DOCUMENT};
use regex::Regex;
use std::time::Duration;

pub const DEFAULT_THREADS: usize = 1;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_USER_AGENT: &str = concat!("link-warden/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    base: BaseUrl,
    external: bool,
    threads: usize,
    retry: u32,
    timeout: Duration,
    retry_backoff: Duration,
    max_redirects: usize,
    index_document: String,
    user_agent: String,
    domains: Vec<String>,
    ignore: Vec<Regex>,
    allow: Vec<Regex>,
}

impl CrawlSettings {
    pub fn builder(base: impl Into<String>) -> CrawlSettingsBuilder {
        CrawlSettingsBuilder::new(base)
    }

    pub fn base(&self) -> &BaseUrl {
        &self.base
    }

    /// Check links that leave the base URL's origin
    pub fn external(&self) -> bool {
        self.external
    }

    /// Number of concurrent workers
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Extra attempts after a transport failure
    pub fn retry(&self) -> u32 {
        self.retry
    }

    /// Per-request timeout, applied to every attempt
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    pub fn index_document(&self) -> &str {
        &self.index_document
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Hosts listed with `domain()` are checked even with external checks off.
    pub fn allows_domain(&self, link: &Link) -> bool {
        let host = link.host();
        self.domains.iter().any(|domain| domain.eq_ignore_ascii_case(host))
    }

    /// A link is excluded when it matches an ignore pattern, or when allow
    /// patterns exist and none of them matches. The base link is never excluded.
    pub fn is_excluded(&self, link: &Link) -> bool {
        if link == self.base.link() {
            return false;
        }

        let url = link.as_str();
        if self.ignore.iter().any(|pattern| pattern.is_match(url)) {
            return true;
        }

        !self.allow.is_empty() && !self.allow.iter().any(|pattern| pattern.is_match(url))
    }
}

/// Builder for [`CrawlSettings`]; nothing is checked until `build()`.
#[derive(Debug, Clone)]
pub struct CrawlSettingsBuilder {
    base: String,
    external: bool,
    threads: usize,
    retry: u32,
    timeout: Duration,
    retry_backoff: Duration,
    max_redirects: usize,
    index_document: String,
    user_agent: String,
    domains: Vec<String>,
    ignore: Vec<String>,
    allow: Vec<String>,
}

impl CrawlSettingsBuilder {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            external: false,
            threads: DEFAULT_THREADS,
            retry: 0,
            timeout: DEFAULT_TIMEOUT,
            retry_backoff: Duration::ZERO,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            index_document: DEFAULT_INDEX_DOCUMENT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            domains: Vec::new(),
            ignore: Vec::new(),
            allow: Vec::new(),
        }
    }

    pub fn external(mut self, external: bool) -> Self {
        self.external = external;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Linear backoff between retries (attempt * backoff, capped at 5s)
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn index_document(mut self, name: impl Into<String>) -> Self {
        self.index_document = name.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn domain(mut self, host: impl Into<String>) -> Self {
        self.domains.push(host.into());
        self
    }

    /// Regex matched against the full normalized URL
    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.ignore.push(pattern.into());
        self
    }

    pub fn allow(mut self, pattern: impl Into<String>) -> Self {
        self.allow.push(pattern.into());
        self
    }

    pub fn build(self) -> Result<CrawlSettings, CrawlError> {
        if self.threads == 0 {
            return Err(CrawlError::InvalidSettings(
                "threads must be greater than 0".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(CrawlError::InvalidSettings(
                "timeout must be greater than 0".to_string(),
            ));
        }
        if self.max_redirects == 0 {
            return Err(CrawlError::InvalidSettings(
                "max_redirects must be greater than 0".to_string(),
            ));
        }
        if self.index_document.contains('/') {
            return Err(CrawlError::InvalidSettings(format!(
                "index document '{}' must be a file name",
                self.index_document
            )));
        }

        let base = BaseUrl::with_index(&self.base, &self.index_document)?;

        Ok(CrawlSettings {
            base,
            external: self.external,
            threads: self.threads,
            retry: self.retry,
            timeout: self.timeout,
            retry_backoff: self.retry_backoff.min(MAX_RETRY_BACKOFF),
            max_redirects: self.max_redirects,
            index_document: self.index_document,
            user_agent: self.user_agent,
            domains: self.domains,
            ignore: compile_patterns("ignore", &self.ignore)?,
            allow: compile_patterns("allow", &self.allow)?,
        })
    }
}

fn compile_patterns(kind: &str, patterns: &[String]) -> Result<Vec<Regex>, CrawlError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| {
                CrawlError::InvalidSettings(format!("bad {} pattern '{}': {}", kind, pattern, e))
            })
        })
        .collect()
}
