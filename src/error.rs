// src/error.rs
// =============================================================================
// Error types shared by the whole crawler.
//
// Two families live here:
// - Fatal errors (CrawlError): stop the crawl before it starts, or signal a
//   bug in the worker logic. These are returned to the caller.
// - Per-link errors (UrlError, TransportError, FetchError): never escape a
//   worker. They are folded into a Status (IGNORED or NOT_FOUND) and the crawl
//   keeps going.
//
// Rust concepts:
// - thiserror: derive std::error::Error + Display from attributes
// - #[from]: automatic conversion so `?` can lift one error into another
// =============================================================================

use thiserror::Error;

/// Errors that end (or prevent) a crawl.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CrawlError {
    /// The starting URL could not be parsed into an http(s) link
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// A setting is out of range or a pattern failed to compile
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// The worker pool could not be started or a worker died
    #[error("worker pool failure: {0}")]
    WorkerPool(String),

    /// The local directory could not be served
    #[error("cannot serve '{root}': {reason}")]
    LocalServer { root: String, reason: String },

    /// `record` was called for a link that was never claimed (or twice)
    #[error("crawl index is inconsistent: {0}")]
    IndexConsistency(String),
}

/// A discovered reference that cannot become a crawlable link.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("malformed URL '{url}': {reason}")]
    Malformed { url: String, reason: String },

    #[error("unsupported scheme '{scheme}' in '{url}'")]
    UnsupportedScheme { url: String, scheme: String },
}

/// Why a single HTTP request failed at the transport level.
///
/// Mirrors the failure modes we can tell apart from a reqwest error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("could not resolve hostname")]
    Dns,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("{0}")]
    Other(String),
}

/// Terminal failure of a fetch, after retries. Always classified NOT_FOUND.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("redirect chain longer than {limit} hops")]
    RedirectLoop { limit: usize },

    #[error("HTTP {status} redirect without a usable Location header")]
    MissingLocation { status: u16 },
}
