// src/checker/http.rs
// =============================================================================
// This module fetches a single link over HTTP.
//
// Key functionality:
// - Transport: one GET for one URL, no automatic redirect following
// - ReqwestTransport: the default transport, built on a reqwest Client
// - Fetcher: retries transport failures, bounds every attempt with a timeout,
//   and walks redirect chains so loops are detected
//
// The Fetcher never touches the crawl index; it only reports what happened.
//
// Rust concepts:
// - async-trait: lets us keep the transport behind Arc<dyn Transport>
// - tokio::time::timeout: turns a hung future into an error
// =============================================================================

use crate::crawl::{CrawlSettings, MAX_RETRY_BACKOFF};
use crate::error::{CrawlError, FetchError, TransportError};
use crate::scope::Link;
use async_trait::async_trait;
use reqwest::{header, redirect, Client};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

// Raw answer to one request, before any classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Value of the Location header, if any
    pub location: Option<String>,
    pub content_type: Option<String>,
    /// Only filled for successful HTML responses when the caller asked for it
    pub body: Option<String>,
}

impl HttpResponse {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.status != 304
    }
}

/// Sends one GET request. Implementations must not follow redirects.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, read_body: bool) -> Result<HttpResponse, TransportError>;
}

// The default transport: a shared reqwest Client
//
// Client is cheap to clone and pools connections internally, so one instance
// serves every worker.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(settings: &CrawlSettings) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .redirect(redirect::Policy::none()) // the Fetcher walks redirects itself
            .user_agent(settings.user_agent())
            .build()
            .map_err(|e| CrawlError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url, read_body: bool) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(categorize_error)?;

        let status = response.status();
        let location = header_value(&response, header::LOCATION);
        let content_type = header_value(&response, header::CONTENT_TYPE);

        // Only successful HTML pages are worth downloading: that is where
        // new links come from.
        let is_html = content_type
            .as_deref()
            .map_or(false, |ct| ct.contains("text/html"));

        let body = if read_body && status.is_success() && is_html {
            Some(response.text().await.map_err(categorize_error)?)
        } else {
            None
        };

        Ok(HttpResponse {
            status: status.as_u16(),
            location,
            content_type,
            body,
        })
    }
}

fn header_value(response: &reqwest::Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

// Categorizes the different reqwest error types
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution failure
// - SSL certificate issues
// - Connection refused / reset
fn categorize_error(error: reqwest::Error) -> TransportError {
    // Convert error to string once; the chain carries the useful detail
    let error_string = format!("{:#}", error).to_lowercase();

    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        if error_string.contains("dns") || error_string.contains("resolve") {
            TransportError::Dns
        } else if error_string.contains("certificate") || error_string.contains("tls") {
            TransportError::Tls(error.to_string())
        } else {
            TransportError::Connect(error.to_string())
        }
    } else if error_string.contains("certificate") || error_string.contains("ssl") {
        TransportError::Tls(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

// A non-redirect response at the end of a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub status: u16,
    pub body: Option<String>,
}

/// What happened when a link was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The server answered without redirecting (any status, 2xx or not)
    Response(Page),
    /// The server redirected. `location` is the first hop's target, which the
    /// crawler checks on its own; `final_url` is where the chain ended.
    Redirect {
        status: u16,
        location: Url,
        final_url: Url,
    },
    /// Transport failure after all retries, or a broken redirect chain
    Failed(FetchError),
}

/// Fetches links with retry, timeout and redirect-loop protection.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    retry: u32,
    timeout: Duration,
    backoff: Duration,
    max_redirects: usize,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, settings: &CrawlSettings) -> Self {
        Self {
            transport,
            retry: settings.retry(),
            timeout: settings.timeout(),
            backoff: settings.retry_backoff(),
            max_redirects: settings.max_redirects(),
        }
    }

    /// Fetches `link`. With `read_body`, a successful HTML page comes back
    /// with its body so links can be extracted from it.
    pub async fn fetch(&self, link: &Link, read_body: bool) -> FetchOutcome {
        let response = match self.request(link.url(), read_body).await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Failed(e.into()),
        };

        if !response.is_redirect() {
            return FetchOutcome::Response(Page {
                status: response.status,
                body: response.body,
            });
        }

        let status = response.status;
        let location = match next_hop(link.url(), &response) {
            Some(url) => url,
            None => return FetchOutcome::Failed(FetchError::MissingLocation { status }),
        };

        match self.follow_chain(location.clone()).await {
            Ok(final_url) => FetchOutcome::Redirect {
                status,
                location,
                final_url,
            },
            Err(e) => FetchOutcome::Failed(e),
        }
    }

    // Walks the rest of a redirect chain (the first hop is already counted)
    //
    // The chain is only followed to prove it terminates. Whatever the final
    // page answers is the redirect target's own business: it gets claimed and
    // classified separately.
    async fn follow_chain(&self, mut current: Url) -> Result<Url, FetchError> {
        let mut hops = 1;
        loop {
            if hops > self.max_redirects {
                return Err(FetchError::RedirectLoop {
                    limit: self.max_redirects,
                });
            }

            let response = match self.request(&current, false).await {
                Ok(response) => response,
                Err(_) => return Ok(current),
            };

            if !response.is_redirect() {
                return Ok(current);
            }

            current = match next_hop(&current, &response) {
                Some(url) => url,
                None => return Ok(current),
            };
            hops += 1;
        }
    }

    // One request, retried up to `retry` extra times on transport failure
    //
    // HTTP error statuses are answers, not failures: they are never retried.
    async fn request(&self, url: &Url, read_body: bool) -> Result<HttpResponse, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, self.transport.get(url, read_body)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.retry => {
                    attempt += 1;
                    warn!(url = %url, attempt, error = %e, "retrying request");
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff_for(attempt)).await;
                    }
                }
                Err(e) => {
                    debug!(url = %url, attempts = attempt + 1, error = %e, "request failed");
                    return Err(e);
                }
            }
        }
    }

    // Linear backoff, never longer than MAX_RETRY_BACKOFF per wait
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt).min(MAX_RETRY_BACKOFF)
    }
}

// Resolves a Location header against the URL that answered with it
fn next_hop(from: &Url, response: &HttpResponse) -> Option<Url> {
    let location = response.location.as_deref()?.trim();
    if location.is_empty() {
        return None;
    }
    let mut target = from.join(location).ok()?;
    target.set_fragment(None);
    Some(target)
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why not let reqwest follow redirects?
//    - A redirect is a result we report (REDIRECTION), not a detail to hide
//    - The target must be claimed and checked like any other link
//    - Walking the chain ourselves gives one place to enforce max_redirects
//
// 2. Why wrap the transport in tokio::time::timeout when reqwest already has
//    a timeout?
//    - The Transport trait can be implemented by anything; the timeout has to
//      hold no matter which transport is plugged in
//
// 3. Why retry only transport errors?
//    - A 404 is a real answer; asking again will not change it
//    - Timeouts and connection resets are often transient
//
// 4. A redirect target gets requested twice
//    - once here, while walking the chain (no body, only to prove it ends)
//    - once more when the crawler processes the claimed target
//    The crawler still claims and classifies it once; only the request count
//    doubles, and a hanging target costs 2 x (retry + 1) attempts.
// -----------------------------------------------------------------------------
