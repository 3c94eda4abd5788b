// src/lib.rs
// =============================================================================
// link-warden: crawl a site from a base URL and classify every link found as
// found, not found, ignored or redirected.
//
// Layout, leaves first:
// - scope:   Link and BaseUrl (normalization and "is this inside the site?")
// - checker: fetching one link and classifying the result
// - crawl:   settings, the shared crawl index, and the worker pool
// - serve:   a local directory served on localhost, for crawling files
//
// Quick start:
//   let settings = CrawlSettings::builder("https://example.org/docs/").threads(8).build()?;
//   let results = Crawler::run(settings).await?;
//   for link in &results.not_found { println!("dead: {}", link); }
// =============================================================================

pub mod checker;
pub mod crawl;
pub mod error;
pub mod logging;
pub mod scope;
pub mod serve;

#[cfg(test)]
mod testing;

pub use checker::{extract_links, FetchOutcome, Fetcher, HttpResponse, ReqwestTransport, Status, Transport};
pub use crawl::{CrawlIndex, CrawlPhase, CrawlResults, CrawlSettings, CrawlSnapshot, Crawler, Stats};
pub use error::{CrawlError, FetchError, TransportError, UrlError};
pub use scope::{BaseUrl, Link};
pub use serve::LocalServer;
