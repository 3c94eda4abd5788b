// src/checker/mod.rs
// =============================================================================
// This module contains everything that happens to one link in isolation.
//
// Submodules:
// - http: fetches a link (transport, retries, timeouts, redirect chains)
// - status: turns a link and its fetch outcome into a Status
// - html: extracts link references from fetched pages
//
// Nothing in here knows about other links; coordinating many links is the
// crawl module's job.
// =============================================================================

mod html;
mod http;
mod status;

pub use html::extract_links;
pub use http::{FetchOutcome, Fetcher, HttpResponse, Page, ReqwestTransport, Transport};
pub use status::{classify, classify_outcome, classify_scope, Status};
