// src/scope/mod.rs
// =============================================================================
// The URL model: what a link is and whether it belongs to the site.
//
// Submodules:
// - link: Link, a normalized absolute http(s) URL
// - base: BaseUrl, the crawl's starting URL and its scope test (within)
// =============================================================================

mod base;
mod link;

pub use base::BaseUrl;
pub use link::{Link, DEFAULT_INDEX_DOCUMENT};
