// src/crawl/mod.rs
// =============================================================================
// This module coordinates a whole crawl.
//
// Features:
// - Fixed-size pool of async workers sharing one work queue
// - Exactly-once processing of every distinct link (claim before queueing)
// - Live progress through snapshot(), final report through results()
// - Cooperative stop
//
// Submodules:
// - settings: CrawlSettings and its builder
// - index: CrawlIndex, the shared record of every discovered link
// - queue: the work queue and quiescence detection
// - crawler: the Crawler handle and the worker loop
// =============================================================================

mod crawler;
mod index;
mod queue;
mod settings;

pub use crawler::Crawler;
pub use index::{CrawlIndex, CrawlPhase, CrawlResults, CrawlSnapshot, Stats};
pub use settings::{CrawlSettings, CrawlSettingsBuilder, DEFAULT_MAX_REDIRECTS, DEFAULT_THREADS, DEFAULT_TIMEOUT, MAX_RETRY_BACKOFF};
