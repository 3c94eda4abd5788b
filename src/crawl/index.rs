// src/crawl/index.rs
// =============================================================================
// CrawlIndex: every link the crawl has ever seen, and what became of it.
//
// This is the only shared mutable state of a crawl. Workers never touch the
// maps directly; they go through two operations:
// - try_claim(link): insert as pending if absent. The single dedup point:
//   whoever gets `true` owns the link and must eventually record it.
// - record(link, status): pending -> final status, bump the counter.
//
// All state sits behind one std Mutex. Critical sections are a hash lookup
// and an insert, and no lock is ever held across an .await, so a plain
// blocking mutex is the right tool.
//
// References that could not even become a Link (malformed, mailto:, ...) are
// tracked separately as "unchecked" and counted as IGNORED right away.
// =============================================================================

use crate::checker::Status;
use crate::error::CrawlError;
use crate::scope::Link;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-status tally. Counters only ever go up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub found: usize,
    pub not_found: usize,
    pub ignored: usize,
    pub redirection: usize,
}

impl Stats {
    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Found => self.found,
            Status::NotFound => self.not_found,
            Status::Ignored => self.ignored,
            Status::Redirection => self.redirection,
        }
    }

    /// Links that reached a final status
    pub fn total(&self) -> usize {
        self.found + self.not_found + self.ignored + self.redirection
    }

    fn bump(&mut self, status: Status) {
        match status {
            Status::Found => self.found += 1,
            Status::NotFound => self.not_found += 1,
            Status::Ignored => self.ignored += 1,
            Status::Redirection => self.redirection += 1,
        }
    }
}

/// Where the crawl is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlPhase {
    Idle,
    Crawling,
    /// Quiescent: queue empty, every worker idle, every link recorded
    Crawled,
    /// Stopped early (stop() or a fatal worker error); some links may be pending
    Aborted,
}

impl CrawlPhase {
    pub fn is_finished(self) -> bool {
        matches!(self, CrawlPhase::Crawled | CrawlPhase::Aborted)
    }
}

/// Point-in-time view for observers. Reading it never changes the crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrawlSnapshot {
    pub phase: CrawlPhase,
    /// Workers are still running
    pub crawling: bool,
    /// The crawl is over (completed or aborted); results are final
    pub crawled: bool,
    pub aborted: bool,
    pub stats: Stats,
    /// Every link ever discovered, pending ones included
    pub total_discovered: usize,
}

impl CrawlSnapshot {
    /// Links discovered but not classified yet
    pub fn pending(&self) -> usize {
        self.total_discovered.saturating_sub(self.stats.total())
    }
}

/// Classified links, one bucket per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlResults {
    pub found: Vec<Link>,
    pub not_found: Vec<Link>,
    pub ignored: Vec<Link>,
    pub redirected: Vec<Link>,
    /// Raw references that were not valid http(s) URLs (counted as ignored)
    pub unchecked: Vec<String>,
}

impl CrawlResults {
    pub fn bucket(&self, status: Status) -> &[Link] {
        match status {
            Status::Found => &self.found,
            Status::NotFound => &self.not_found,
            Status::Ignored => &self.ignored,
            Status::Redirection => &self.redirected,
        }
    }
}

#[derive(Debug, Default)]
struct IndexState {
    // None = claimed, still pending
    links: HashMap<Link, Option<Status>>,
    unchecked: HashSet<String>,
    stats: Stats,
}

#[derive(Debug, Default)]
pub struct CrawlIndex {
    state: Mutex<IndexState>,
}

impl CrawlIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // A worker that panicked mid-update cannot leave the maps half-written
    // (every update is a single insert), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `link` as pending. `false` means somebody already has it.
    pub fn try_claim(&self, link: &Link) -> bool {
        let mut state = self.lock();
        if state.links.contains_key(link) {
            return false;
        }
        state.links.insert(link.clone(), None);
        true
    }

    /// Stores the final status of a claimed link.
    pub fn record(&self, link: &Link, status: Status) -> Result<(), CrawlError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        match state.links.get_mut(link) {
            Some(slot) => {
                if let Some(previous) = *slot {
                    return Err(CrawlError::IndexConsistency(format!(
                        "{} recorded twice (already {})",
                        link, previous
                    )));
                }
                *slot = Some(status);
                state.stats.bump(status);
                Ok(())
            }
            None => Err(CrawlError::IndexConsistency(format!(
                "{} recorded without being claimed",
                link
            ))),
        }
    }

    /// Notes a reference that could not be turned into a Link. Returns `true`
    /// the first time a given raw string is seen.
    pub fn record_unchecked(&self, raw: &str) -> bool {
        let mut state = self.lock();
        if !state.unchecked.insert(raw.to_string()) {
            return false;
        }
        state.stats.bump(Status::Ignored);
        true
    }

    /// `None` if never claimed, `Some(None)` while pending.
    pub fn status(&self, link: &Link) -> Option<Option<Status>> {
        self.lock().links.get(link).copied()
    }

    pub fn stats(&self) -> Stats {
        self.lock().stats
    }

    pub fn total_discovered(&self) -> usize {
        let state = self.lock();
        state.links.len() + state.unchecked.len()
    }

    /// Counts and totals read under a single lock, so they always agree.
    pub fn snapshot(&self, phase: CrawlPhase) -> CrawlSnapshot {
        let state = self.lock();
        CrawlSnapshot {
            phase,
            crawling: phase == CrawlPhase::Crawling,
            crawled: phase.is_finished(),
            aborted: phase == CrawlPhase::Aborted,
            stats: state.stats,
            total_discovered: state.links.len() + state.unchecked.len(),
        }
    }

    /// Links grouped by status, each bucket sorted. Pending links are left out.
    pub fn results(&self) -> CrawlResults {
        let state = self.lock();
        let mut results = CrawlResults::default();

        for (link, status) in &state.links {
            let bucket = match status {
                Some(Status::Found) => &mut results.found,
                Some(Status::NotFound) => &mut results.not_found,
                Some(Status::Ignored) => &mut results.ignored,
                Some(Status::Redirection) => &mut results.redirected,
                None => continue,
            };
            bucket.push(link.clone());
        }
        results.unchecked = state.unchecked.iter().cloned().collect();
        drop(state);

        results.found.sort();
        results.not_found.sort();
        results.ignored.sort();
        results.redirected.sort();
        results.unchecked.sort();
        results
    }
}
