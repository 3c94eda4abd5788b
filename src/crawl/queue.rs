// src/crawl/queue.rs
// =============================================================================
// The shared work queue feeding the worker pool.
//
// How completion is detected:
// - `outstanding` counts links that are queued OR being processed
// - push() increments it before the link becomes visible
// - complete() decrements it once a worker is fully done with a link,
//   i.e. after every link discovered on that page has been pushed
// - when it drops to zero nothing is queued and nobody is working: the
//   crawl is quiescent and `drained` fires
//
// Workers block in next() only while the queue is empty. They wake up when
// a link is pushed, when the queue drains, or when a stop is requested.
//
// Order is FIFO, but nothing relies on it.
// =============================================================================

use crate::scope::Link;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub(crate) struct WorkQueue {
    items: Mutex<VecDeque<Link>>,
    outstanding: AtomicUsize,
    wakeup: Notify,
    drained: CancellationToken,
    stop: CancellationToken,
}

impl WorkQueue {
    pub(crate) fn new(stop: CancellationToken) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            outstanding: AtomicUsize::new(0),
            wakeup: Notify::new(),
            drained: CancellationToken::new(),
            stop,
        }
    }

    pub(crate) fn push(&self, link: Link) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(link);
        self.wakeup.notify_waiters();
    }

    fn pop(&self) -> Option<Link> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Next link to process, or `None` once the crawl is drained or stopped.
    pub(crate) async fn next(&self) -> Option<Link> {
        loop {
            // Register for wakeups *before* looking at the queue, so a push
            // that lands in between cannot be missed.
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.stop.is_cancelled() || self.drained.is_cancelled() {
                return None;
            }
            if let Some(link) = self.pop() {
                return Some(link);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.drained.cancelled() => return None,
                _ = self.stop.cancelled() => return None,
            }
        }
    }

    /// A worker finished a link it got from next().
    pub(crate) fn complete(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.cancel();
        }
    }

    /// Links queued or in progress
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.drained.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn link(raw: &str) -> Link {
        Link::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_drains_after_last_completion() {
        let queue = WorkQueue::new(CancellationToken::new());
        queue.push(link("https://example.org/"));

        let first = queue.next().await.unwrap();
        assert_eq!(first.as_str(), "https://example.org/");

        // discovered while processing the first one
        queue.push(link("https://example.org/a"));
        queue.complete();
        assert!(!queue.is_drained());

        queue.next().await.unwrap();
        queue.complete();
        assert!(queue.is_drained());
        assert_eq!(queue.outstanding(), 0);
        assert!(queue.next().await.is_none());
    }

    #[tokio::test]
    async fn test_waiting_worker_wakes_on_push() {
        let queue = Arc::new(WorkQueue::new(CancellationToken::new()));
        queue.push(link("https://example.org/"));
        queue.next().await.unwrap();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(link("https://example.org/late"));

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("worker should wake up")
            .unwrap();
        assert_eq!(got.unwrap().as_str(), "https://example.org/late");
    }

    #[tokio::test]
    async fn test_stop_releases_waiting_workers() {
        let stop = CancellationToken::new();
        let queue = Arc::new(WorkQueue::new(stop.clone()));
        queue.push(link("https://example.org/"));
        queue.next().await.unwrap();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next().await })
        };
        stop.cancel();

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("stop should release the worker")
            .unwrap();
        assert!(got.is_none());
        assert!(!queue.is_drained());
    }
}
