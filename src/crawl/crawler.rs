// src/crawl/crawler.rs
// =============================================================================
// The Crawler: drives a whole crawl with a fixed pool of workers.
//
// Lifecycle:  Idle -> Crawling -> Crawled   (or Aborted after stop())
//
// Each worker loops:
//   1. take a link from the queue
//   2. scope / pattern check; IGNORED links are recorded without a request
//   3. fetch (retries, timeout and redirects are the Fetcher's business)
//   4. classify and record the status in the index
//   5. FOUND page inside the base URL -> extract references, claim new ones
//      and queue them; REDIRECTION inside the base URL -> claim the target
//
// A failing link is just a NOT_FOUND; only an inconsistent index or a dead
// worker stops the crawl.
//
// Observers never get a callback. They poll snapshot() at whatever pace
// suits them; results() is complete once snapshot().crawled is true.
// =============================================================================

use super::index::{CrawlIndex, CrawlPhase, CrawlResults, CrawlSnapshot};
use super::queue::WorkQueue;
use super::settings::CrawlSettings;
use crate::checker::{
    classify_outcome, classify_scope, extract_links, FetchOutcome, Fetcher, Page,
    ReqwestTransport, Status, Transport,
};
use crate::error::CrawlError;
use crate::scope::Link;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

/// A running (or finished) crawl.
///
/// Dropping the handle stops the crawl.
pub struct Crawler {
    inner: Arc<Inner>,
    phase: watch::Receiver<CrawlPhase>,
}

// State shared by the handle, the workers and the supervisor
struct Inner {
    settings: CrawlSettings,
    index: CrawlIndex,
    fetcher: Fetcher,
    queue: WorkQueue,
    stop: CancellationToken,
    phase: watch::Sender<CrawlPhase>,
    fatal: Mutex<Option<CrawlError>>,
}

impl Crawler {
    /// Starts a crawl using the default reqwest transport.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn start(settings: CrawlSettings) -> Result<Self, CrawlError> {
        let transport = Arc::new(ReqwestTransport::new(&settings)?);
        Self::start_with_transport(settings, transport)
    }

    /// Starts a crawl that sends its requests through `transport`.
    pub fn start_with_transport(
        settings: CrawlSettings,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CrawlError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CrawlError::WorkerPool(e.to_string()))?;

        let stop = CancellationToken::new();
        let (phase_tx, phase_rx) = watch::channel(CrawlPhase::Idle);
        let inner = Arc::new(Inner {
            fetcher: Fetcher::new(transport, &settings),
            index: CrawlIndex::new(),
            queue: WorkQueue::new(stop.clone()),
            stop,
            phase: phase_tx,
            fatal: Mutex::new(None),
            settings,
        });

        let base = inner.settings.base().link().clone();
        inner.enqueue(base);
        inner.phase.send_replace(CrawlPhase::Crawling);

        info!(
            base = %inner.settings.base().link(),
            threads = inner.settings.threads(),
            external = inner.settings.external(),
            retry = inner.settings.retry(),
            "crawl started"
        );

        let workers: Vec<JoinHandle<()>> = (0..inner.settings.threads())
            .map(|id| runtime.spawn(worker(inner.clone(), id)))
            .collect();
        runtime.spawn(supervise(inner.clone(), workers));

        Ok(Self {
            inner,
            phase: phase_rx,
        })
    }

    /// Start and wait in one go.
    pub async fn run(settings: CrawlSettings) -> Result<CrawlResults, CrawlError> {
        Self::start(settings)?.wait().await
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.inner.settings
    }

    pub fn phase(&self) -> CrawlPhase {
        *self.phase.borrow()
    }

    /// Live progress. Safe to call at any time from any task.
    pub fn snapshot(&self) -> CrawlSnapshot {
        self.inner.index.snapshot(self.phase())
    }

    /// Classified links so far.
    ///
    /// Only final once `snapshot().crawled` is true; before that it is a
    /// partial view that leaves out links still pending.
    pub fn results(&self) -> CrawlResults {
        self.inner.index.results()
    }

    /// Asks the workers to stop. In-flight requests finish, nothing new is
    /// dequeued, and the crawl ends as Aborted (unless it was already done).
    pub fn stop(&self) {
        self.inner.stop.cancel();
    }

    /// Waits for the crawl to finish and returns its results, or the fatal
    /// error that ended it.
    pub async fn wait(&self) -> Result<CrawlResults, CrawlError> {
        let mut phase = self.phase.clone();
        phase
            .wait_for(|phase| phase.is_finished())
            .await
            .map_err(|_| CrawlError::WorkerPool("crawl supervisor went away".to_string()))?;

        if let Some(e) = self.inner.fatal_error() {
            return Err(e);
        }
        Ok(self.results())
    }
}

impl Drop for Crawler {
    fn drop(&mut self) {
        self.inner.stop.cancel();
    }
}

impl Inner {
    async fn process(&self, link: &Link) -> Result<(), CrawlError> {
        if let Some(status) = classify_scope(link, &self.settings) {
            debug!(url = %link, %status, "classified without fetching");
            return self.index.record(link, status);
        }

        // Only pages inside the base URL are parsed for more links
        let expand = self.settings.base().within(link);
        let outcome = self.fetcher.fetch(link, expand).await;
        let status = classify_outcome(&outcome);
        self.index.record(link, status)?;

        match outcome {
            FetchOutcome::Response(Page {
                status: code,
                body: Some(body),
            }) if status == Status::Found && expand => {
                let references = extract_links(&body, link.url());
                debug!(url = %link, code, references = references.len(), "page found");
                for reference in references {
                    self.discover(&reference, link);
                }
            }
            FetchOutcome::Response(Page { status: code, .. }) => {
                debug!(url = %link, code, %status, "classified");
            }
            FetchOutcome::Redirect {
                status: code,
                location,
                final_url,
            } => {
                debug!(url = %link, code, to = %location, end = %final_url, "redirected");
                self.follow_redirect(location);
            }
            FetchOutcome::Failed(e) => {
                debug!(url = %link, error = %e, "not found");
            }
        }

        Ok(())
    }

    // A reference found on `page`
    fn discover(&self, reference: &str, page: &Link) {
        match Link::resolve(reference, page, self.settings.index_document()) {
            Ok(link) => self.enqueue(link),
            Err(e) => {
                if self.index.record_unchecked(reference) {
                    debug!(reference, error = %e, "ignored unusable reference");
                }
            }
        }
    }

    fn follow_redirect(&self, location: Url) {
        match Link::with_index(location.as_str(), self.settings.index_document()) {
            Ok(target) if self.settings.base().within(&target) => self.enqueue(target),
            Ok(target) => debug!(url = %target, "redirect target outside base, not followed"),
            Err(e) => {
                if self.index.record_unchecked(location.as_str()) {
                    debug!(url = %location, error = %e, "ignored unusable redirect target");
                }
            }
        }
    }

    // Claim first: whoever wins the claim is the only one to queue the link
    fn enqueue(&self, link: Link) {
        if self.index.try_claim(&link) {
            self.queue.push(link);
        }
    }

    fn fail(&self, e: CrawlError) {
        let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        if fatal.is_none() {
            *fatal = Some(e);
        }
        self.stop.cancel();
    }

    fn fatal_error(&self) -> Option<CrawlError> {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn worker(inner: Arc<Inner>, id: usize) {
    while let Some(link) = inner.queue.next().await {
        let result = inner.process(&link).await;
        inner.queue.complete();

        if let Err(e) = result {
            error!(worker = id, url = %link, error = %e, "stopping crawl");
            inner.fail(e);
            break;
        }
    }
    debug!(worker = id, "worker finished");
}

// Waits for every worker, then publishes the final phase
async fn supervise(inner: Arc<Inner>, workers: Vec<JoinHandle<()>>) {
    let mut workers: FuturesUnordered<_> = workers.into_iter().collect();
    while let Some(joined) = workers.next().await {
        if let Err(e) = joined {
            // a panicking worker never completes its link; stop the others
            // instead of letting them wait for it forever
            inner.fail(CrawlError::WorkerPool(format!("worker panicked: {}", e)));
        }
    }

    let phase = if inner.queue.is_drained() && inner.fatal_error().is_none() {
        CrawlPhase::Crawled
    } else {
        CrawlPhase::Aborted
    };

    let snapshot = inner.index.snapshot(phase);
    info!(
        phase = ?phase,
        total = snapshot.total_discovered,
        found = snapshot.stats.found,
        not_found = snapshot.stats.not_found,
        ignored = snapshot.stats.ignored,
        redirected = snapshot.stats.redirection,
        pending = inner.queue.outstanding(),
        "crawl finished"
    );
    inner.phase.send_replace(phase);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSite, Route};
    use std::time::Duration;

    fn link(raw: &str) -> Link {
        Link::new(raw).unwrap()
    }

    fn links(raws: &[&str]) -> Vec<Link> {
        let mut out: Vec<Link> = raws.iter().map(|raw| link(raw)).collect();
        out.sort();
        out
    }

    async fn crawl(settings: CrawlSettings, site: Arc<FakeSite>) -> (CrawlResults, CrawlSnapshot) {
        let crawler = Crawler::start_with_transport(settings, site).unwrap();
        let results = tokio::time::timeout(Duration::from_secs(10), crawler.wait())
            .await
            .expect("crawl should finish")
            .unwrap();
        (results, crawler.snapshot())
    }

    fn docs_site() -> FakeSite {
        FakeSite::new()
            .page(
                "http://site.test/",
                200,
                r#"<a href="/docs/">Docs</a>
                   <a href="https://other.org/">Elsewhere</a>
                   <a href="mailto:team@site.test">Mail</a>"#,
            )
            .page(
                "http://site.test/docs/",
                200,
                r#"<a href="a.html">A</a>
                   <a href="b.html#part">B</a>
                   <a href="missing.html">Missing</a>
                   <a href="../index.html">Home</a>"#,
            )
            .page("http://site.test/docs/a.html", 200, r#"<a href="b.html">B</a>"#)
            .page("http://site.test/docs/b.html", 200, r#"<a href="index.html">Up</a>"#)
            .page("https://other.org/", 200, r#"<a href="/deep">deep</a>"#)
    }

    #[tokio::test]
    async fn test_internal_crawl_ignores_external_links() {
        let site = Arc::new(docs_site());
        let settings = CrawlSettings::builder("http://site.test/").threads(4).build().unwrap();

        let (results, snapshot) = crawl(settings, site.clone()).await;

        assert_eq!(
            results.found,
            links(&[
                "http://site.test/",
                "http://site.test/docs/",
                "http://site.test/docs/a.html",
                "http://site.test/docs/b.html",
            ])
        );
        assert_eq!(results.not_found, links(&["http://site.test/docs/missing.html"]));
        assert_eq!(results.ignored, links(&["https://other.org/"]));
        assert_eq!(results.unchecked, vec!["mailto:team@site.test".to_string()]);
        assert!(results.redirected.is_empty());

        assert!(snapshot.crawled);
        assert!(!snapshot.crawling);
        assert!(!snapshot.aborted);
        assert_eq!(snapshot.stats.total(), snapshot.total_discovered);
        assert_eq!(snapshot.total_discovered, 7);

        assert_eq!(site.attempts("https://other.org/"), 0);
        assert_eq!(site.max_attempts_per_url(), 1);
    }

    #[tokio::test]
    async fn test_external_links_checked_but_not_followed() {
        let site = Arc::new(docs_site());
        let settings = CrawlSettings::builder("http://site.test/")
            .external(true)
            .threads(2)
            .build()
            .unwrap();

        let (results, _) = crawl(settings, site.clone()).await;

        assert!(results.found.contains(&link("https://other.org/")));
        assert_eq!(site.attempts("https://other.org/"), 1);
        assert_eq!(site.attempts("https://other.org/deep"), 0);
    }

    #[tokio::test]
    async fn test_redirect_source_and_target_classified_separately() {
        let site = Arc::new(
            FakeSite::new()
                .page("http://site.test/", 200, r#"<a href="/old.html">old</a>"#)
                .redirect("http://site.test/old.html", 301, "/new.html")
                .page("http://site.test/new.html", 200, ""),
        );
        let settings = CrawlSettings::builder("http://site.test/").build().unwrap();

        let (results, snapshot) = crawl(settings, site.clone()).await;

        assert_eq!(results.redirected, links(&["http://site.test/old.html"]));
        assert!(results.found.contains(&link("http://site.test/new.html")));
        assert_eq!(snapshot.stats.redirection, 1);
        assert_eq!(snapshot.stats.total(), snapshot.total_discovered);
        assert_eq!(site.attempts("http://site.test/old.html"), 1);
        // once by the chain walk, once when the claimed target is processed
        assert_eq!(site.attempts("http://site.test/new.html"), 2);
    }

    #[tokio::test]
    async fn test_redirect_out_of_base_is_not_followed() {
        let site = Arc::new(
            FakeSite::new()
                .page("http://site.test/docs/", 200, r#"<a href="moved.html">moved</a>"#)
                .redirect("http://site.test/docs/moved.html", 302, "/elsewhere.html")
                .page("http://site.test/elsewhere.html", 200, ""),
        );
        let settings = CrawlSettings::builder("http://site.test/docs/").build().unwrap();

        let (results, snapshot) = crawl(settings, site).await;

        assert_eq!(results.redirected, links(&["http://site.test/docs/moved.html"]));
        assert!(!results.found.contains(&link("http://site.test/elsewhere.html")));
        assert_eq!(snapshot.total_discovered, 2);
    }

    #[tokio::test]
    async fn test_hanging_link_retried_then_not_found() {
        let site = Arc::new(
            FakeSite::new()
                .page("http://site.test/", 200, r#"<a href="/slow">slow</a>"#)
                .route("http://site.test/slow", Route::Hang),
        );
        let settings = CrawlSettings::builder("http://site.test/")
            .retry(2)
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();

        let (results, _) = crawl(settings, site.clone()).await;

        assert_eq!(results.not_found, links(&["http://site.test/slow"]));
        assert_eq!(site.attempts("http://site.test/slow"), 3);
    }

    #[tokio::test]
    async fn test_ignore_pattern_skips_fetch() {
        let site = Arc::new(FakeSite::new().page(
            "http://site.test/",
            200,
            r#"<a href="/manual.pdf">pdf</a><a href="/page.html">page</a>"#,
        ).page("http://site.test/page.html", 200, ""));
        let settings = CrawlSettings::builder("http://site.test/")
            .ignore(r"\.pdf$")
            .build()
            .unwrap();

        let (results, _) = crawl(settings, site.clone()).await;

        assert_eq!(results.ignored, links(&["http://site.test/manual.pdf"]));
        assert_eq!(site.attempts("http://site.test/manual.pdf"), 0);
        assert!(results.found.contains(&link("http://site.test/page.html")));
    }

    #[tokio::test]
    async fn test_same_origin_outside_base_checked_not_expanded() {
        let site = Arc::new(
            FakeSite::new()
                .page("http://site.test/docs/", 200, r#"<a href="/about.html">about</a>"#)
                .page("http://site.test/about.html", 200, r#"<a href="/team.html">team</a>"#),
        );
        let settings = CrawlSettings::builder("http://site.test/docs/").build().unwrap();

        let (results, _) = crawl(settings, site.clone()).await;

        assert!(results.found.contains(&link("http://site.test/about.html")));
        assert_eq!(site.attempts("http://site.test/team.html"), 0);
    }

    #[tokio::test]
    async fn test_many_workers_fetch_each_link_once() {
        // a ring of 40 pages, every page linking to the next five
        let mut site = FakeSite::new().latency(Duration::from_millis(5));
        for i in 0..40 {
            let body: String = (1..=5)
                .map(|step| format!(r#"<a href="/p{}.html">x</a>"#, (i + step) % 40))
                .collect();
            let url = if i == 0 {
                "http://site.test/".to_string()
            } else {
                format!("http://site.test/p{}.html", i)
            };
            site = site.page(&url, 200, &body);
        }
        let site = Arc::new(site.page("http://site.test/p0.html", 200, ""));
        let settings = CrawlSettings::builder("http://site.test/").threads(8).build().unwrap();

        let (results, snapshot) = crawl(settings, site.clone()).await;

        assert_eq!(results.found.len(), 41);
        assert_eq!(snapshot.total_discovered, 41);
        assert_eq!(snapshot.stats.total(), snapshot.total_discovered);
        assert_eq!(site.max_attempts_per_url(), 1);
        assert_eq!(site.total_requests(), 41);
    }

    #[tokio::test]
    async fn test_snapshot_while_crawling() {
        let site = Arc::new(
            FakeSite::new()
                .latency(Duration::from_millis(100))
                .page("http://site.test/", 200, r#"<a href="/a">a</a>"#),
        );
        let settings = CrawlSettings::builder("http://site.test/").build().unwrap();
        let crawler = Crawler::start_with_transport(settings, site).unwrap();

        let early = crawler.snapshot();
        assert!(early.crawling);
        assert!(!early.crawled);
        assert_eq!(early.total_discovered, 1);

        crawler.wait().await.unwrap();
        let done = crawler.snapshot();
        assert!(done.crawled);
        assert_eq!(done.phase, CrawlPhase::Crawled);
        assert!(done.stats.total() >= early.stats.total());
    }

    #[tokio::test]
    async fn test_stop_aborts_crawl() {
        let body: String = (0..20).map(|i| format!(r#"<a href="/p{}">x</a>"#, i)).collect();
        let site = Arc::new(
            FakeSite::new()
                .latency(Duration::from_millis(100))
                .page("http://site.test/", 200, &body),
        );
        let settings = CrawlSettings::builder("http://site.test/").build().unwrap();
        let crawler = Crawler::start_with_transport(settings, site).unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        crawler.stop();
        let results = tokio::time::timeout(Duration::from_secs(2), crawler.wait())
            .await
            .expect("stop should end the crawl")
            .unwrap();

        let snapshot = crawler.snapshot();
        assert_eq!(snapshot.phase, CrawlPhase::Aborted);
        assert!(snapshot.crawled);
        assert!(snapshot.aborted);
        assert!(snapshot.pending() > 0);
        assert!(results.found.contains(&link("http://site.test/")));
    }

    #[tokio::test]
    async fn test_worker_panic_aborts_crawl_with_error() {
        let body: String = (0..10).map(|i| format!(r#"<a href="/p{}">x</a>"#, i)).collect();
        let mut site = FakeSite::new()
            .latency(Duration::from_millis(20))
            .page("http://site.test/", 200, &body)
            .route("http://site.test/p0", Route::Panic);
        for i in 1..10 {
            site = site.route(&format!("http://site.test/p{}", i), Route::Hang);
        }
        let settings = CrawlSettings::builder("http://site.test/")
            .threads(4)
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        let crawler = Crawler::start_with_transport(settings, Arc::new(site)).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), crawler.wait())
            .await
            .expect("other workers should be released");

        assert!(matches!(outcome, Err(CrawlError::WorkerPool(_))));
        let snapshot = crawler.snapshot();
        assert_eq!(snapshot.phase, CrawlPhase::Aborted);
        assert!(snapshot.aborted);
        assert!(snapshot.crawled);
        assert!(snapshot.pending() > 0);
    }

    #[test]
    fn test_start_needs_a_runtime() {
        let settings = CrawlSettings::builder("http://site.test/").build().unwrap();
        let result = Crawler::start_with_transport(settings, Arc::new(FakeSite::new()));
        assert!(matches!(result, Err(CrawlError::WorkerPool(_))));
    }
}
