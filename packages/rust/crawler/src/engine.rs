//! Breadth-first, depth-bounded crawler engine.
//!
//! The crawler starts from a seed URL, pulls tasks from the [`Frontier`] in
//! FIFO batches, fetches each batch concurrently through the [`Fetcher`],
//! converts every page to Markdown and expands same-host links until the
//! frontier is exhausted or the run is cancelled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use sitecorpus_markdown::{ConvertOptions, RegionLocator, SelectorStrategy, to_structured_text};
use sitecorpus_shared::{
    Corpus, CrawlConfig, CrawlTask, FetchError, PageRecord, Result, SiteCorpusError,
};

use crate::extract::{self, same_host};
use crate::fetcher::{FetchMode, FetchOutcome, FetchStrategy, Fetcher, StaticFetcher};
use crate::frontier::{Frontier, Offer};
use crate::render::RenderedFetcher;

// ---------------------------------------------------------------------------
// CrawlReport
// ---------------------------------------------------------------------------

/// Summary and output of a completed (or cancelled) crawl.
#[derive(Debug)]
pub struct CrawlReport {
    /// Records in breadth-first discovery order.
    pub corpus: Corpus,
    /// Pages that produced a record.
    pub pages_fetched: usize,
    /// Pages dropped for lack of content.
    pub pages_skipped: usize,
    /// Pages that could not be fetched.
    pub failures: Vec<(Url, FetchError)>,
    /// Pages handed to the rendered strategy after a static attempt.
    pub escalations: usize,
    pub duration: Duration,
    /// Whether the run stopped early on request.
    pub cancelled: bool,
}

/// Receives per-page outcomes while a crawl runs.
pub trait CrawlObserver: Send + Sync {
    /// A record was produced for `url`. `pending` is the current queue length.
    fn page_fetched(&self, url: &Url, depth: u32, mode: FetchMode, fetched: usize, pending: usize);
    /// `url` had no usable content.
    fn page_skipped(&self, url: &Url, error: &FetchError);
    /// `url` could not be fetched.
    fn page_failed(&self, url: &Url, error: &FetchError);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl CrawlObserver for NoopObserver {
    fn page_fetched(&self, _: &Url, _: u32, _: FetchMode, _: usize, _: usize) {}
    fn page_skipped(&self, _: &Url, _: &FetchError) {}
    fn page_failed(&self, _: &Url, _: &FetchError) {}
}

/// What one task produced.
struct PageOutput {
    record: PageRecord,
    links: Vec<Url>,
    mode: FetchMode,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Per-run crawler. Owns the HTTP client and the browser session.
pub struct Crawler {
    config: CrawlConfig,
    fetcher: Fetcher,
}

impl Crawler {
    /// Create a crawler with the production static and rendered strategies.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let static_strategy = Arc::new(StaticFetcher::new(&config)?);
        let rendered_strategy = Arc::new(RenderedFetcher::new(&config));
        Self::with_strategies(config, static_strategy, rendered_strategy)
    }

    /// Create a crawler with caller-supplied fetch strategies.
    pub fn with_strategies(
        config: CrawlConfig,
        static_strategy: Arc<dyn FetchStrategy>,
        rendered_strategy: Arc<dyn FetchStrategy>,
    ) -> Result<Self> {
        config.validate()?;
        let locator = region_locator(&config.content_selectors)?;
        debug!(strategies = ?locator.strategy_names(), "content region strategies");
        let fetcher =
            Fetcher::new(&config, static_strategy, rendered_strategy).with_locator(locator);
        Ok(Self { config, fetcher })
    }

    /// Crawl from `seed` until the frontier is empty or `cancel` fires.
    ///
    /// Only an invalid seed, or a browser that cannot start when rendering
    /// is mandatory, fails the run. Per-page errors land in the report.
    #[instrument(skip_all, fields(seed = %seed))]
    pub async fn crawl(
        &self,
        seed: &str,
        cancel: &CancellationToken,
        observer: &dyn CrawlObserver,
    ) -> Result<CrawlReport> {
        let start = Instant::now();
        let seed_url = parse_seed(seed)?;

        if self.config.use_dynamic_rendering {
            self.fetcher.warm_up().await?;
        }

        let max_depth = self.config.effective_max_depth();
        let escalations_before = self.fetcher.escalations();
        let mut frontier = Frontier::new(&seed_url, max_depth);
        let mut corpus = Corpus::new();
        let mut pages_skipped = 0;
        let mut failures = Vec::new();
        let mut cancelled = false;

        info!(
            max_depth,
            recursive = self.config.recursive,
            concurrency = self.config.concurrency,
            dynamic = self.config.use_dynamic_rendering,
            "starting crawl"
        );

        loop {
            if cancel.is_cancelled() {
                info!(pending = frontier.pending(), "crawl cancelled");
                cancelled = true;
                break;
            }

            if frontier.is_empty() {
                break;
            }
            let batch = frontier.next_batch(self.config.concurrency);

            let results = join_all(batch.iter().map(|task| self.process(task))).await;

            // Batches leave the frontier in seq order and join_all keeps it.
            for (task, result) in batch.into_iter().zip(results) {
                match result {
                    Ok(page) => {
                        if task.depth < max_depth {
                            self.expand(&mut frontier, &seed_url, &task, &page.links);
                        }
                        corpus.push(page.record);
                        observer.page_fetched(
                            &task.url,
                            task.depth,
                            page.mode,
                            corpus.len(),
                            frontier.pending(),
                        );
                    }
                    Err(e) if e.is_skip() => {
                        debug!(url = %task.url, "no usable content, skipping");
                        pages_skipped += 1;
                        observer.page_skipped(&task.url, &e);
                    }
                    Err(e) => {
                        warn!(url = %task.url, depth = task.depth, error = %e, "page failed");
                        observer.page_failed(&task.url, &e);
                        failures.push((task.url, e));
                    }
                }
            }
        }

        let report = CrawlReport {
            pages_fetched: corpus.len(),
            corpus,
            pages_skipped,
            failures,
            escalations: self.fetcher.escalations() - escalations_before,
            duration: start.elapsed(),
            cancelled,
        };

        info!(
            urls_seen = frontier.visited_count(),
            pages_fetched = report.pages_fetched,
            pages_skipped = report.pages_skipped,
            failures = report.failures.len(),
            escalations = report.escalations,
            duration_ms = report.duration.as_millis(),
            cancelled = report.cancelled,
            "crawl completed"
        );

        Ok(report)
    }

    /// Close the browser session, if one was started.
    pub async fn shutdown(&self) {
        self.fetcher.shutdown().await;
    }

    /// Fetch, convert and scan one task.
    async fn process(&self, task: &CrawlTask) -> std::result::Result<PageOutput, FetchError> {
        debug!(url = %task.url, depth = task.depth, seq = task.seq, "fetching page");

        let outcome = self.fetcher.fetch(&task.url).await?;
        self.build_page(task, outcome)
    }

    fn build_page(
        &self,
        task: &CrawlTask,
        outcome: FetchOutcome,
    ) -> std::result::Result<PageOutput, FetchError> {
        let include_images = self.config.include_images;
        let opts = ConvertOptions::for_page(&outcome.document.url, include_images);

        let content = match to_structured_text(&outcome.region, &opts) {
            Ok(content) => content,
            Err(e) => {
                warn!(url = %task.url, error = %e, "conversion failed, skipping page");
                return Err(FetchError::InsufficientContent);
            }
        };

        if content.is_empty() {
            debug!(url = %task.url, "converted content is empty");
            return Err(FetchError::InsufficientContent);
        }

        let discovered =
            extract::discover(&outcome.document.html, &outcome.document.url, include_images);

        Ok(PageOutput {
            record: PageRecord::new(&task.url, content, discovered.images),
            links: discovered.links,
            mode: outcome.document.mode,
        })
    }

    fn expand(&self, frontier: &mut Frontier, seed: &Url, parent: &CrawlTask, links: &[Url]) {
        let mut enqueued = 0;
        for link in links.iter().filter(|l| same_host(l, seed)) {
            if frontier.offer(link, parent.depth + 1) == Offer::Enqueued {
                enqueued += 1;
            }
        }
        debug!(url = %parent.url, found = links.len(), enqueued, "links expanded");
    }
}

/// Default region strategies, preceded by any configured selectors in order.
fn region_locator(selectors: &[String]) -> Result<RegionLocator> {
    let mut locator = RegionLocator::new();
    for css in selectors.iter().rev() {
        locator = locator.with_priority_strategy(SelectorStrategy::new(css)?);
    }
    Ok(locator)
}

/// Parse the seed and require an absolute http(s) URL.
fn parse_seed(seed: &str) -> Result<Url> {
    let url = Url::parse(seed.trim())
        .map_err(|e| SiteCorpusError::invalid_url(seed, e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SiteCorpusError::invalid_url(
            seed,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(SiteCorpusError::invalid_url(seed, "missing host"));
    }

    Ok(url)
}
