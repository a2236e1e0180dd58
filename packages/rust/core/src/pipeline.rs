//! End-to-end scrape pipeline: seed URL → crawl → corpus → JSON file.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use url::Url;

use sitecorpus_crawler::{CrawlObserver, CrawlReport, Crawler, FetchMode};
use sitecorpus_shared::{CrawlConfig, FetchError, Result};

use crate::output;

/// Configuration for one scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Seed URL as given by the user.
    pub seed: String,
    /// Directory the corpus file is written to.
    pub output_dir: PathBuf,
    pub crawl: CrawlConfig,
}

/// Result of a scrape run.
#[derive(Debug)]
pub struct ScrapeResult {
    /// Path of the JSON corpus that was written.
    pub output_path: PathBuf,
    /// The crawl's report, including the corpus itself.
    pub report: CrawlReport,
    /// Total elapsed time, writing included.
    pub elapsed: Duration,
}

/// One page's outcome, as reported to a [`ProgressReporter`].
#[derive(Debug, Clone, Copy)]
pub enum PageEvent<'a> {
    Fetched {
        mode: FetchMode,
        fetched: usize,
        pending: usize,
    },
    Skipped,
    Failed(&'a FetchError),
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per crawled page.
    fn page_done(&self, url: &str, event: PageEvent<'_>);
    /// Called when the pipeline completes.
    fn done(&self, result: &ScrapeResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_done(&self, _url: &str, _event: PageEvent<'_>) {}
    fn done(&self, _result: &ScrapeResult) {}
}

/// Run the full scrape pipeline.
///
/// 1. Crawl from the seed (the browser, if started, is always shut down)
/// 2. Write the corpus to a fresh JSON file in the output directory
///
/// A cancelled crawl still writes whatever was collected.
#[instrument(skip_all, fields(seed = %config.seed))]
pub async fn scrape_site(
    config: &ScrapeConfig,
    cancel: &CancellationToken,
    progress: &dyn ProgressReporter,
) -> Result<ScrapeResult> {
    let start = Instant::now();

    info!(
        seed = %config.seed,
        output_dir = %config.output_dir.display(),
        "starting scrape pipeline"
    );

    // --- Phase 1: Crawl ---
    progress.phase("Crawling");
    let crawler = Crawler::new(config.crawl.clone())?;
    let observer = PipelineCrawlObserver { inner: progress };
    let report = crawler.crawl(&config.seed, cancel, &observer).await;
    crawler.shutdown().await;
    let report = report?;

    // --- Phase 2: Write corpus ---
    progress.phase("Writing corpus");
    let output_path = output::write_corpus(&config.output_dir, &config.seed, &report.corpus)?;

    let result = ScrapeResult {
        output_path,
        report,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        records = result.report.corpus.len(),
        path = %result.output_path.display(),
        elapsed_ms = result.elapsed.as_millis(),
        "scrape pipeline complete"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Crawl observer adapter
// ---------------------------------------------------------------------------

/// Adapts a `ProgressReporter` to the crawler's `CrawlObserver` interface.
struct PipelineCrawlObserver<'a> {
    inner: &'a dyn ProgressReporter,
}

impl CrawlObserver for PipelineCrawlObserver<'_> {
    fn page_fetched(&self, url: &Url, _depth: u32, mode: FetchMode, fetched: usize, pending: usize) {
        self.inner.page_done(
            url.as_str(),
            PageEvent::Fetched {
                mode,
                fetched,
                pending,
            },
        );
    }

    fn page_skipped(&self, url: &Url, _error: &FetchError) {
        self.inner.page_done(url.as_str(), PageEvent::Skipped);
    }

    fn page_failed(&self, url: &Url, error: &FetchError) {
        self.inner.page_done(url.as_str(), PageEvent::Failed(error));
    }
}
