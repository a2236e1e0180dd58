//! Page fetching: static HTTP and rendered-browser strategies, plus the
//! escalation policy that decides when a static result is not good enough.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use sitecorpus_markdown::{ContentRegion, RegionLocator};
use sitecorpus_shared::{CrawlConfig, FetchError, Result, SiteCorpusError};

/// Maximum number of redirects the static strategy follows.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which strategy produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Static,
    Rendered,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("static"),
            Self::Rendered => f.write_str("rendered"),
        }
    }
}

/// Raw HTML as returned by a fetch strategy.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Final URL of the document (after redirects).
    pub url: Url,
    pub html: String,
    pub mode: FetchMode,
}

/// A fetched document together with its located content region.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub document: RawDocument,
    pub region: ContentRegion,
    /// Whether the document came from an escalated (second) attempt.
    pub escalated: bool,
}

/// One way of obtaining raw HTML for a URL.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// The mode tagged onto documents from this strategy.
    fn mode(&self) -> FetchMode;

    /// Fetch `url` once.
    async fn fetch(&self, url: &Url) -> std::result::Result<RawDocument, FetchError>;

    /// Acquire any heavyweight resources up front.
    ///
    /// Errors here are fatal for the run.
    async fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources held for the run.
    async fn shutdown(&self) {}
}

// ---------------------------------------------------------------------------
// Escalation policy
// ---------------------------------------------------------------------------

/// What the static fetch tells us about a page's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentAssessment {
    pub text_len: usize,
    pub is_empty: bool,
}

impl From<&ContentRegion> for ContentAssessment {
    fn from(region: &ContentRegion) -> Self {
        Self {
            text_len: region.text_len,
            is_empty: region.is_empty(),
        }
    }
}

/// Why a page was handed to the rendered strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationReason {
    EmptyRegion,
    BelowThreshold { text_len: usize, min: usize },
    StaticFailure(FetchError),
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRegion => f.write_str("empty content region"),
            Self::BelowThreshold { text_len, min } => {
                write!(f, "{text_len} visible chars, below {min}")
            }
            Self::StaticFailure(e) => write!(f, "static fetch failed: {e}"),
        }
    }
}

/// Outcome of the escalation policy for one static result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Keep the static result as it is, success or failure.
    Accept,
    /// Make one rendered attempt.
    Escalate(EscalationReason),
}

/// Decide whether a static result should be escalated to rendering.
///
/// 404 and 410 are authoritative answers and never escalate.
pub fn decide(
    static_result: std::result::Result<&ContentAssessment, &FetchError>,
    min_content_chars: usize,
) -> Decision {
    match static_result {
        Ok(assessment) if assessment.is_empty => Decision::Escalate(EscalationReason::EmptyRegion),
        Ok(assessment) if assessment.text_len < min_content_chars => {
            Decision::Escalate(EscalationReason::BelowThreshold {
                text_len: assessment.text_len,
                min: min_content_chars,
            })
        }
        Ok(_) => Decision::Accept,
        Err(FetchError::HttpStatus(404 | 410)) => Decision::Accept,
        Err(e) => Decision::Escalate(EscalationReason::StaticFailure(e.clone())),
    }
}

// ---------------------------------------------------------------------------
// Static strategy
// ---------------------------------------------------------------------------

/// Plain HTTP GET via `reqwest`.
pub struct StaticFetcher {
    client: Client,
}

impl StaticFetcher {
    /// Build the HTTP client for one run.
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SiteCorpusError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Unreachable(e.to_string())
    }
}

#[async_trait]
impl FetchStrategy for StaticFetcher {
    fn mode(&self) -> FetchMode {
        FetchMode::Static
    }

    async fn fetch(&self, url: &Url) -> std::result::Result<RawDocument, FetchError> {
        debug!(%url, "static fetch");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let final_url = response.url().clone();
        let html = response.text().await.map_err(classify_reqwest_error)?;

        Ok(RawDocument {
            url: final_url,
            html,
            mode: FetchMode::Static,
        })
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Combines a static and a rendered strategy under the escalation policy.
pub struct Fetcher {
    static_strategy: Arc<dyn FetchStrategy>,
    rendered_strategy: Arc<dyn FetchStrategy>,
    locator: RegionLocator,
    min_content_chars: usize,
    always_render: bool,
    escalations: AtomicUsize,
}

impl Fetcher {
    pub fn new(
        config: &CrawlConfig,
        static_strategy: Arc<dyn FetchStrategy>,
        rendered_strategy: Arc<dyn FetchStrategy>,
    ) -> Self {
        Self {
            static_strategy,
            rendered_strategy,
            locator: RegionLocator::default(),
            min_content_chars: config.min_content_chars,
            always_render: config.use_dynamic_rendering,
            escalations: AtomicUsize::new(0),
        }
    }

    /// Replace the region locator used to assess and extract content.
    pub fn with_locator(mut self, locator: RegionLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Number of escalated attempts made so far.
    pub fn escalations(&self) -> usize {
        self.escalations.load(Ordering::Relaxed)
    }

    /// Start the rendered strategy ahead of the first page.
    pub async fn warm_up(&self) -> Result<()> {
        self.rendered_strategy.warm_up().await
    }

    /// Release both strategies.
    pub async fn shutdown(&self) {
        self.static_strategy.shutdown().await;
        self.rendered_strategy.shutdown().await;
    }

    /// Fetch `url`, escalating to the rendered strategy at most once.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> std::result::Result<FetchOutcome, FetchError> {
        if self.always_render {
            return self.fetch_rendered(url, false).await;
        }

        let static_result = attempt(self.static_strategy.as_ref(), url).await.map(|document| {
            let region = self.locator.sanitize(&document.html);
            (document, region)
        });

        let assessment = static_result
            .as_ref()
            .map(|(_, region)| ContentAssessment::from(region));

        match decide(assessment.as_ref().map_err(|e| *e), self.min_content_chars) {
            Decision::Accept => static_result.map(|(document, region)| FetchOutcome {
                document,
                region,
                escalated: false,
            }),
            Decision::Escalate(reason) => {
                info!(%url, %reason, "escalating to rendered fetch");
                self.escalations.fetch_add(1, Ordering::Relaxed);
                self.fetch_rendered(url, true).await
            }
        }
    }

    async fn fetch_rendered(
        &self,
        url: &Url,
        escalated: bool,
    ) -> std::result::Result<FetchOutcome, FetchError> {
        let document = attempt(self.rendered_strategy.as_ref(), url).await?;
        let region = self.locator.sanitize(&document.html);

        // The browser's view is final: anything with content is kept.
        if region.is_empty() {
            debug!(%url, "rendered document has no content");
            return Err(FetchError::InsufficientContent);
        }

        Ok(FetchOutcome {
            document,
            region,
            escalated,
        })
    }
}

/// One fetch through `strategy`, logged under the strategy's mode.
async fn attempt(
    strategy: &dyn FetchStrategy,
    url: &Url,
) -> std::result::Result<RawDocument, FetchError> {
    let mode = strategy.mode();
    match strategy.fetch(url).await {
        Ok(document) => {
            debug!(%url, %mode, bytes = document.html.len(), "document fetched");
            Ok(document)
        }
        Err(e) => {
            debug!(%url, %mode, error = %e, "fetch attempt failed");
            Err(e)
        }
    }
}
