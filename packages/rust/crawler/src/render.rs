//! Rendered fetch strategy backed by headless Chromium (`chromiumoxide`).
//!
//! One browser process serves a whole run. It is launched on first use (or
//! up front via [`FetchStrategy::warm_up`]) and closed by
//! [`FetchStrategy::shutdown`]. Open pages are capped by a semaphore, and
//! every page is closed on every exit path through [`PageGuard`].

use std::ops::Deref;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use url::Url;

use sitecorpus_shared::{BrowserOptions, CrawlConfig, FetchError, Result, SiteCorpusError};

use crate::fetcher::{FetchMode, FetchStrategy, RawDocument};

// ---------------------------------------------------------------------------
// PageGuard
// ---------------------------------------------------------------------------

/// Closes its page when dropped, unless it was closed explicitly first.
struct PageGuard {
    page: Page,
    url: String,
    closed: bool,
    runtime: tokio::runtime::Handle,
}

impl PageGuard {
    fn new(page: Page, url: &Url) -> Self {
        Self {
            page,
            url: url.to_string(),
            closed: false,
            runtime: tokio::runtime::Handle::current(),
        }
    }

    /// Close the page now and wait for the browser to confirm.
    async fn close(mut self) {
        self.closed = true;
        match self.page.clone().close().await {
            Ok(()) => trace!(url = %self.url, "page closed"),
            Err(e) => warn!(url = %self.url, error = %e, "failed to close page"),
        }
    }
}

impl Deref for PageGuard {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.page
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let page = self.page.clone();
        let url = std::mem::take(&mut self.url);
        self.runtime.spawn(async move {
            if let Err(e) = page.close().await {
                warn!(%url, error = %e, "page cleanup on drop failed");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// RenderedFetcher
// ---------------------------------------------------------------------------

struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Fetches pages through a headless browser so client-side scripts run.
pub struct RenderedFetcher {
    options: BrowserOptions,
    user_agent: String,
    request_timeout: Duration,
    render_wait: Duration,
    session: RwLock<Option<BrowserSession>>,
    pages: Semaphore,
}

impl RenderedFetcher {
    /// Prepare a fetcher; no browser is started until it is needed.
    pub fn new(config: &CrawlConfig) -> Self {
        Self {
            options: config.browser.clone(),
            user_agent: config.user_agent.clone(),
            request_timeout: config.request_timeout,
            render_wait: config.render_wait,
            session: RwLock::new(None),
            pages: Semaphore::new(config.browser.pool_size.max(1)),
        }
    }

    /// Whether a browser process is currently running.
    pub async fn is_running(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn ensure_browser(&self) -> Result<()> {
        if self.is_running().await {
            return Ok(());
        }

        let mut session = self.session.write().await;
        if session.is_none() {
            *session = Some(self.launch().await?);
        }
        Ok(())
    }

    async fn launch(&self) -> Result<BrowserSession> {
        let config = browser_config(&self.options, &self.user_agent, self.request_timeout)
            .map_err(|e| SiteCorpusError::Render(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SiteCorpusError::Render(format!("failed to launch browser: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!(error = %e, "browser handler event error");
                }
            }
        });

        info!(
            headless = self.options.headless,
            pool_size = self.options.pool_size,
            "browser launched"
        );

        Ok(BrowserSession { browser, handler })
    }
}

fn render_failure(e: impl std::fmt::Display) -> FetchError {
    FetchError::RenderFailure(e.to_string())
}

/// Translate run options into a `chromiumoxide` launch config.
fn browser_config(
    options: &BrowserOptions,
    user_agent: &str,
    request_timeout: Duration,
) -> std::result::Result<BrowserConfig, String> {
    let mut builder = BrowserConfig::builder()
        .window_size(options.window_width, options.window_height)
        .launch_timeout(options.launch_timeout)
        .request_timeout(request_timeout)
        .arg(format!("--user-agent={user_agent}"));

    if !options.headless {
        builder = builder.with_head();
    }
    if let Some(executable) = &options.executable {
        builder = builder.chrome_executable(executable);
    }

    builder.build()
}

#[async_trait]
impl FetchStrategy for RenderedFetcher {
    fn mode(&self) -> FetchMode {
        FetchMode::Rendered
    }

    async fn fetch(&self, url: &Url) -> std::result::Result<RawDocument, FetchError> {
        self.ensure_browser().await.map_err(render_failure)?;

        let _permit = self
            .pages
            .acquire()
            .await
            .map_err(|_| render_failure("page pool closed"))?;

        let session = self.session.read().await;
        let Some(session) = session.as_ref() else {
            return Err(render_failure("browser already shut down"));
        };

        debug!(%url, "rendered fetch");

        let page = session
            .browser
            .new_page("about:blank")
            .await
            .map_err(render_failure)?;
        let page = PageGuard::new(page, url);

        match tokio::time::timeout(self.request_timeout, page.goto(url.as_str())).await {
            Err(_) => return Err(FetchError::Timeout),
            Ok(Err(e)) => return Err(render_failure(e)),
            Ok(Ok(_)) => {}
        }

        tokio::time::sleep(self.render_wait).await;

        let html = page.content().await.map_err(render_failure)?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        page.close().await;

        Ok(RawDocument {
            url: final_url,
            html,
            mode: FetchMode::Rendered,
        })
    }

    async fn warm_up(&self) -> Result<()> {
        self.ensure_browser().await
    }

    async fn shutdown(&self) {
        let Some(mut session) = self.session.write().await.take() else {
            return;
        };

        if let Err(e) = session.browser.close().await {
            warn!(error = %e, "failed to close browser");
        }
        if let Err(e) = session.browser.wait().await {
            debug!(error = %e, "browser process did not exit cleanly");
        }
        session.handler.abort();

        info!("browser shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_with_executable(path: &str) -> BrowserOptions {
        BrowserOptions {
            executable: Some(path.into()),
            launch_timeout: Duration::from_secs(2),
            ..CrawlConfig::default().browser
        }
    }

    #[test]
    fn browser_config_accepts_explicit_executable() {
        let options = options_with_executable("/opt/chromium/chrome");
        let config = browser_config(&options, "TestAgent/1.0", Duration::from_secs(10));
        assert!(config.is_ok());
    }

    #[tokio::test]
    async fn browser_is_not_started_eagerly() {
        let fetcher = RenderedFetcher::new(&CrawlConfig::default());
        assert!(!fetcher.is_running().await);
        assert_eq!(fetcher.mode(), FetchMode::Rendered);

        // Nothing to close yet.
        fetcher.shutdown().await;
        assert!(!fetcher.is_running().await);
    }

    #[tokio::test]
    async fn missing_browser_is_render_error() {
        let config = CrawlConfig {
            browser: options_with_executable("/nonexistent/sitecorpus-test/chrome"),
            ..CrawlConfig::default()
        };
        let fetcher = RenderedFetcher::new(&config);

        let err = fetcher.warm_up().await.unwrap_err();
        assert!(matches!(err, SiteCorpusError::Render(_)), "got {err:?}");
        assert!(!fetcher.is_running().await);
    }

    #[tokio::test]
    async fn missing_browser_fails_fetch_as_render_failure() {
        let config = CrawlConfig {
            browser: options_with_executable("/nonexistent/sitecorpus-test/chrome"),
            ..CrawlConfig::default()
        };
        let fetcher = RenderedFetcher::new(&config);
        let url = Url::parse("https://example.com/").unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::RenderFailure(_)), "got {err:?}");
    }
}
