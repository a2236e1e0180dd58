//! Application configuration for SiteCorpus.
//!
//! User config lives at `~/.sitecorpus/sitecorpus.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteCorpusError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitecorpus.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitecorpus";

/// User-Agent sent by both fetch strategies unless overridden.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; SiteCorpus/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

// ---------------------------------------------------------------------------
// Config structs (matching sitecorpus.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Crawl and output defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Headless browser settings.
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory the JSON corpus is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Maximum link distance from the seed.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Follow same-domain links at all.
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Collect image references into each record.
    #[serde(default)]
    pub include_images: bool,

    /// Always render pages in the headless browser.
    #[serde(default)]
    pub dynamic_rendering: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Seconds to let scripts settle after navigation.
    #[serde(default = "default_render_wait")]
    pub render_wait_secs: u64,

    /// User-Agent header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Visible-text length below which a static page is escalated.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Pages fetched concurrently per batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Extra CSS selectors for the content region, tried before `main`.
    #[serde(default)]
    pub content_selectors: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_depth: default_max_depth(),
            recursive: true,
            include_images: false,
            dynamic_rendering: false,
            request_timeout_secs: default_request_timeout(),
            render_wait_secs: default_render_wait(),
            user_agent: default_user_agent(),
            min_content_chars: default_min_content_chars(),
            concurrency: default_concurrency(),
            content_selectors: Vec::new(),
        }
    }
}

fn default_output_dir() -> String {
    ".".into()
}
fn default_max_depth() -> u32 {
    5
}
fn default_true() -> bool {
    true
}
fn default_request_timeout() -> u64 {
    30
}
fn default_render_wait() -> u64 {
    5
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_min_content_chars() -> usize {
    200
}
fn default_concurrency() -> usize {
    1
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Chrome/Chromium executable; auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    /// Run without a visible window.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Viewport width in pixels.
    #[serde(default = "default_window_width")]
    pub window_width: u32,

    /// Viewport height in pixels.
    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Seconds to wait for the browser process to come up.
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,

    /// Maximum simultaneously open browser pages.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            launch_timeout_secs: default_launch_timeout(),
            pool_size: default_pool_size(),
        }
    }
}

fn default_window_width() -> u32 {
    1920
}
fn default_window_height() -> u32 {
    1080
}
fn default_launch_timeout() -> u64 {
    20
}
fn default_pool_size() -> usize {
    2
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime browser options for the rendered fetch strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    /// Chrome/Chromium executable; auto-detected when `None`.
    pub executable: Option<PathBuf>,
    /// Run without a visible window.
    pub headless: bool,
    /// Viewport width in pixels.
    pub window_width: u32,
    /// Viewport height in pixels.
    pub window_height: u32,
    /// Upper bound on browser start-up.
    pub launch_timeout: Duration,
    /// Maximum simultaneously open browser pages.
    pub pool_size: usize,
}

impl From<&BrowserConfig> for BrowserOptions {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            executable: config.executable.as_ref().map(PathBuf::from),
            headless: config.headless,
            window_width: config.window_width,
            window_height: config.window_height,
            launch_timeout: Duration::from_secs(config.launch_timeout_secs),
            pool_size: config.pool_size,
        }
    }
}

/// Runtime crawl configuration — immutable for the lifetime of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    /// Maximum link distance from the seed.
    pub max_depth: u32,
    /// Follow same-domain links at all.
    pub recursive: bool,
    /// Collect image references into each record.
    pub include_images: bool,
    /// Skip the static fetch and always render.
    pub use_dynamic_rendering: bool,
    /// Per-request (and per-navigation) timeout.
    pub request_timeout: Duration,
    /// Settle time after navigation in the browser.
    pub render_wait: Duration,
    /// User-Agent header value.
    pub user_agent: String,
    /// Visible-text length below which a static page is escalated.
    pub min_content_chars: usize,
    /// Pages fetched concurrently per batch.
    pub concurrency: usize,
    /// Site-specific content selectors, highest priority first.
    pub content_selectors: Vec<String>,
    /// Headless browser options.
    pub browser: BrowserOptions,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        let d = &config.defaults;
        Self {
            max_depth: d.max_depth,
            recursive: d.recursive,
            include_images: d.include_images,
            use_dynamic_rendering: d.dynamic_rendering,
            request_timeout: Duration::from_secs(d.request_timeout_secs),
            render_wait: Duration::from_secs(d.render_wait_secs),
            user_agent: d.user_agent.clone(),
            min_content_chars: d.min_content_chars,
            concurrency: d.concurrency,
            content_selectors: d.content_selectors.clone(),
            browser: BrowserOptions::from(&config.browser),
        }
    }
}

impl CrawlConfig {
    /// Effective depth limit: a non-recursive run never leaves the seed.
    pub fn effective_max_depth(&self) -> u32 {
        if self.recursive { self.max_depth } else { 0 }
    }

    /// Reject settings that would stall or misbehave at run time.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(SiteCorpusError::config("concurrency must be at least 1"));
        }
        if self.browser.pool_size == 0 {
            return Err(SiteCorpusError::config("browser pool_size must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(SiteCorpusError::config("request timeout must be non-zero"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(SiteCorpusError::config("user agent must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitecorpus/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SiteCorpusError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitecorpus/sitecorpus.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiteCorpusError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SiteCorpusError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SiteCorpusError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SiteCorpusError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteCorpusError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
