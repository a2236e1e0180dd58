//! CLI definition, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sitecorpus_core::{PageEvent, ProgressReporter, ScrapeConfig, ScrapeResult, scrape_site};
use sitecorpus_shared::{AppConfig, CrawlConfig, init_config, load_config, load_config_from};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SiteCorpus — turn a website into a structured Markdown corpus.
#[derive(Parser)]
#[command(
    name = "sitecorpus",
    version,
    about = "Crawl a website and save its pages as a JSON corpus of Markdown records.",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
pub(crate) struct Cli {
    /// Seed URL to crawl.
    pub url: Option<String>,

    #[command(flatten)]
    pub crawl: CrawlArgs,

    /// Config file to use instead of ~/.sitecorpus/sitecorpus.toml.
    #[arg(long, global = true, env = "SITECORPUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Crawl options; each one overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct CrawlArgs {
    /// Maximum link distance from the seed.
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Only extract the seed page.
    #[arg(long)]
    pub no_recursive: bool,

    /// Collect image URLs into each record.
    #[arg(long)]
    pub include_images: bool,

    /// Render every page in a headless browser.
    #[arg(long)]
    pub dynamic: bool,

    /// Per-request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Seconds to let scripts settle after navigation.
    #[arg(long, value_name = "SECS")]
    pub render_wait: Option<u64>,

    /// User-Agent header value.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Visible-text length below which a static page is rendered instead.
    #[arg(long)]
    pub min_content_chars: Option<usize>,

    /// Pages fetched concurrently.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// CSS selector for the content region, tried before main/article/body.
    /// Repeat to give several, highest priority first.
    #[arg(long = "content-selector", value_name = "CSS")]
    pub content_selectors: Vec<String>,

    /// Output directory for the JSON corpus.
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitecorpus=info",
        1 => "sitecorpus=debug",
        _ => "sitecorpus=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Command::Config { action }) => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_ref()),
        },
        None => {
            let url = cli
                .url
                .ok_or_else(|| eyre!("no URL given; run `sitecorpus --help` for usage"))?;
            cmd_scrape(&url, &cli.crawl, cli.config.as_ref()).await
        }
    }
}

fn load_app_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Merge config file values with command-line overrides.
fn build_scrape_config(url: &str, args: &CrawlArgs, app: &AppConfig) -> Result<ScrapeConfig> {
    let mut crawl = CrawlConfig::from(app);

    if let Some(depth) = args.max_depth {
        crawl.max_depth = depth;
    }
    if args.no_recursive {
        crawl.recursive = false;
    }
    if args.include_images {
        crawl.include_images = true;
    }
    if args.dynamic {
        crawl.use_dynamic_rendering = true;
    }
    if let Some(secs) = args.timeout {
        crawl.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.render_wait {
        crawl.render_wait = Duration::from_secs(secs);
    }
    if let Some(ua) = &args.user_agent {
        crawl.user_agent = ua.clone();
    }
    if let Some(min) = args.min_content_chars {
        crawl.min_content_chars = min;
    }
    if let Some(n) = args.concurrency {
        crawl.concurrency = n;
    }
    if !args.content_selectors.is_empty() {
        crawl.content_selectors = args.content_selectors.clone();
    }
    crawl.validate()?;

    let output_dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&app.defaults.output_dir));

    Ok(ScrapeConfig {
        seed: url.to_string(),
        output_dir,
        crawl,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_scrape(url: &str, args: &CrawlArgs, config_path: Option<&PathBuf>) -> Result<()> {
    let app = load_app_config(config_path)?;
    let config = build_scrape_config(url, args, &app)?;

    info!(
        url,
        max_depth = config.crawl.max_depth,
        recursive = config.crawl.recursive,
        dynamic = config.crawl.use_dynamic_rendering,
        "extracting site"
    );

    // Ctrl-C stops the crawl; whatever was collected is still written.
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing in-flight pages");
            ctrl_c_token.cancel();
        }
    });

    let reporter = CliProgress::new();
    let result = scrape_site(&config, &cancel, &reporter).await;
    reporter.spinner.finish_and_clear();
    let result = result?;

    print_summary(&result);
    Ok(())
}

fn print_summary(result: &ScrapeResult) {
    let report = &result.report;

    println!();
    println!(
        "  ✓ Saved {} page(s) to: {}",
        report.corpus.len(),
        result.output_path.display()
    );
    println!("  Skipped:     {}", report.pages_skipped);
    println!("  Failed:      {}", report.failures.len());
    println!("  Escalated:   {}", report.escalations);
    println!("  Time:        {:.1}s", result.elapsed.as_secs_f64());
    if report.cancelled {
        println!("  (interrupted: corpus is partial)");
    }
    for (url, error) in &report.failures {
        println!("  ✗ {url}: {error}");
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_done(&self, url: &str, event: PageEvent<'_>) {
        match event {
            PageEvent::Fetched {
                mode,
                fetched,
                pending,
            } => {
                self.spinner
                    .set_message(format!("[{fetched} done, {pending} queued] {url} ({mode})"));
            }
            PageEvent::Skipped => {
                self.spinner.println(format!("  - skipped (no content): {url}"));
            }
            PageEvent::Failed(error) => {
                self.spinner.println(format!("  ✗ {url}: {error}"));
            }
        }
    }

    fn done(&self, _result: &ScrapeResult) {
        self.spinner.finish_and_clear();
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&PathBuf>) -> Result<()> {
    let config = load_app_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
