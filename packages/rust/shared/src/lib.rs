//! Shared types, error model, and configuration for SiteCorpus.
//!
//! This crate is the foundation depended on by all other SiteCorpus crates.
//! It provides:
//! - [`SiteCorpusError`] and [`FetchError`] — run-level and per-page errors
//! - Domain types ([`PageRecord`], [`CrawlTask`], [`Corpus`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserConfig, BrowserOptions, CrawlConfig, DEFAULT_USER_AGENT, DefaultsConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{FetchError, Result, SiteCorpusError};
pub use types::{Corpus, CrawlTask, PageRecord};
