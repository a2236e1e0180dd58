//! Pipeline orchestration and corpus output for SiteCorpus.
//!
//! This crate ties the crawler to the filesystem: it runs a crawl end to end
//! (`scrape_site`) and writes the resulting corpus under a collision-safe name.

pub mod output;
pub mod pipeline;

pub use output::{FALLBACK_STEM, sanitize_filename, unique_output_path, write_corpus};
pub use pipeline::{PageEvent, ProgressReporter, ScrapeConfig, ScrapeResult, SilentProgress, scrape_site};
