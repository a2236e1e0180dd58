//! Fetching, link discovery, and the crawl loop.
//!
//! This crate provides:
//! - [`fetcher`] — static and rendered fetch strategies and the escalation policy
//! - [`render`] — the headless-browser strategy
//! - [`extract`] — same-host link and image discovery
//! - [`frontier`] — the breadth-first queue and visited set
//! - [`engine`] — the [`Crawler`] that ties them together

pub mod engine;
pub mod extract;
pub mod fetcher;
pub mod frontier;
pub mod render;

pub use engine::{CrawlObserver, CrawlReport, Crawler, NoopObserver};
pub use extract::{Discovered, discover, same_host};
pub use fetcher::{
    ContentAssessment, Decision, EscalationReason, FetchMode, FetchOutcome, FetchStrategy,
    Fetcher, RawDocument, StaticFetcher, decide,
};
pub use frontier::{Frontier, Offer, normalize_url};
pub use render::RenderedFetcher;
