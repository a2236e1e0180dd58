//! Core domain types for SiteCorpus runs.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

// ---------------------------------------------------------------------------
// PageRecord
// ---------------------------------------------------------------------------

/// One extracted page in the output corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Absolute URL the page was fetched from.
    pub url: String,
    /// Cleaned Markdown content of the page's content region.
    pub content: String,
    /// Absolute image URLs, in order of first appearance.
    #[serde(default)]
    pub images: Vec<String>,
}

impl PageRecord {
    /// Build a record for `url` with the given content and images.
    pub fn new(url: &Url, content: String, images: Vec<String>) -> Self {
        Self {
            url: url.to_string(),
            content,
            images,
        }
    }
}

// ---------------------------------------------------------------------------
// CrawlTask
// ---------------------------------------------------------------------------

/// A unit of crawl work drawn from the frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// URL to fetch.
    pub url: Url,
    /// Link distance from the seed (seed = 0).
    pub depth: u32,
    /// Sequence number assigned at enqueue time.
    pub seq: u64,
}

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

/// Append-only, ordered collection of page records for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    records: Vec<PageRecord>,
}

impl Corpus {
    /// Create an empty corpus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record at the end.
    pub fn push(&mut self, record: PageRecord) {
        self.records.push(record);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the corpus holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in corpus order.
    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }

    /// Iterate records in corpus order.
    pub fn iter(&self) -> std::slice::Iter<'_, PageRecord> {
        self.records.iter()
    }

    /// Serialize as a pretty-printed JSON array.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a JSON array of page records.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a PageRecord;
    type IntoIter = std::slice::Iter<'a, PageRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
