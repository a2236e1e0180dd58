//! Breadth-first crawl frontier with a visited set.
//!
//! The frontier is owned by the crawl loop. A URL enters the visited set at
//! the moment it is enqueued, so each normalized URL is handed out at most
//! once per run.

use std::collections::{HashSet, VecDeque};

use url::Url;

use sitecorpus_shared::CrawlTask;

/// Result of offering a URL to the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Enqueued,
    AlreadySeen,
    TooDeep,
}

/// FIFO queue of pending crawl tasks plus the set of URLs ever enqueued.
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<CrawlTask>,
    visited: HashSet<String>,
    max_depth: u32,
    next_seq: u64,
}

impl Frontier {
    /// Start a frontier holding only `seed` at depth 0.
    pub fn new(seed: &Url, max_depth: u32) -> Self {
        let mut frontier = Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            max_depth,
            next_seq: 0,
        };
        frontier.offer(seed, 0);
        frontier
    }

    /// Enqueue `url` at `depth` unless it was seen before or is too deep.
    ///
    /// The task keeps the URL as discovered (minus its fragment); only the
    /// visited-set key is normalized.
    pub fn offer(&mut self, url: &Url, depth: u32) -> Offer {
        if depth > self.max_depth {
            return Offer::TooDeep;
        }

        if !self.visited.insert(normalize_url(url).into()) {
            return Offer::AlreadySeen;
        }

        let mut url = url.clone();
        url.set_fragment(None);

        self.queue.push_back(CrawlTask {
            url,
            depth,
            seq: self.next_seq,
        });
        self.next_seq += 1;
        Offer::Enqueued
    }

    /// Take up to `max` tasks from the front of the queue.
    pub fn next_batch(&mut self, max: usize) -> Vec<CrawlTask> {
        let n = self.queue.len().min(max.max(1));
        self.queue.drain(..n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Tasks still waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// URLs ever enqueued, including those already handed out.
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

/// Normalize a URL for deduplication: no fragment, no trailing slash on
/// non-root paths. Scheme and host case are already folded by the parser.
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let path = normalized.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        normalized.set_path(&trimmed);
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_normalize_url() {
        let normalized = normalize_url(&url("https://docs.example.com/guide/intro#section-1"));
        assert!(!normalized.as_str().contains('#'));
        assert_eq!(normalized.as_str(), "https://docs.example.com/guide/intro");
    }

    #[test]
    fn normalize_drops_trailing_slash_except_root() {
        assert_eq!(
            normalize_url(&url("https://Example.COM/guide/")).as_str(),
            "https://example.com/guide"
        );
        assert_eq!(normalize_url(&url("https://example.com/")).as_str(), "https://example.com/");
        assert_eq!(normalize_url(&url("https://example.com")).as_str(), "https://example.com/");
        assert_eq!(
            normalize_url(&url("https://example.com/a/?q=1#top")).as_str(),
            "https://example.com/a?q=1"
        );
    }

    #[test]
    fn seed_is_enqueued_and_visited() {
        let mut frontier = Frontier::new(&url("https://example.com/"), 2);
        assert_eq!(frontier.pending(), 1);
        assert_eq!(frontier.visited_count(), 1);

        let batch = frontier.next_batch(4);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].depth, 0);
        assert_eq!(batch[0].seq, 0);
        assert!(frontier.is_empty());

        // Already handed out: never again.
        assert_eq!(frontier.offer(&url("https://example.com/#intro"), 1), Offer::AlreadySeen);
    }

    #[test]
    fn equivalent_urls_enqueue_once() {
        let mut frontier = Frontier::new(&url("https://example.com/"), 3);
        assert_eq!(frontier.offer(&url("https://example.com/docs"), 1), Offer::Enqueued);
        assert_eq!(frontier.offer(&url("https://example.com/docs/"), 1), Offer::AlreadySeen);
        assert_eq!(frontier.offer(&url("https://EXAMPLE.com/docs#x"), 2), Offer::AlreadySeen);
        assert_eq!(frontier.pending(), 2);
    }

    #[test]
    fn rejects_tasks_past_max_depth() {
        let mut frontier = Frontier::new(&url("https://example.com/"), 1);
        assert_eq!(frontier.offer(&url("https://example.com/a"), 1), Offer::Enqueued);
        assert_eq!(frontier.offer(&url("https://example.com/b"), 2), Offer::TooDeep);
        assert_eq!(frontier.visited_count(), 2);
    }

    #[test]
    fn batches_are_fifo_with_increasing_seq() {
        let mut frontier = Frontier::new(&url("https://example.com/"), 5);
        for p in ["a", "b", "c"] {
            frontier.offer(&url(&format!("https://example.com/{p}")), 1);
        }

        let first = frontier.next_batch(2);
        let second = frontier.next_batch(2);
        let paths: Vec<_> = first.iter().chain(&second).map(|t| t.url.path().to_string()).collect();
        assert_eq!(paths, ["/", "/a", "/b", "/c"]);

        let seqs: Vec<_> = first.iter().chain(&second).map(|t| t.seq).collect();
        assert_eq!(seqs, [0u64, 1, 2, 3]);
        assert!(frontier.next_batch(2).is_empty());
    }

    #[test]
    fn task_keeps_discovered_form_of_url() {
        let mut frontier = Frontier::new(&url("https://example.com/docs/#top"), 2);
        assert_eq!(frontier.offer(&url("https://example.com/docs"), 1), Offer::AlreadySeen);
        assert_eq!(frontier.offer(&url("https://example.com/docs/intro/"), 1), Offer::Enqueued);

        let urls: Vec<String> = frontier.next_batch(4).into_iter().map(|t| t.url.into()).collect();
        assert_eq!(urls, ["https://example.com/docs/", "https://example.com/docs/intro/"]);
    }
}
