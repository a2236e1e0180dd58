//! Boilerplate removal and content-region location.
//!
//! Boilerplate elements are detached from the parsed tree before any region is
//! chosen, so nothing inside them can leak into the converted output. Region
//! strategies are tried in priority order; the first non-empty match wins.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use sitecorpus_shared::{Result, SiteCorpusError};

/// Tags removed from every document before extraction.
pub const BOILERPLATE_TAGS: [&str; 5] = ["script", "style", "nav", "header", "footer"];

/// Tags whose text a browser never shows and the converter never emits.
pub const HIDDEN_TAGS: [&str; 4] = ["noscript", "template", "iframe", "svg"];

/// Strategy name reported when no candidate matched.
pub const DOCUMENT_FALLBACK: &str = "document";

static BOILERPLATE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    let tags: Vec<&str> = BOILERPLATE_TAGS.iter().chain(&HIDDEN_TAGS).copied().collect();
    Selector::parse(&tags.join(", ")).expect("valid selector")
});

static HEAD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("head").expect("valid selector"));

static IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid selector"));

// ---------------------------------------------------------------------------
// ContentRegion
// ---------------------------------------------------------------------------

/// The part of a sanitized document judged to hold the primary content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRegion {
    /// Inner HTML of the region (boilerplate already removed).
    pub html: String,
    /// Visible text length in characters, whitespace runs collapsed.
    pub text_len: usize,
    /// Number of `<img>` elements inside the region.
    pub image_count: usize,
    /// Name of the strategy that selected this region.
    pub strategy: String,
}

impl ContentRegion {
    fn from_element(el: ElementRef<'_>, strategy: &str) -> Self {
        Self {
            html: el.inner_html(),
            text_len: visible_text_len(el),
            image_count: el.select(&IMG_SEL).count(),
            strategy: strategy.to_string(),
        }
    }

    /// Whether the region holds neither text nor images.
    pub fn is_empty(&self) -> bool {
        self.text_len == 0 && self.image_count == 0
    }
}

/// Character count of an element's text with whitespace runs collapsed to one space.
fn visible_text_len(el: ElementRef<'_>) -> usize {
    let mut len = 0usize;
    let mut words = 0usize;
    for text in el.text() {
        for word in text.split_whitespace() {
            len += word.chars().count();
            words += 1;
        }
    }
    len + words.saturating_sub(1)
}

fn has_content(el: ElementRef<'_>) -> bool {
    el.text().any(|t| !t.trim().is_empty()) || el.select(&IMG_SEL).next().is_some()
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// One way of locating the content region in a sanitized document.
///
/// Strategies are tried in priority order by [`RegionLocator`].
pub trait RegionStrategy: Send + Sync {
    /// Human-readable name for tracing.
    fn name(&self) -> &str;

    /// Return the region element, or `None` if this strategy does not apply.
    fn locate<'a>(&self, doc: &'a Html) -> Option<ElementRef<'a>>;
}

/// Matches the first non-empty element for a CSS selector.
pub struct SelectorStrategy {
    name: String,
    selector: Selector,
}

impl SelectorStrategy {
    /// Build a strategy from a CSS selector; the selector doubles as its name.
    pub fn new(css: &str) -> Result<Self> {
        let selector = Selector::parse(css)
            .map_err(|e| SiteCorpusError::config(format!("invalid selector '{css}': {e}")))?;
        Ok(Self {
            name: css.to_string(),
            selector,
        })
    }
}

impl RegionStrategy for SelectorStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn locate<'a>(&self, doc: &'a Html) -> Option<ElementRef<'a>> {
        doc.select(&self.selector).find(|el| has_content(*el))
    }
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// Holds region strategies in priority order.
pub struct RegionLocator {
    strategies: Vec<Box<dyn RegionStrategy>>,
}

impl RegionLocator {
    /// `main`, then `article`, then `body`.
    pub fn new() -> Self {
        let strategies = ["main", "article", "body"]
            .into_iter()
            .map(|css| {
                Box::new(SelectorStrategy::new(css).expect("valid selector"))
                    as Box<dyn RegionStrategy>
            })
            .collect();
        Self { strategies }
    }

    /// Add a strategy that is tried before all existing ones.
    pub fn with_priority_strategy(mut self, strategy: impl RegionStrategy + 'static) -> Self {
        self.strategies.insert(0, Box::new(strategy));
        self
    }

    /// Add a strategy that is tried after all existing ones.
    pub fn with_fallback_strategy(mut self, strategy: impl RegionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Strategy names in the order they are tried.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Strip boilerplate from `html` and locate its content region.
    pub fn sanitize(&self, html: &str) -> ContentRegion {
        let mut doc = Html::parse_document(html);
        detach_matching(&mut doc, &BOILERPLATE_SEL);

        for strategy in &self.strategies {
            if let Some(el) = strategy.locate(&doc) {
                let region = ContentRegion::from_element(el, strategy.name());
                debug!(
                    strategy = strategy.name(),
                    text_len = region.text_len,
                    "content region located"
                );
                return region;
            }
        }

        // Nothing matched: the whole cleaned document, minus <head>.
        detach_matching(&mut doc, &HEAD_SEL);
        let region = ContentRegion::from_element(doc.root_element(), DOCUMENT_FALLBACK);
        debug!(text_len = region.text_len, "no region strategy matched, using document");
        region
    }
}

impl Default for RegionLocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Detach every element matching `selector` from the tree.
fn detach_matching(doc: &mut Html, selector: &Selector) {
    let ids: Vec<_> = doc.select(selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Sanitize with the default strategy order (main > article > body).
pub fn sanitize(html: &str) -> ContentRegion {
    static DEFAULT_LOCATOR: LazyLock<RegionLocator> = LazyLock::new(RegionLocator::new);
    DEFAULT_LOCATOR.sanitize(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_boilerplate_by_tag() {
        let html = r#"<html><body>
            <header>Site Header</header>
            <nav><a href="/">Home</a></nav>
            <p>Real text.</p>
            <style>.x { color: red }</style>
            <footer>Copyright 2024</footer>
        </body></html>"#;
        let region = sanitize(html);
        assert_eq!(region.strategy, "body");
        assert!(region.html.contains("Real text."));
        assert!(!region.html.contains("Site Header"));
        assert!(!region.html.contains("Home"));
        assert!(!region.html.contains("color: red"));
        assert!(!region.html.contains("Copyright"));
    }

    #[test]
    fn main_beats_article_beats_body() {
        let html = r#"<html><body>
            <p>Body text</p>
            <article><p>Article text</p></article>
            <main><p>Main text</p></main>
        </body></html>"#;
        let region = sanitize(html);
        assert_eq!(region.strategy, "main");
        assert!(region.html.contains("Main text"));
        assert!(!region.html.contains("Article text"));

        let html = r#"<html><body><p>Body text</p><article><p>Article text</p></article></body></html>"#;
        let region = sanitize(html);
        assert_eq!(region.strategy, "article");
        assert!(!region.html.contains("Body text"));
    }

    #[test]
    fn empty_main_falls_through() {
        let html = r#"<html><body><main>   </main><article><p>Article wins</p></article></body></html>"#;
        let region = sanitize(html);
        assert_eq!(region.strategy, "article");
    }

    #[test]
    fn main_emptied_by_stripping_falls_through() {
        let html = r#"<html><body>
            <main><script>render()</script><nav>Menu</nav></main>
            <p>Fallback body text</p>
        </body></html>"#;
        let region = sanitize(html);
        assert_eq!(region.strategy, "body");
        assert!(region.html.contains("Fallback body text"));
    }

    #[test]
    fn inline_script_inside_region_is_removed() {
        let html = r#"<html><body><main>
            <p>Visible.</p>
            <script>var secret = "tracking-code";</script>
        </main></body></html>"#;
        let region = sanitize(html);
        assert_eq!(region.strategy, "main");
        assert!(!region.html.contains("tracking-code"));
        assert_eq!(region.text_len, "Visible.".len());
    }

    #[test]
    fn empty_document_falls_back_to_document() {
        let html = "<html><head><title>Loading</title></head><body><script>boot()</script></body></html>";
        let region = sanitize(html);
        assert_eq!(region.strategy, DOCUMENT_FALLBACK);
        assert!(region.is_empty());
        assert!(!region.html.contains("Loading"));
    }

    #[test]
    fn image_only_region_is_not_empty() {
        let html = r#"<html><body><main><img src="/hero.png"></main></body></html>"#;
        let region = sanitize(html);
        assert_eq!(region.strategy, "main");
        assert_eq!(region.image_count, 1);
        assert!(!region.is_empty());
    }

    #[test]
    fn text_len_collapses_whitespace() {
        let html = "<html><body><main><p>one   two</p>\n\n<p>three</p></main></body></html>";
        let region = sanitize(html);
        assert_eq!(region.text_len, "one two three".len());
    }

    #[test]
    fn custom_priority_strategy_is_tried_first() {
        let locator = RegionLocator::new()
            .with_priority_strategy(SelectorStrategy::new("#content").unwrap());
        assert_eq!(locator.strategy_names(), ["#content", "main", "article", "body"]);

        let html = r#"<html><body><main><p>Main</p></main><div id="content"><p>Custom</p></div></body></html>"#;
        let region = locator.sanitize(html);
        assert_eq!(region.strategy, "#content");
        assert!(region.html.contains("Custom"));
    }

    #[test]
    fn invalid_selector_is_rejected() {
        assert!(SelectorStrategy::new("div[").is_err());
    }

    #[test]
    fn noscript_fallback_text_does_not_count_as_content() {
        let html = r#"<html><body>
            <noscript>You need to enable JavaScript to run this app.</noscript>
            <div id="root"></div>
            <template><p>Row template</p></template>
        </body></html>"#;
        let region = sanitize(html);
        assert!(region.is_empty(), "{region:?}");
        assert!(!region.html.contains("enable JavaScript"));
    }
}
