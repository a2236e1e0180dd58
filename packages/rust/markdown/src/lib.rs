//! Content sanitization and HTML-to-Markdown conversion.
//!
//! [`sanitize`] strips boilerplate and picks the content region of a page;
//! [`to_structured_text`] converts that region to clean Markdown using the
//! `htmd` crate, then applies a series of cleanup passes to normalize
//! whitespace, code blocks, images, and links.

mod cleanup;
pub mod sanitize;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use sitecorpus_shared::{Result, SiteCorpusError};

use crate::cleanup::Cleaner;

pub use sanitize::{
    BOILERPLATE_TAGS, ContentRegion, DOCUMENT_FALLBACK, HIDDEN_TAGS, RegionLocator, RegionStrategy,
    SelectorStrategy, sanitize,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for the region-to-Markdown conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Page URL used to resolve relative links.
    pub base_url: Option<Url>,
    /// Remove image references from the text (they are reported separately).
    pub strip_images: bool,
}

impl ConvertOptions {
    /// Options for a page at `url`.
    pub fn for_page(url: &Url, strip_images: bool) -> Self {
        Self {
            base_url: Some(url.clone()),
            strip_images,
        }
    }
}

/// A full page after sanitizing and conversion.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    pub markdown: String,
    /// Name of the region strategy that matched.
    pub region_strategy: String,
    /// Visible text length of the content region.
    pub region_text_len: usize,
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert a sanitized content region to Markdown.
///
/// Pure: the same region and options always give the same text.
pub fn to_structured_text(region: &ContentRegion, opts: &ConvertOptions) -> Result<String> {
    // htmd 0.1 has no table support and would fold pipe rows into one
    // paragraph, so tables are swapped for tokens and restored afterwards.
    let (html, tables) = extract_tables(&region.html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript", "iframe", "svg", "template"])
        .build();

    let mut raw = converter
        .convert(&html)
        .map_err(|e| SiteCorpusError::Conversion(format!("htmd failed: {e}")))?;

    for (i, table) in tables.iter().enumerate() {
        raw = raw.replacen(&table_token(i), table, 1);
    }

    let cleaner = Cleaner {
        base_url: opts.base_url.as_ref(),
        strip_images: opts.strip_images,
    };
    Ok(cleaner.run(&raw))
}

/// Sanitize a full HTML page and convert its content region to Markdown.
#[instrument(skip(html, opts), fields(url = ?opts.base_url.as_ref().map(Url::as_str)))]
pub fn convert(html: &str, opts: &ConvertOptions) -> Result<ConvertResult> {
    convert_with(&RegionLocator::default(), html, opts)
}

/// Like [`convert`], with a caller-supplied region locator.
pub fn convert_with(
    locator: &RegionLocator,
    html: &str,
    opts: &ConvertOptions,
) -> Result<ConvertResult> {
    let region = locator.sanitize(html);
    let markdown = to_structured_text(&region, opts)?;

    debug!(strategy = %region.strategy, chars = markdown.len(), "page converted");

    Ok(ConvertResult {
        markdown,
        region_strategy: region.strategy,
        region_text_len: region.text_len,
    })
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("valid selector"));

/// Stand-in paragraph text for the `i`-th table; plain letters and digits
/// so htmd passes it through untouched.
fn table_token(i: usize) -> String {
    format!("sitecorpustable{i}end")
}

/// Swap every top-level `<table>` in `html` for a token paragraph.
///
/// Returns the rewritten HTML and the pipe table for each token, in order.
fn extract_tables(html: &str) -> (String, Vec<String>) {
    let fragment = Html::parse_fragment(html);
    let mut out = html.to_string();
    let mut tables = Vec::new();

    for table in fragment.select(&TABLE_SEL) {
        // Nested tables are flattened into their parent's cells.
        if table.ancestors().filter_map(ElementRef::wrap).any(|a| a.value().name() == "table") {
            continue;
        }
        let source = table.html();
        if !out.contains(&source) {
            continue;
        }
        let token = format!("<p>{}</p>", table_token(tables.len()));
        out = out.replacen(&source, &token, 1);
        tables.push(pipe_table(table));
    }
    (out, tables)
}

fn pipe_table(table: ElementRef<'_>) -> String {
    let mut header_row = false;
    let mut rows: Vec<Vec<String>> = Vec::new();

    for tr in table.select(&ROW_SEL) {
        let mut is_header = true;
        let cells: Vec<String> = tr
            .select(&CELL_SEL)
            .map(|cell| {
                is_header &= cell.value().name() == "th";
                let text: Vec<&str> = cell.text().flat_map(str::split_whitespace).collect();
                text.join(" ").replace('|', "\\|")
            })
            .collect();
        if cells.is_empty() {
            continue;
        }
        if rows.is_empty() {
            header_row = is_header;
        }
        rows.push(cells);
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }
    if !header_row {
        rows.insert(0, Vec::new());
    }

    let line = |cells: &[String]| {
        let padded: Vec<&str> = (0..width)
            .map(|i| cells.get(i).map_or("", String::as_str))
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let mut lines = vec![line(&rows[0]), format!("|{}", " --- |".repeat(width))];
    lines.extend(rows[1..].iter().map(|row| line(row)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture_path(name: &str) -> std::path::PathBuf {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures")
            .join(name)
    }

    fn load_fixture(name: &str) -> String {
        fs::read_to_string(fixture_path(name))
            .unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}"))
    }

    fn make_opts(url: &str) -> ConvertOptions {
        ConvertOptions::for_page(&Url::parse(url).unwrap(), false)
    }

    #[test]
    fn heading_and_paragraph_from_main() {
        let html = "<html><body><main><h1>Release notes</h1><p>Version 2 is out.</p></main></body></html>";
        let result = convert(html, &make_opts("https://example.com/news")).unwrap();

        assert_eq!(result.markdown, "# Release notes\n\nVersion 2 is out.");
        assert_eq!(result.region_strategy, "main");
    }

    #[test]
    fn header_nav_and_footer_never_reach_output() {
        let html = r#"<html><body>
            <header><p>Acme Corp</p></header>
            <nav><ul><li><a href="/pricing">Pricing</a></li></ul></nav>
            <p>Plain body paragraph.</p>
            <footer><p>All rights reserved</p></footer>
        </body></html>"#;

        let md = convert(html, &make_opts("https://example.com/")).unwrap().markdown;
        assert_eq!(md, "Plain body paragraph.");
    }

    #[test]
    fn convert_never_emits_script_or_style_source() {
        let html = r#"<html><head><style>body { margin: 0 }</style></head><body><main>
            <h1>Docs</h1>
            <script>window.__STATE__ = {"token": "abc123"};</script>
            <p>Prose.</p>
            <style>.hidden { display: none }</style>
        </main></body></html>"#;

        let result = convert(html, &make_opts("https://example.com/")).unwrap();
        assert!(result.markdown.contains("Prose."));
        assert!(!result.markdown.contains("__STATE__"));
        assert!(!result.markdown.contains("abc123"));
        assert!(!result.markdown.contains("display: none"));
        assert!(!result.markdown.contains("margin: 0"));
    }

    #[test]
    fn fenced_code_keeps_language() {
        let html = r#"<html><body><main>
            <pre><code class="language-toml">[defaults]
max_depth = 2</code></pre>
        </main></body></html>"#;

        let md = convert(html, &make_opts("https://example.com/cfg")).unwrap().markdown;
        assert!(md.starts_with("```toml\n[defaults]\nmax_depth = 2"), "{md}");
    }

    #[test]
    fn header_table_becomes_pipe_table() {
        let html = r#"<html><body><main>
            <p>Flags:</p>
            <table>
                <tr><th>Flag</th><th>Default</th></tr>
                <tr><td>--max-depth</td><td>5</td></tr>
                <tr><td>--render-wait</td><td>5</td></tr>
            </table>
            <p>After the table.</p>
        </main></body></html>"#;

        let md = convert(html, &make_opts("https://example.com/flags")).unwrap().markdown;
        assert_eq!(
            md,
            "Flags:\n\n| Flag | Default |\n| --- | --- |\n| --max-depth | 5 |\n| --render-wait | 5 |\n\nAfter the table."
        );
    }

    #[test]
    fn two_tables_keep_their_own_rows() {
        let html = r#"<html><body><main>
            <table><tr><th>A</th></tr><tr><td>1</td></tr></table>
            <table><tr><th>B</th></tr><tr><td>2</td></tr></table>
        </main></body></html>"#;

        let md = convert(html, &make_opts("https://example.com/two")).unwrap().markdown;
        assert_eq!(md, "| A |\n| --- |\n| 1 |\n\n| B |\n| --- |\n| 2 |");
    }

    #[test]
    fn convert_handles_nested_lists() {
        let html = r#"<html><body><main>
            <h1>Lists</h1>
            <ul>
                <li>Item one
                    <ul><li>Nested item</li></ul>
                </li>
                <li>Item two</li>
            </ul>
            <ol>
                <li>First</li>
                <li>Second</li>
            </ol>
        </main></body></html>"#;

        let result = convert(html, &make_opts("https://example.com/lists")).unwrap();
        let md = &result.markdown;
        assert!(md.contains("Item one"));
        assert!(md.contains("First"));
        let one = md.find("Item one").unwrap();
        let nested = md.find("Nested item").unwrap();
        let two = md.find("Item two").unwrap();
        assert!(one < nested && nested < two, "list order not preserved:\n{md}");
        let nested_line = md.lines().find(|l| l.contains("Nested item")).unwrap();
        assert!(nested_line.starts_with(char::is_whitespace), "nested item not indented:\n{md}");
    }

    #[test]
    fn convert_resolves_relative_links() {
        let html = r#"<html><body><main>
            <p>See <a href="/guide/start">the guide</a> and <em>enjoy</em>.</p>
        </main></body></html>"#;

        let result = convert(html, &make_opts("https://example.com/docs/")).unwrap();
        assert!(result.markdown.contains("[the guide](https://example.com/guide/start)"));
        assert!(result.markdown.contains("*enjoy*") || result.markdown.contains("_enjoy_"));
    }

    #[test]
    fn convert_strips_images_when_asked() {
        let html = r#"<html><body><main><h1>Gallery</h1><p><img src="/a.png" alt="A"> Caption</p></main></body></html>"#;
        let url = Url::parse("https://example.com/g").unwrap();

        let kept = convert(html, &ConvertOptions::for_page(&url, false)).unwrap();
        assert!(kept.markdown.contains("![A](https://example.com/a.png)"));

        let stripped = convert(html, &ConvertOptions::for_page(&url, true)).unwrap();
        assert!(!stripped.markdown.contains("!["));
        assert!(stripped.markdown.contains("Caption"));
    }

    #[test]
    fn convert_collapses_blank_lines() {
        let html = "<html><body><main><p>A</p><div><br><br><br></div><p>B</p></main></body></html>";
        let result = convert(html, &make_opts("https://example.com/")).unwrap();
        assert!(!result.markdown.contains("\n\n\n"));
        assert!(result.markdown.contains('A') && result.markdown.contains('B'));
    }

    #[test]
    fn layout_wrappers_leave_no_tags() {
        let html = r#"<html><body><main>
            <section class="card"><span>Card</span> <b>bold</b></section>
            <figure><figcaption>Caption text</figcaption></figure>
        </main></body></html>"#;

        let md = convert(html, &make_opts("https://example.com/cards")).unwrap().markdown;
        assert!(md.contains("Caption text"));
        for tag in ["<section", "<span", "<figure", "<figcaption"] {
            assert!(!md.contains(tag), "{tag} left in:\n{md}");
        }
    }

    #[test]
    fn conversion_is_deterministic() {
        let html = load_fixture("html/blog_post.html");
        let opts = make_opts("https://blog.example.com/posts/hello");
        let a = convert(&html, &opts).unwrap();
        let b = convert(&html, &opts).unwrap();
        assert_eq!(a.markdown, b.markdown);
    }

    // --- Fixture-based tests ---

    #[test]
    fn convert_blog_post_fixture() {
        let html = load_fixture("html/blog_post.html");
        let result = convert(&html, &make_opts("https://blog.example.com/posts/hello")).unwrap();

        assert_eq!(result.region_strategy, "article");
        assert!(result.markdown.starts_with("# Hello, Corpus"));
        assert!(result.markdown.contains("## Why static pages still matter"));
        assert!(result.markdown.contains("cargo run"));
        assert!(!result.markdown.contains("Subscribe to the newsletter"));
        assert!(!result.markdown.contains("gtag("));
    }

    #[test]
    fn convert_spa_shell_fixture_is_empty() {
        let html = load_fixture("html/spa_shell.html");
        let result = convert(&html, &make_opts("https://app.example.com/")).unwrap();

        assert_eq!(result.region_text_len, 0);
        assert!(result.markdown.is_empty());
    }

    #[test]
    fn convert_spa_rendered_fixture() {
        let html = load_fixture("html/spa_rendered.html");
        let result = convert(&html, &make_opts("https://app.example.com/")).unwrap();

        assert_eq!(result.region_strategy, "main");
        assert!(result.markdown.contains("# Dashboard"));
        assert!(result.region_text_len > 200);
    }

    // --- Edge cases ---

    #[test]
    fn body_without_elements_gives_empty_text() {
        let result = convert("<html><body>  </body></html>", &make_opts("https://example.com/e")).unwrap();
        assert!(result.markdown.is_empty());
        assert_eq!(result.region_text_len, 0);
    }

    #[test]
    fn table_without_header_row_keeps_all_rows() {
        let html = r#"<html><body><main>
            <table><tr><td>a|b</td><td>1</td></tr><tr><td>c</td></tr></table>
        </main></body></html>"#;

        let result = convert(html, &make_opts("https://example.com/t")).unwrap();
        let lines: Vec<&str> = result.markdown.lines().collect();
        assert_eq!(lines, ["|  |  |", "| --- | --- |", r"| a\|b | 1 |", "| c |  |"]);
    }
}
