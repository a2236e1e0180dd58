//! Link and image discovery on the original (unsanitized) document.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

/// Path extensions treated as image files rather than pages.
const IMAGE_EXTENSIONS: [&str; 10] = [
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico", "tiff", "avif",
];

/// href prefixes that never point at a crawlable page.
const SKIPPED_HREF_PREFIXES: [&str; 5] = ["javascript:", "mailto:", "tel:", "data:", "#"];

static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

static IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid selector"));

/// Links and images found on a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    /// Same-host page links, fragment-free, in first-appearance order.
    pub links: Vec<Url>,
    /// Absolute image URLs (any host) in first-appearance order.
    pub images: Vec<String>,
}

/// Scan `html` for same-host links and, when asked, image references.
pub fn discover(html: &str, base_url: &Url, include_images: bool) -> Discovered {
    let doc = Html::parse_document(html);

    Discovered {
        links: extract_links(&doc, base_url),
        images: if include_images {
            extract_images(&doc, base_url)
        } else {
            Vec::new()
        },
    }
}

/// Whether two URLs share a host (case-insensitive).
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}

fn extract_links(doc: &Html, base_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(&LINK_SEL) {
        let Some(href) = el.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || has_skipped_prefix(href) {
            continue;
        }

        let Ok(mut resolved) = base_url.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") || !same_host(&resolved, base_url) {
            continue;
        }
        if is_image_path(&resolved) {
            continue;
        }

        resolved.set_fragment(None);
        if seen.insert(resolved.as_str().to_string()) {
            links.push(resolved);
        }
    }

    links
}

fn extract_images(doc: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for el in doc.select(&IMG_SEL) {
        let src = el
            .value()
            .attr("src")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| el.value().attr("data-src").map(str::trim));

        let Some(src) = src.filter(|s| !s.is_empty() && !s.starts_with("data:")) else {
            continue;
        };
        let Ok(resolved) = base_url.join(src) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        let resolved = resolved.to_string();
        if seen.insert(resolved.clone()) {
            images.push(resolved);
        }
    }

    images
}

fn has_skipped_prefix(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    SKIPPED_HREF_PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn is_image_path(url: &Url) -> bool {
    url.path()
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://docs.example.com/guide/intro").unwrap()
    }

    fn link_strings(d: &Discovered) -> Vec<&str> {
        d.links.iter().map(Url::as_str).collect()
    }

    #[test]
    fn resolves_and_filters_links() {
        let html = r##"<html><body>
            <a href="/page2">Page 2</a>
            <a href="https://external.com/x">External</a>
            <a href="#section">Anchor</a>
            <a href="relative/path">Relative</a>
            <a href="mailto:team@example.com">Mail</a>
            <a href="javascript:void(0)">JS</a>
            <a href="tel:+15551234">Call</a>
            <a href="ftp://docs.example.com/file">FTP</a>
        </body></html>"##;

        let found = discover(html, &base(), false);
        assert_eq!(
            link_strings(&found),
            [
                "https://docs.example.com/page2",
                "https://docs.example.com/guide/relative/path",
            ]
        );
    }

    #[test]
    fn strips_fragments_and_dedupes_in_order() {
        let html = r#"<html><body>
            <a href="/b#one">B</a>
            <a href="/a">A</a>
            <a href="/b#two">B again</a>
            <a href="/a">A again</a>
        </body></html>"#;

        let found = discover(html, &base(), false);
        assert_eq!(
            link_strings(&found),
            ["https://docs.example.com/b", "https://docs.example.com/a"]
        );
    }

    #[test]
    fn host_match_is_case_insensitive() {
        let html = r#"<a href="https://DOCS.Example.com/upper">Upper</a>"#;
        let found = discover(html, &base(), false);
        assert_eq!(link_strings(&found), ["https://docs.example.com/upper"]);
    }

    #[test]
    fn skips_image_file_links() {
        let html = r#"<html><body>
            <a href="/gallery/photo.JPG">Photo</a>
            <a href="/static/logo.svg">Logo</a>
            <a href="/gallery/">Gallery</a>
        </body></html>"#;

        let found = discover(html, &base(), false);
        assert_eq!(link_strings(&found), ["https://docs.example.com/gallery/"]);
    }

    #[test]
    fn links_come_from_boilerplate_too() {
        let html = r#"<html><body>
            <nav><a href="/from-nav">Nav</a></nav>
            <main><p>Body</p></main>
            <footer><a href="/from-footer">Footer</a></footer>
        </body></html>"#;

        let found = discover(html, &base(), false);
        assert_eq!(found.links.len(), 2);
    }

    #[test]
    fn images_only_when_requested() {
        let html = r#"<img src="/a.png">"#;
        assert!(discover(html, &base(), false).images.is_empty());
        assert_eq!(
            discover(html, &base(), true).images,
            ["https://docs.example.com/a.png"]
        );
    }

    #[test]
    fn images_any_host_lazy_src_no_data_uris() {
        let html = r#"<html><body>
            <img src="https://cdn.example.net/hero.jpg">
            <img data-src="lazy/thumb.webp">
            <img src="data:image/png;base64,iVBORw0KGgo=">
            <img src="/hero.png">
            <img src="https://cdn.example.net/hero.jpg">
            <img>
        </body></html>"#;

        let found = discover(html, &base(), true);
        assert_eq!(
            found.images,
            [
                "https://cdn.example.net/hero.jpg",
                "https://docs.example.com/guide/lazy/thumb.webp",
                "https://docs.example.com/hero.png",
            ]
        );
    }

    #[test]
    fn same_host_compares_hosts_only() {
        let a = Url::parse("https://example.com/a").unwrap();
        let b = Url::parse("http://EXAMPLE.com:8080/b").unwrap();
        let c = Url::parse("https://other.com/").unwrap();
        assert!(same_host(&a, &b));
        assert!(!same_host(&a, &c));
    }
}
