//! Markdown cleanup applied after `htmd` conversion.
//!
//! Passes run in a fixed order; each takes the whole document and returns a
//! new one. Fenced code blocks are never rewritten by the line-based passes.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// Post-conversion settings for one page.
pub(crate) struct Cleaner<'a> {
    pub base_url: Option<&'a Url>,
    pub strip_images: bool,
}

impl Cleaner<'_> {
    /// Apply every pass to `md`.
    pub(crate) fn run(&self, md: &str) -> String {
        let mut out = if self.strip_images {
            drop_image_refs(md)
        } else {
            md.to_string()
        };

        out = normalize_fence_info(&out);
        out = map_prose_lines(&out, |line| LAYOUT_TAG_RE.replace_all(line, "").into_owned());
        if let Some(base) = self.base_url {
            out = absolutize_targets(&out, base);
        }
        out = out.lines().map(str::trim_end).collect::<Vec<_>>().join("\n");
        out = BLANK_RUN_RE.replace_all(&out, "\n\n").into_owned();

        out.trim().to_string()
    }
}

/// Layout/form tags that `htmd` passes through verbatim.
static LAYOUT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"</?(?:div|span|section|article|aside|main|figure|figcaption|details|summary|form|label|button|input|select|option|textarea|center|font)(?:\s[^>]*)?/?>",
    )
    .expect("valid regex")
});

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Remove `![alt](src)` and any link whose text was only an image.
fn drop_image_refs(md: &str) -> String {
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));
    static HOLLOW_LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[\s*\]\([^)]*\)").expect("valid regex"));

    let once = IMAGE_RE.replace_all(md, "");
    HOLLOW_LINK_RE.replace_all(&once, "").into_owned()
}

/// Turn fence info like `language-js` or `lang-py` into a bare language.
fn normalize_fence_info(md: &str) -> String {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^(\s*)```(?:language|lang|highlight)-(\w+)").expect("valid regex")
    });

    FENCE_RE.replace_all(md, "$1```$2").into_owned()
}

/// Rewrite each line outside fenced code blocks with `f`.
fn map_prose_lines(md: &str, f: impl Fn(&str) -> String) -> String {
    let mut fenced = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                fenced = !fenced;
                line.to_string()
            } else if fenced {
                line.to_string()
            } else {
                f(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resolve relative link and image targets against `base`.
///
/// Absolute URLs, in-page anchors and targets with any other scheme
/// (`mailto:`, `tel:` …) are left as written.
fn absolutize_targets(md: &str, base: &Url) -> String {
    static TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\]\(([^)\s]+)((?:\s[^)]*)?)\)").expect("valid regex")
    });

    TARGET_RE
        .replace_all(md, |caps: &Captures| {
            let target = &caps[1];
            if target.starts_with('#') || Url::parse(target).is_ok() {
                return caps[0].to_string();
            }
            match base.join(target) {
                Ok(abs) => format!("]({abs}{})", &caps[2]),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}
