//! Corpus output: file naming and the JSON writer.
//!
//! The output file is named after the seed URL (`host + path`, sanitized)
//! and never overwrites an existing file: `<stem>.json` is tried first,
//! then `<stem>_1.json`, `<stem>_2.json`, and so on.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use sitecorpus_shared::{Corpus, Result, SiteCorpusError};

/// Stem used when nothing usable is left of the seed URL.
pub const FALLBACK_STEM: &str = "extracted_content";

/// Longest stem kept, in characters.
const MAX_STEM_LEN: usize = 100;

/// Build a filesystem-safe file stem from a URL's host and path.
pub fn sanitize_filename(url: &str) -> String {
    static UNSAFE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("valid regex"));
    static UNDERSCORES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"_+").expect("valid regex"));

    let raw = match Url::parse(url) {
        Ok(parsed) => format!("{}{}", parsed.host_str().unwrap_or(""), parsed.path()),
        Err(_) => url.to_string(),
    };

    let replaced = UNSAFE_RE.replace_all(&raw, "_");
    let collapsed = UNDERSCORES_RE.replace_all(&replaced, "_");
    let stem: String = collapsed.trim_matches('_').chars().take(MAX_STEM_LEN).collect();

    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// Claim a fresh `<stem>[_n].json` path in `dir`.
///
/// The returned file already exists (empty), so concurrent writers cannot
/// pick the same name.
pub fn unique_output_path(dir: &Path, stem: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| SiteCorpusError::io(dir, e))?;

    let mut counter = 0u32;
    loop {
        let name = if counter == 0 {
            format!("{stem}.json")
        } else {
            format!("{stem}_{counter}.json")
        };
        let candidate = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "output name taken");
                counter += 1;
            }
            Err(e) => return Err(SiteCorpusError::io(&candidate, e)),
        }
    }
}

/// Write `corpus` as pretty-printed JSON into `dir`, named after `seed`.
///
/// Returns the path written.
#[instrument(skip_all, fields(dir = %dir.display(), records = corpus.len()))]
pub fn write_corpus(dir: &Path, seed: &str, corpus: &Corpus) -> Result<PathBuf> {
    let json = corpus.to_json_pretty()?;
    let target = unique_output_path(dir, &sanitize_filename(seed))?;

    // Write to a temp file first, then rename over the claimed name.
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_STEM.to_string());
    let temp = dir.join(format!(".{file_name}.tmp"));

    let written = std::fs::write(&temp, json.as_bytes())
        .map_err(|e| SiteCorpusError::io(&temp, e))
        .and_then(|()| {
            std::fs::rename(&temp, &target).map_err(|e| SiteCorpusError::io(&target, e))
        });
    if let Err(e) = written {
        // Release the claimed name and drop any partial temp file.
        let _ = std::fs::remove_file(&temp);
        let _ = std::fs::remove_file(&target);
        warn!(path = %target.display(), error = %e, "failed to write corpus");
        return Err(e);
    }

    info!(path = %target.display(), bytes = json.len(), "wrote corpus");
    Ok(target)
}
