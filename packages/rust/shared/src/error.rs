//! Error types for SiteCorpus.
//!
//! Library crates use [`SiteCorpusError`] for run-level failures and
//! [`FetchError`] for per-page failures, both via `thiserror`.
//! The CLI wraps these with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for run-level (fatal) SiteCorpus failures.
#[derive(Debug, thiserror::Error)]
pub enum SiteCorpusError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The seed URL could not be parsed or is not http(s).
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP client could not be constructed.
    #[error("network error: {0}")]
    Network(String),

    /// Rendering engine unavailable when rendering is mandatory.
    #[error("render engine error: {0}")]
    Render(String),

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON (de)serialization error at the output boundary.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SiteCorpusError>;

impl SiteCorpusError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-URL error for `url`.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Per-page fetch failure. Never aborts a crawl.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connection, DNS, TLS, or body-read failure.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// The request or navigation did not complete in time.
    #[error("timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The headless browser could not produce a document.
    #[error("render failure: {0}")]
    RenderFailure(String),

    /// The document had no usable content even after escalation.
    #[error("insufficient content")]
    InsufficientContent,
}

impl FetchError {
    /// Whether this error moves a task to `Skipped` rather than `Failed`.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::InsufficientContent)
    }
}
