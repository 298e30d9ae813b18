//! # rs-catchup
//!
//! Heuristic post detection and change tracking for watched web pages.
//!
//! Given an arbitrary HTML page and no prior knowledge of its markup, this
//! library guesses a CSS selector that enumerates the page's "posts",
//! extracts a `{title, link, date, author}` record from each, and diffs the
//! result against the previous snapshot to find what is new.
//!
//! ## Quick Start
//!
//! ```rust
//! use rs_catchup::{detect, extract_posts};
//!
//! let items: String = (1..=5)
//!     .map(|i| format!(r#"<article><h2><a href="/p/{i}">Release notes part {i}</a></h2></article>"#))
//!     .collect();
//! let html = format!("<html><body><main>{items}</main></body></html>");
//!
//! let found = detect(&html).expect("five articles");
//! let posts = extract_posts(&html, &found.selector, "https://blog.example.com/")?;
//! assert_eq!(posts[0].link, "https://blog.example.com/p/1");
//! # Ok::<(), rs_catchup::Error>(())
//! ```
//!
//! ## Layers
//!
//! - **Detection and extraction**: [`selector`], [`extractor`], [`picker`]
//! - **Change tracking**: [`differ`], [`monitor`], [`feeds`]
//! - **Page access**: [`fetch`] (HTTP first) and [`render`] (browser tab
//!   fallback), parsing on the isolated [`worker`] thread
//! - **Persistence and surfaces**: [`store`], [`notify`], [`schedule`],
//!   [`platforms`], [`config`]

mod error;
mod options;
mod patterns;

/// DOM helpers over `dom_query`.
pub mod dom;

/// Character encoding resolution for fetched pages.
pub mod encoding;

/// URL resolution and hostname helpers.
pub mod url_utils;

/// Selector Scorer: candidate post selectors and their scores.
pub mod selector;

/// Record Extractor: post records from matched elements.
pub mod extractor;

/// Interactive Selection Mode.
pub mod picker;

/// Snapshot Differ.
pub mod differ;

/// Parse worker thread.
pub mod worker;

/// Rendered-tab driver.
pub mod render;

/// Fetch/Render Fallback Controller.
pub mod fetch;

/// Two-scope key-value store with quota accounting.
pub mod store;

/// Watched sites and the check pipeline.
pub mod monitor;

/// RSS/Atom feed tracking.
pub mod feeds;

/// Platform client boundary.
pub mod platforms;

/// Badge, settings and notification payloads.
pub mod notify;

/// Daily scheduling.
pub mod schedule;

/// Binary configuration.
pub mod config;

// Public API - re-exports
pub use differ::{diff, DiffOutcome, Snapshot};
pub use error::{Error, Result};
pub use extractor::{Extraction, PostRecord};
pub use fetch::{FallbackController, PageSource};
pub use monitor::{SiteChecker, SiteRegistry};
pub use options::Options;
pub use selector::Candidate;

/// Detect the post selector of an HTML page using default options.
///
/// Returns `None` when no candidate reaches the acceptance score.
#[must_use]
pub fn detect(html: &str) -> Option<Candidate> {
    detect_with_options(html, &Options::default())
}

/// Detect the post selector of an HTML page with custom options.
///
/// ```rust
/// use rs_catchup::{detect_with_options, Options};
///
/// let options = Options { acceptance_score: 500.0, ..Options::default() };
/// assert!(detect_with_options("<ul><li>a</li></ul>", &options).is_none());
/// ```
#[must_use]
pub fn detect_with_options(html: &str, options: &Options) -> Option<Candidate> {
    selector::detect_html(html, options)
}

/// Extract post records from an HTML page.
///
/// `page_url` is both the base for relative links and the URL checked for
/// login paths.
///
/// # Errors
///
/// [`Error::NeedsLogin`] for a login wall, [`Error::ElementsNotFound`] when
/// the selector matches nothing and [`Error::InvalidSelector`] for bad CSS.
pub fn extract_posts(html: &str, selector: &str, page_url: &str) -> Result<Vec<PostRecord>> {
    extract_posts_with_options(html, selector, page_url, &Options::default())
}

/// [`extract_posts`] with custom options.
#[allow(clippy::missing_errors_doc)]
pub fn extract_posts_with_options(
    html: &str,
    selector: &str,
    page_url: &str,
    options: &Options,
) -> Result<Vec<PostRecord>> {
    let base = url::Url::parse(page_url).map_err(|e| Error::Config(format!("invalid url {page_url:?}: {e}")))?;
    extractor::extract_html(html, selector, &base, options).into_result()
}

/// Extract post records from raw bytes, decoding with the declared charset.
///
/// ```rust
/// use rs_catchup::extract_posts_bytes;
///
/// // "공지" in EUC-KR
/// let html = b"<ul><li><a href=\"/1\">\xb0\xf8\xc1\xf6 one</a></li></ul>";
/// let posts = extract_posts_bytes(html, Some("text/html; charset=euc-kr"), "li", "https://bbs.example.kr/")?;
/// assert_eq!(posts[0].title, "공지 one");
/// # Ok::<(), rs_catchup::Error>(())
/// ```
#[allow(clippy::missing_errors_doc)]
pub fn extract_posts_bytes(
    html: &[u8],
    content_type: Option<&str>,
    selector: &str,
    page_url: &str,
) -> Result<Vec<PostRecord>> {
    let decoded = encoding::decode_body(content_type, html);
    extract_posts(&decoded, selector, page_url)
}
