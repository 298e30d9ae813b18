//! Configuration options for detection, extraction and checking.
//!
//! The `Options` struct carries the heuristic thresholds and resource caps.
//! The score tables themselves live in [`crate::selector::rules`]; the values
//! here are the gates those scores are measured against.

use std::time::Duration;

/// Tuning knobs for the post detection and change tracking pipeline.
///
/// All fields are public for easy configuration. Use `Default::default()`
/// for standard settings.
///
/// # Example
///
/// ```rust
/// use rs_catchup::Options;
///
/// let options = Options {
///     acceptance_score: 60.0,
///     ..Options::default()
/// };
/// assert_eq!(options.max_snapshot_posts, 50);
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    /// Minimum score a detected candidate needs to be accepted.
    ///
    /// Default: `50.0`
    pub acceptance_score: f64,

    /// Minimum number of matched elements for any selector to count as
    /// a repeating structure.
    ///
    /// Default: `2`
    pub min_selector_matches: usize,

    /// Minimum valid rows for a table (or a known row pattern) to be a board.
    ///
    /// Default: `5`
    pub min_table_rows: usize,

    /// Minimum `<article>` elements for article detection.
    ///
    /// Default: `3`
    pub min_articles: usize,

    /// Minimum matches for a class pattern or explicit list pattern.
    ///
    /// Default: `3`
    pub min_pattern_matches: usize,

    /// Minimum direct `<li>` children for the generic list scan.
    ///
    /// Default: `5`
    pub min_list_items: usize,

    /// Fraction of list items that must look like posts.
    ///
    /// Default: `0.7`
    pub list_valid_ratio: f64,

    /// Score at which an explicit list pattern is accepted without the
    /// generic scan.
    ///
    /// Default: `80.0`
    pub list_accept_score: f64,

    /// Maximum title length in characters.
    ///
    /// Default: `150`
    pub max_title_chars: usize,

    /// Length of the element-text fallback title.
    ///
    /// Default: `100`
    pub fallback_title_chars: usize,

    /// Posts kept in the persisted snapshot (and fed to the differ).
    ///
    /// Default: `50`
    pub max_snapshot_posts: usize,

    /// New posts kept per site.
    ///
    /// Default: `30`
    pub max_new_posts: usize,

    /// Upper bound on waiting for a rendered tab to finish loading.
    ///
    /// Default: 15 seconds
    pub tab_load_timeout: Duration,

    /// Pause after the load-complete signal before capturing the DOM.
    ///
    /// Default: 1 second
    pub tab_settle_delay: Duration,

    /// Run auto-detection at check time for sites without a selector.
    ///
    /// Default: `true`
    pub detect_on_check: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            acceptance_score: 50.0,
            min_selector_matches: 2,
            min_table_rows: 5,
            min_articles: 3,
            min_pattern_matches: 3,
            min_list_items: 5,
            list_valid_ratio: 0.7,
            list_accept_score: 80.0,
            max_title_chars: 150,
            fallback_title_chars: 100,
            max_snapshot_posts: 50,
            max_new_posts: 30,
            tab_load_timeout: Duration::from_secs(15),
            tab_settle_delay: Duration::from_secs(1),
            detect_on_check: true,
        }
    }
}
