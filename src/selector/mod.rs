//! Selector Scorer
//!
//! Guesses a CSS selector that enumerates the repeating "post" elements of an
//! arbitrary page. Four independent strategies each propose at most one
//! candidate on a shared score scale:
//!
//! - `table`: board tables, known row patterns first
//! - `article`: semantic `<article>` elements
//! - `class_pattern`: a priority table of post/card/item class names
//! - `list`: explicit ranking/board lists, then a generic `ul`/`ol` scan
//!
//! The highest-scoring candidate wins if it reaches
//! [`Options::acceptance_score`](crate::Options::acceptance_score).
//!
//! ```rust
//! use rs_catchup::{dom, selector, Options};
//!
//! let rows: String = (1..=6)
//!     .map(|i| format!(r#"<tr><td><a href="/v/{i}">Weekly board post number {i}</a></td><td>2024-01-0{i}</td></tr>"#))
//!     .collect();
//! let doc = dom::parse(&format!(r#"<div class="bbs"><table>{rows}</table></div>"#));
//!
//! let found = selector::detect(&doc, &Options::default()).expect("board table");
//! assert_eq!(found.selector, ".bbs table tbody tr");
//! assert_eq!(found.match_count, 6);
//! ```

use dom_query::{Document, Selection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::{self, NodeSet};
use crate::Options;

pub mod article;
pub mod class_pattern;
pub mod list;
pub mod rules;
pub mod table;

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// Board table or known table-row pattern.
    Table,
    /// `<article>` elements.
    Article,
    /// Class/attribute pattern table.
    ClassPattern,
    /// `ul`/`ol` list items.
    List,
}

/// A proposed post selector. Produced per detection run, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// CSS selector for the post elements.
    pub selector: String,
    /// Number of qualifying elements the strategy counted.
    pub match_count: usize,
    /// Heuristic score on the shared scale.
    pub score: f64,
    /// Strategy that produced the candidate.
    pub source: Source,
}

/// Shared state for one detection run over one document.
pub struct DetectContext<'a> {
    /// Document under analysis.
    pub doc: &'a Document,
    /// Elements inside navigation, headers, footers and menus.
    pub excluded: NodeSet,
    /// Thresholds.
    pub options: &'a Options,
}

impl<'a> DetectContext<'a> {
    /// Build the context, precomputing the exclusion set once.
    #[must_use]
    pub fn new(doc: &'a Document, options: &'a Options) -> Self {
        Self {
            doc,
            excluded: NodeSet::from_selector(doc, rules::EXCLUDE_SELECTOR),
            options,
        }
    }

    /// Whether the element sits in an excluded region.
    #[must_use]
    pub fn is_excluded(&self, sel: &Selection) -> bool {
        self.excluded.covers(sel)
    }

    /// Elements matching `pattern` outside excluded regions.
    #[must_use]
    pub fn valid_matches(&self, pattern: &str) -> Vec<Selection<'a>> {
        dom::each(&self.doc.select(pattern))
            .into_iter()
            .filter(|el| !self.is_excluded(el))
            .collect()
    }
}

/// Fraction of elements that contain a link.
pub(crate) fn linked_fraction(elements: &[Selection]) -> f64 {
    if elements.is_empty() {
        return 0.0;
    }
    let linked = elements.iter().filter(|el| dom::has_link(el)).count();
    linked as f64 / elements.len() as f64
}

/// Keep the higher-scoring candidate; the earlier one wins ties.
pub(crate) fn keep_best(best: &mut Option<Candidate>, candidate: Candidate) {
    if best.as_ref().is_none_or(|b| candidate.score > b.score) {
        *best = Some(candidate);
    }
}

/// Run all four strategies and return their candidates, best first.
#[must_use]
pub fn candidates(doc: &Document, options: &Options) -> Vec<Candidate> {
    let ctx = DetectContext::new(doc, options);

    let mut found: Vec<Candidate> = [
        table::detect_table_board(&ctx),
        article::detect_articles(&ctx),
        class_pattern::detect_by_class(&ctx),
        list::detect_list_board(&ctx),
    ]
    .into_iter()
    .flatten()
    .collect();

    found.sort_by(|a, b| b.score.total_cmp(&a.score));
    found
}

/// Pick the best post selector for a document.
///
/// Returns `None` when no candidate reaches the acceptance score. A winning
/// candidate whose selector matches fewer than
/// [`Options::min_selector_matches`](crate::Options::min_selector_matches)
/// live elements is skipped in favor of the next one.
#[must_use]
pub fn detect(doc: &Document, options: &Options) -> Option<Candidate> {
    let found = candidates(doc, options);
    debug!(candidates = found.len(), "selector detection finished");

    found.into_iter().find(|candidate| {
        candidate.score >= options.acceptance_score
            && dom::count_matches(doc, &candidate.selector) >= options.min_selector_matches
    })
}

/// Parse an HTML string and detect its post selector.
#[must_use]
pub fn detect_html(html: &str, options: &Options) -> Option<Candidate> {
    let doc = dom::parse(html);
    detect(&doc, options)
}
