//! Sub-selector cascades for post fields.
//!
//! Each field is looked up with an ordered list of sub-selectors inside the
//! matched post element; the first one whose first match has non-empty text
//! wins.

use dom_query::Selection;
use url::Url;

use crate::dom;
use crate::url_utils::resolve_href;

/// Title candidates, most specific first. Bare `a` is the catch-all; the
/// heading entries after it only apply to posts without linked text.
pub const TITLE_SELECTORS: &[&str] = &[
    "a.title",
    ".title a",
    ".subject a",
    "a.subject",
    ".tit a",
    "a.tit",
    "h2 a",
    "h3 a",
    ".list_subject a",
    "td.title a",
    "td.subject a",
    ".article-title a",
    ".table_row .subject a",
    ".deco",
    "a",
    ".title",
    ".subject",
    "h2",
    "h3",
    "h4",
];

/// Date candidates. The text is kept raw.
pub const DATE_SELECTORS: &[&str] = &[
    ".date",
    ".time",
    ".timestamp",
    ".regdate",
    "td.date",
    "td.time",
    ".list_date",
    "time",
    "[class*=\"date\"]",
    "[datetime]",
];

/// Author candidates.
pub const AUTHOR_SELECTORS: &[&str] = &[
    ".author",
    ".writer",
    ".nickname",
    ".nick",
    "[class*=\"author\"]",
    "[class*=\"writer\"]",
];

/// First cascade entry whose first match has text.
#[must_use]
pub fn first_text<'a>(element: &Selection<'a>, selectors: &[&str]) -> Option<(Selection<'a>, String)> {
    selectors.iter().find_map(|sub| {
        let found = element.select(sub).first();
        if !found.exists() {
            return None;
        }
        let text = dom::clean_text(&found);
        (!text.is_empty()).then_some((found, text))
    })
}

/// Truncate to at most `max` characters.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Resolve the link of a post.
///
/// Prefers the anchor that supplied the title (or its anchor ancestor inside
/// the post), then the element itself when it is an anchor, then the first
/// linked descendant.
#[must_use]
pub fn find_link(element: &Selection, title_el: Option<&Selection>, base: &Url) -> Option<String> {
    let title_anchor = title_el.and_then(|t| {
        dom::self_and_ancestors(t)
            .take_while(|s| dom::node_id(s) != dom::node_id(element))
            .find(|s| dom::tag_name(s).as_deref() == Some("a"))
    });

    let own_anchor = (dom::tag_name(element).as_deref() == Some("a")).then(|| element.clone());

    title_anchor
        .into_iter()
        .chain(own_anchor)
        .chain(dom::each(&element.select("a[href]")))
        .find_map(|anchor| anchor.attr("href").and_then(|href| resolve_href(&href, base)))
}
