//! DOM Operations Adapter
//!
//! Thin helpers over the `dom_query` crate used by the selector scorer, the
//! record extractor and the interactive picker. Everything here is read-only
//! except the class helpers used for picker highlighting.

use std::collections::HashSet;

pub use dom_query::{Document, NodeId, Selection};
pub use tendril::StrTendril;

use crate::error::{Error, Result};
use crate::patterns::normalize_whitespace;

/// Class-name prefix reserved for picker decorations; never part of a
/// generated selector.
pub const RESERVED_CLASS_PREFIX: &str = "catchup";

/// Parse an HTML string into a document. Scripts are never executed.
#[inline]
#[must_use]
pub fn parse(html: &str) -> Document {
    Document::from(html)
}

// === Tag/Attribute Information ===

/// Get tag name (lowercase)
#[must_use]
pub fn tag_name(sel: &Selection) -> Option<String> {
    sel.nodes()
        .first()
        .and_then(dom_query::NodeRef::node_name)
        .map(|t| t.to_ascii_lowercase())
}

/// Get the raw `class` attribute, empty when missing.
#[inline]
#[must_use]
pub fn class_name(sel: &Selection) -> String {
    sel.attr("class").map(|s| s.to_string()).unwrap_or_default()
}

/// Class tokens in document order, skipping picker decorations.
#[must_use]
pub fn classes(sel: &Selection) -> Vec<String> {
    class_name(sel)
        .split_whitespace()
        .filter(|c| !c.contains(RESERVED_CLASS_PREFIX))
        .map(str::to_string)
        .collect()
}

/// First class token, skipping picker decorations.
#[must_use]
pub fn first_class(sel: &Selection) -> Option<String> {
    classes(sel).into_iter().next()
}

/// Non-empty `id` attribute.
#[must_use]
pub fn id(sel: &Selection) -> Option<String> {
    sel.attr("id")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Node id of the first node in the selection.
#[inline]
#[must_use]
pub fn node_id(sel: &Selection) -> Option<NodeId> {
    sel.nodes().first().map(|node| node.id)
}

// === Text Content ===

/// All text of the node and its descendants.
#[inline]
#[must_use]
pub fn text_content(sel: &Selection) -> StrTendril {
    sel.text()
}

/// Text with whitespace runs collapsed and ends trimmed.
#[must_use]
pub fn clean_text(sel: &Selection) -> String {
    normalize_whitespace(&text_content(sel))
}

/// Character count of the trimmed text.
#[must_use]
pub fn text_len(sel: &Selection) -> usize {
    text_content(sel).trim().chars().count()
}

/// Whether the element contains an `a[href]`.
#[inline]
#[must_use]
pub fn has_link(sel: &Selection) -> bool {
    sel.select("a[href]").exists()
}

// === Tree Navigation ===

/// The element itself followed by each ancestor up to the root.
pub fn self_and_ancestors<'a>(sel: &Selection<'a>) -> impl Iterator<Item = Selection<'a>> {
    std::iter::successors(Some(sel.clone()), |current| {
        let parent = current.parent();
        parent.exists().then_some(parent)
    })
    .filter(|s| s.exists())
}

/// Direct element children as individual selections.
#[must_use]
pub fn element_children<'a>(sel: &Selection<'a>) -> Vec<Selection<'a>> {
    sel.children()
        .nodes()
        .iter()
        .filter(|node| node.is_element())
        .map(|node| Selection::from(*node))
        .collect()
}

/// Split a multi-node selection into one selection per node.
#[must_use]
pub fn each<'a>(sel: &Selection<'a>) -> Vec<Selection<'a>> {
    sel.nodes().iter().map(|node| Selection::from(*node)).collect()
}

/// Whether `inner` is `outer` or one of its descendants.
#[must_use]
pub fn contains(outer: &Selection, inner: &Selection) -> bool {
    node_id(outer).is_some_and(|target| self_and_ancestors(inner).any(|s| node_id(&s) == Some(target)))
}

// === Tree Manipulation ===

/// Add a class token.
#[inline]
pub fn add_class(sel: &Selection, class: &str) {
    sel.add_class(class);
}

/// Remove a class token.
#[inline]
pub fn remove_class(sel: &Selection, class: &str) {
    sel.remove_class(class);
}

/// Append HTML content.
#[inline]
pub fn append_html(sel: &Selection, html: &str) {
    sel.append_html(html);
}

/// Remove elements from the tree.
#[inline]
pub fn remove(sel: &Selection) {
    sel.remove();
}

// === Querying ===

/// Select with a selector that may come from user input.
///
/// Returns `Error::InvalidSelector` when the selector does not parse instead
/// of silently matching nothing.
pub fn query_all<'a>(doc: &'a Document, selector: &str) -> Result<Selection<'a>> {
    let selector = validate_selector(selector)?;
    Ok(doc.select(selector))
}

/// Check selector syntax; returns the trimmed selector.
pub fn validate_selector(selector: &str) -> Result<&str> {
    let selector = selector.trim();
    if selector.is_empty() || dom_query::Matcher::new(selector).is_err() {
        return Err(Error::InvalidSelector(selector.to_string()));
    }
    Ok(selector)
}

/// Number of elements the selector matches; zero for invalid selectors.
#[must_use]
pub fn count_matches(doc: &Document, selector: &str) -> usize {
    query_all(doc, selector).map_or(0, |sel| sel.length())
}

/// Precomputed set of element ids matching one selector.
///
/// Answers `closest(selector)` questions in O(depth) with O(1) lookups
/// instead of re-running the selector for every candidate element.
#[derive(Debug, Default, Clone)]
pub struct NodeSet {
    ids: HashSet<NodeId>,
}

impl NodeSet {
    /// Collect every element matching `selector` in `doc`.
    #[must_use]
    pub fn from_selector(doc: &Document, selector: &str) -> Self {
        let ids = doc.select(selector).nodes().iter().map(|node| node.id).collect();
        Self { ids }
    }

    /// Whether the first node of `sel` is in the set.
    #[must_use]
    pub fn contains(&self, sel: &Selection) -> bool {
        node_id(sel).is_some_and(|id| self.ids.contains(&id))
    }

    /// Nearest element (self included) that belongs to the set.
    #[must_use]
    pub fn closest<'a>(&self, sel: &Selection<'a>) -> Option<Selection<'a>> {
        self_and_ancestors(sel).find(|s| self.contains(s))
    }

    /// Whether the element or any ancestor belongs to the set.
    #[must_use]
    pub fn covers(&self, sel: &Selection) -> bool {
        self.closest(sel).is_some()
    }

    /// Number of elements in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Escape a class or id token for use in a CSS selector.
#[must_use]
pub fn css_escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    for (i, ch) in ident.chars().enumerate() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii() {
            if i == 0 && ch.is_ascii_digit() {
                out.push_str(&format!("\\{:x} ", u32::from(ch)));
            } else {
                out.push(ch);
            }
        } else {
            out.push('\\');
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_skip_reserved_prefix() {
        let doc = parse(r#"<div class="catchup-highlight post item">x</div>"#);
        let div = doc.select("div");
        assert_eq!(classes(&div), vec!["post", "item"]);
        assert_eq!(first_class(&div).as_deref(), Some("post"));
    }

    #[test]
    fn node_set_closest_finds_ancestor() {
        let doc = parse(r#"<nav><ul><li><a id="x" href="/">Home</a></li></ul></nav><p id="y">p</p>"#);
        let excluded = NodeSet::from_selector(&doc, "nav");
        assert!(excluded.covers(&doc.select("#x")));
        assert!(!excluded.covers(&doc.select("#y")));
    }

    #[test]
    fn query_all_rejects_invalid_selector() {
        let doc = parse("<p>x</p>");
        assert!(matches!(query_all(&doc, "p[["), Err(Error::InvalidSelector(_))));
        assert!(matches!(query_all(&doc, "   "), Err(Error::InvalidSelector(_))));
        assert_eq!(count_matches(&doc, "p"), 1);
    }

    #[test]
    fn css_escape_handles_special_characters() {
        assert_eq!(css_escape("board-list"), "board-list");
        assert_eq!(css_escape("w-1/2"), "w-1\\/2");
        assert_eq!(css_escape("1col"), "\\31 col");
    }

    #[test]
    fn text_len_counts_trimmed_chars() {
        let doc = parse("<p>  안녕하세요  </p>");
        assert_eq!(text_len(&doc.select("p")), 5);
    }
}
