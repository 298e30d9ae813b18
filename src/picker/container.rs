//! Post container resolution and selector generation for the picker.
//!
//! The element under the pointer is usually a leaf (a link, a date span).
//! The container search walks up to the smallest ancestor that looks like one
//! repetition of a post, requiring proof of repetition among its siblings.

use dom_query::{Document, Selection};

use crate::dom::{self, NodeSet};

/// Regions the picker never selects from.
const PICKER_EXCLUDE: &str = "nav, header, footer, .nav, .header, .footer, .menu, .sidebar, .navigation";

const STRUCTURAL: &str = "nav, header, footer";

const LIST_ROW_EXCLUDE: &str = "nav, header, footer, .menu, .nav, ul.menu, ol.menu";

/// Class fragments that mark a post-like container.
const POST_CLASS_HINTS: &[&str] = &[
    "post",
    "article",
    "item",
    "card",
    "entry",
    "content-item",
    "list-item",
];

fn nearest<'a>(element: &Selection<'a>, pred: impl Fn(&Selection<'a>) -> bool) -> Option<Selection<'a>> {
    dom::self_and_ancestors(element).find(|s| pred(s))
}

fn is_tag(sel: &Selection, tags: &[&str]) -> bool {
    dom::tag_name(sel).is_some_and(|t| tags.contains(&t.as_str()))
}

/// Siblings (self included) with the same tag carrying `class`.
fn repeated_siblings(el: &Selection, tag: &str, class: &str) -> usize {
    let parent = el.parent();
    if !parent.exists() {
        return 0;
    }
    dom::element_children(&parent)
        .iter()
        .filter(|sib| dom::tag_name(sib).as_deref() == Some(tag) && dom::classes(sib).iter().any(|c| c == class))
        .count()
}

fn repeats_by_first_class(el: &Selection, tag: &str) -> bool {
    dom::first_class(el).is_some_and(|class| repeated_siblings(el, tag, &class) >= 2)
}

/// Find the post container for the element under the pointer.
///
/// Priority: `article`, then a post-like class repeated among siblings, then
/// an `li`/`tr` whose parent has at least 3 children, then a linked
/// `div[class]` whose first class repeats.
#[must_use]
pub fn find_post_container<'a>(doc: &'a Document, element: &Selection<'a>) -> Option<Selection<'a>> {
    if NodeSet::from_selector(doc, PICKER_EXCLUDE).covers(element) {
        return None;
    }
    let structural = NodeSet::from_selector(doc, STRUCTURAL);

    if let Some(article) = nearest(element, |s| is_tag(s, &["article"])) {
        if !structural.covers(&article) {
            return Some(article);
        }
    }

    let post_like = nearest(element, |s| {
        let class = dom::class_name(s);
        POST_CLASS_HINTS.iter().any(|hint| class.contains(hint))
    });
    if let Some(el) = post_like.filter(|el| !structural.covers(el)) {
        let tag = dom::tag_name(&el).unwrap_or_default();
        if repeats_by_first_class(&el, &tag) {
            return Some(el);
        }
    }

    if let Some(row) = nearest(element, |s| is_tag(s, &["li", "tr"])) {
        let excluded = NodeSet::from_selector(doc, LIST_ROW_EXCLUDE);
        if !excluded.covers(&row) && dom::element_children(&row.parent()).len() >= 3 {
            return Some(row);
        }
    }

    let div = nearest(element, |s| is_tag(s, &["div"]) && s.has_attr("class"));
    if let Some(div) = div.filter(|d| !structural.covers(d)) {
        if dom::has_link(&div) && repeats_by_first_class(&div, "div") {
            return Some(div);
        }
    }

    None
}

/// Build a selector that repeats the container.
///
/// Tries the container's first class, then `.parentClass > tag`, then
/// `#parentId > tag`, each only if it matches more than one element, and
/// finally the bare tag name.
#[must_use]
pub fn generate_selector(doc: &Document, container: &Selection) -> String {
    let tag = dom::tag_name(container).unwrap_or_else(|| "div".to_string());
    let parent = container.parent();
    if !parent.exists() {
        return tag;
    }

    let repeats = |selector: &str| dom::count_matches(doc, selector) > 1;

    if let Some(class) = dom::first_class(container) {
        let selector = format!(".{}", dom::css_escape(&class));
        if repeats(&selector) {
            return selector;
        }
    }

    if let Some(parent_class) = dom::first_class(&parent) {
        let selector = format!(".{} > {tag}", dom::css_escape(&parent_class));
        if repeats(&selector) {
            return selector;
        }
    }

    if let Some(parent_id) = dom::id(&parent) {
        let selector = format!("#{} > {tag}", dom::css_escape(&parent_id));
        if repeats(&selector) {
            return selector;
        }
    }

    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_wins_over_inner_classes() {
        let doc = dom::parse(
            r#"<main><article><div class="card-body"><a id="t" href="/1">One</a></div></article><article>Two</article></main>"#,
        );
        let container = find_post_container(&doc, &doc.select("#t")).unwrap();
        assert_eq!(dom::tag_name(&container).as_deref(), Some("article"));
        assert_eq!(generate_selector(&doc, &container), "article");
    }

    #[test]
    fn repeated_post_class_is_container() {
        let doc = dom::parse(
            r#"<div class="feed"><div class="post-item x"><span id="t">A</span></div><div class="post-item">B</div></div>"#,
        );
        let container = find_post_container(&doc, &doc.select("#t")).unwrap();
        assert_eq!(generate_selector(&doc, &container), ".post-item");
    }

    #[test]
    fn table_row_needs_three_siblings() {
        let doc = dom::parse(
            r#"<table id="b"><tr><td><a id="t" href="/1">One</a></td></tr><tr><td>2</td></tr><tr><td>3</td></tr></table>"#,
        );
        let row = find_post_container(&doc, &doc.select("#t")).unwrap();
        assert_eq!(dom::tag_name(&row).as_deref(), Some("tr"));
        // the parser inserts tbody, which has no class or id
        assert_eq!(generate_selector(&doc, &row), "tr");
    }

    #[test]
    fn parent_class_selector_used_when_items_unclassed() {
        let doc = dom::parse(
            r#"<ul class="threads"><li><a id="t" href="/1">One</a></li><li>Two</li><li>Three</li></ul>"#,
        );
        let li = find_post_container(&doc, &doc.select("#t")).unwrap();
        assert_eq!(generate_selector(&doc, &li), ".threads > li");
    }

    #[test]
    fn navigation_is_never_a_container() {
        let doc = dom::parse(
            r#"<nav><ul><li><a id="t" href="/">Home</a></li><li>A</li><li>B</li></ul></nav>"#,
        );
        assert!(find_post_container(&doc, &doc.select("#t")).is_none());
    }
}
