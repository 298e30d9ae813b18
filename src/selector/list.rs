//! List-based board detection.
//!
//! Runs in two passes. Explicit ranking/board list patterns are scored first
//! and accepted outright above [`Options::list_accept_score`]. Otherwise every
//! `ul`/`ol` is scanned: content lists have long linked items, navigation
//! lists have short ones, and the valid-item ratio separates the two.
//!
//! [`Options::list_accept_score`]: crate::Options::list_accept_score

use dom_query::Selection;

use super::rules::{LIST_RULES, MENU_LIST_SELECTOR};
use super::{keep_best, linked_fraction, Candidate, DetectContext, Source};
use crate::dom::{self, NodeSet};
use crate::patterns::{
    FULL_DATE, LIST_PARENT_CLASS, MENU_CLASS, NON_POST_LIST_CLASS, POST_LIST_CLASS, RANKING_PREFIX,
};

const GENERIC_LIST_BASE_SCORE: f64 = 50.0;

fn is_valid_item(li: &Selection) -> bool {
    let len = dom::text_len(li);
    dom::has_link(li) && len > 20 && len < 500
}

/// First pass over the explicit list pattern table.
fn detect_by_pattern(ctx: &DetectContext) -> Option<Candidate> {
    let mut best = None;

    for rule in LIST_RULES {
        let valid = ctx.valid_matches(rule.pattern);
        if valid.len() < ctx.options.min_pattern_matches {
            continue;
        }

        let mut score = rule.priority + linked_fraction(&valid) * 30.0;
        if (5..=50).contains(&valid.len()) {
            score += 20.0;
        }
        if valid
            .iter()
            .any(|el| RANKING_PREFIX.is_match(dom::text_content(el).trim()))
        {
            score += 15.0;
        }

        keep_best(
            &mut best,
            Candidate {
                selector: rule.pattern.to_string(),
                match_count: valid.len(),
                score,
                source: Source::List,
            },
        );
    }

    best
}

fn list_selector(list: &Selection, tag: &str) -> String {
    if let Some(class) = dom::first_class(list) {
        return format!("{tag}.{} > li", dom::css_escape(&class));
    }
    if let Some(parent_class) = dom::first_class(&list.parent()) {
        return format!(".{} > {tag} > li", dom::css_escape(&parent_class));
    }
    format!("{tag} > li")
}

/// Score one generic list, `None` when it does not look like a post list.
fn score_list(ctx: &DetectContext, menus: &NodeSet, list: &Selection) -> Option<Candidate> {
    if ctx.is_excluded(list) || menus.covers(list) {
        return None;
    }

    let list_class = dom::class_name(list).to_lowercase();
    let parent_class = dom::class_name(&list.parent()).to_lowercase();
    let combined = format!("{list_class} {parent_class}");

    if NON_POST_LIST_CLASS.is_match(&combined) || MENU_CLASS.is_match(&combined) {
        return None;
    }

    let items: Vec<Selection> = dom::element_children(list)
        .into_iter()
        .filter(|child| dom::tag_name(child).as_deref() == Some("li"))
        .collect();
    let min_items = ctx.options.min_list_items;
    if items.len() < min_items {
        return None;
    }

    let valid = items.iter().filter(|li| is_valid_item(li)).count();
    if valid < min_items || (valid as f64) / (items.len() as f64) < ctx.options.list_valid_ratio {
        return None;
    }

    let mut score = GENERIC_LIST_BASE_SCORE;
    if valid >= 10 {
        score += 20.0;
    } else {
        score += 10.0;
    }

    if items.iter().any(|li| FULL_DATE.is_match(&dom::text_content(li))) {
        score += 15.0;
    }

    if POST_LIST_CLASS.is_match(&combined) {
        score += 40.0;
    } else if LIST_PARENT_CLASS.is_match(&parent_class) {
        score += 25.0;
    }

    let tag = dom::tag_name(list).unwrap_or_else(|| "ul".to_string());
    Some(Candidate {
        selector: list_selector(list, &tag),
        match_count: valid,
        score,
        source: Source::List,
    })
}

/// Detect a list of posts.
#[must_use]
pub fn detect_list_board(ctx: &DetectContext) -> Option<Candidate> {
    let mut best = detect_by_pattern(ctx);
    if best
        .as_ref()
        .is_some_and(|b| b.score >= ctx.options.list_accept_score)
    {
        return best;
    }

    let menus = NodeSet::from_selector(ctx.doc, MENU_LIST_SELECTOR);
    for list in dom::each(&ctx.doc.select("ul, ol")) {
        if let Some(candidate) = score_list(ctx, &menus, &list) {
            keep_best(&mut best, candidate);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Options;

    fn long_items(n: usize) -> String {
        (1..=n)
            .map(|i| format!(r#"<li><a href="/post/{i}">A reasonably long article headline number {i}</a></li>"#))
            .collect()
    }

    #[test]
    fn ranking_list_accepted_from_pattern_table() {
        let items: String = (1..=5)
            .map(|i| format!(r#"<li>{i} <a href="/best/{i}">Best post {i}</a></li>"#))
            .collect();
        let doc = dom::parse(&format!(r#"<ol class="list_best">{items}</ol>"#));
        let options = Options::default();
        let ctx = DetectContext::new(&doc, &options);

        let found = detect_list_board(&ctx).unwrap();
        assert_eq!(found.selector, "ol.list_best > li");
        // 100 + 30 linked + 20 count + 15 ranking
        assert_eq!(found.score, 165.0);
    }

    #[test]
    fn generic_list_scored_and_selector_uses_class() {
        let doc = dom::parse(&format!(r#"<div><ul class="recent-posts">{}</ul></div>"#, long_items(10)));
        let options = Options::default();
        let ctx = DetectContext::new(&doc, &options);

        let found = detect_list_board(&ctx).unwrap();
        assert_eq!(found.selector, "ul.recent-posts > li");
        assert_eq!(found.match_count, 10);
        // 50 + 20 (>=10) + 40 post-list keyword
        assert_eq!(found.score, 110.0);
    }

    #[test]
    fn generic_list_falls_back_to_parent_class() {
        let doc = dom::parse(&format!(r#"<div class="bbs-wrap"><ul>{}</ul></div>"#, long_items(6)));
        let options = Options::default();
        let ctx = DetectContext::new(&doc, &options);

        let found = detect_list_board(&ctx).unwrap();
        assert_eq!(found.selector, ".bbs-wrap > ul > li");
    }

    #[test]
    fn short_navigation_items_rejected() {
        let items: String = (1..=8).map(|i| format!(r#"<li><a href="/c/{i}">Cat {i}</a></li>"#)).collect();
        let doc = dom::parse(&format!("<div><ul>{items}</ul></div>"));
        let options = Options::default();
        let ctx = DetectContext::new(&doc, &options);
        assert!(detect_list_board(&ctx).is_none());
    }

    #[test]
    fn slider_and_menu_lists_rejected() {
        let doc = dom::parse(&format!(
            r#"<ul class="main-slider">{}</ul><div class="menu"><ul>{}</ul></div>"#,
            long_items(6),
            long_items(6)
        ));
        let options = Options::default();
        let ctx = DetectContext::new(&doc, &options);
        assert!(detect_list_board(&ctx).is_none());
    }
}
