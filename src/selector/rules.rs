//! Priority tables for post detection.
//!
//! Each table is an ordered list of `(pattern, priority)` descriptors.
//! Site-specific patterns come first and carry the highest priorities;
//! generic fallbacks close each table. Only the relative ordering matters:
//! site-specific special cases > table/article semantics > generic class
//! patterns > generic list scan.

/// One selector pattern and the base score it contributes when it matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternRule {
    /// CSS selector matching candidate post elements.
    pub pattern: &'static str,
    /// Base score for matches of this pattern.
    pub priority: f64,
}

const fn rule(pattern: &'static str, priority: f64) -> PatternRule {
    PatternRule { pattern, priority }
}

/// Regions whose contents are never posts: site chrome, menus, paging.
pub const EXCLUDE_SELECTOR: &str = "nav, header, footer, \
    .nav, .header, .footer, .menu, .sidebar, .navigation, \
    [role=\"navigation\"], [role=\"menu\"], [role=\"menubar\"], \
    .gnb, .lnb, .snb, .quick, .quickmenu, \
    .top-menu, .main-menu, .sub-menu, .site-menu, \
    .breadcrumb, .pagination, .paging";

/// Lists that are menus even when their classes look innocent.
pub const MENU_LIST_SELECTOR: &str = "ul.menu, ul.nav, ul.navigation, ul.gnb, ul.lnb, ul.snb, \
    ul.main-menu, ul.sub-menu, ul.site-menu, ul.top-menu, \
    nav ul, header ul, .nav ul, .menu ul, .navigation ul, \
    [role=\"navigation\"] ul, [role=\"menu\"] ul";

/// Known board row patterns, accepted as soon as enough rows qualify.
pub const SPECIAL_ROW_RULES: &[PatternRule] = &[
    rule(".table_body .table_row", 135.0),
    rule("tr.baseList", 130.0),
    rule("tr.athing", 130.0),
    rule("tr.list0, tr.list1", 125.0),
    rule("tr[class*=\"post\"]", 120.0),
    rule("tr[class*=\"article\"]", 120.0),
];

/// Class and attribute patterns for div-style post markup.
pub const CLASS_RULES: &[PatternRule] = &[
    // Site-specific
    rule(".topic_row", 100.0),
    rule(".crayons-story", 100.0),
    rule(".table_body .table_row", 100.0),
    rule(".board_list_table tbody tr", 100.0),
    rule(".list_item:not(.notice)", 98.0),
    rule(".symph_row", 98.0),
    rule(".content_list > div", 95.0),
    rule("[data-testid=\"post-container\"]", 95.0),
    rule(".Post", 90.0),
    // Generic post naming
    rule("[class*=\"post-item\"]", 90.0),
    rule("[class*=\"article-item\"]", 90.0),
    rule("[class*=\"board-item\"]", 90.0),
    rule("[class*=\"news-item\"]", 88.0),
    rule("[class*=\"story-item\"]", 88.0),
    rule("[class*=\"list-item\"]:not([class*=\"menu\"])", 85.0),
    rule("[class*=\"content-item\"]", 85.0),
    // Cards and entries
    rule(".card:not(.menu-card):not(.nav-card)", 75.0),
    rule(".post:not(.menu-post)", 75.0),
    rule(".article:not(.menu-article)", 75.0),
    rule(".item:not(.menu-item):not(.nav-item)", 70.0),
    rule(".entry", 70.0),
    rule(".story", 70.0),
];

/// Explicit `ul`/`ol` board patterns, ranking lists first.
pub const LIST_RULES: &[PatternRule] = &[
    rule("ol.list_popular > li", 100.0),
    rule("ol.list_best > li", 100.0),
    rule("ol.list_hot > li", 100.0),
    rule("ol.list_new > li", 100.0),
    rule("ol.list_recent > li", 100.0),
    rule("ol[class*=\"popular\"] > li", 98.0),
    rule("ol[class*=\"best\"] > li", 98.0),
    rule(".list_popular > li", 95.0),
    rule(".list_best > li", 95.0),
    rule(".list_hot > li", 95.0),
    rule(".list_new > li", 95.0),
    rule(".list_recent > li", 95.0),
    rule(".list_latest > li", 95.0),
    rule("[class*=\"popular\"] > li", 90.0),
    rule("[class*=\"best\"] > li", 90.0),
    // Generic boards
    rule("ol.board-list > li", 88.0),
    rule("ol.post-list > li", 88.0),
    rule("ul.board-list > li", 85.0),
    rule("ul.post-list > li", 85.0),
    rule("ul.article-list > li", 85.0),
    rule("ul.notice-list > li", 85.0),
    rule("ul.bbs-list > li", 85.0),
    rule(".board-list > li", 80.0),
    rule(".list-wrap > li", 75.0),
    rule(".list-body > li", 75.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn is_non_increasing(rules: &[PatternRule]) -> bool {
        rules.windows(2).all(|w| w[0].priority >= w[1].priority)
    }

    #[test]
    fn tables_are_in_priority_order() {
        assert!(is_non_increasing(SPECIAL_ROW_RULES));
        assert!(is_non_increasing(CLASS_RULES));
        assert!(is_non_increasing(LIST_RULES));
    }

    #[test]
    fn all_patterns_parse() {
        for rule in SPECIAL_ROW_RULES.iter().chain(CLASS_RULES).chain(LIST_RULES) {
            assert!(dom_query::Matcher::new(rule.pattern).is_ok(), "{}", rule.pattern);
        }
        assert!(dom_query::Matcher::new(EXCLUDE_SELECTOR).is_ok());
        assert!(dom_query::Matcher::new(MENU_LIST_SELECTOR).is_ok());
    }
}
