//! Compiled regex patterns used by detection and extraction.
//!
//! All patterns are compiled once at first use via `LazyLock`.

#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use regex::Regex;

// =============================================================================
// Date Patterns
// =============================================================================

/// Full dates such as `2024-01-15`, `2024.1.5`, `2024/01/15`.
pub static FULL_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}[.\-/]\d{1,2}[.\-/]\d{1,2}").expect("FULL_DATE regex")
});

/// Short board-style dates such as `01-15` or `1.5`.
pub static SHORT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}[.\-/]\d{1,2}").expect("SHORT_DATE regex"));

// =============================================================================
// Class Keyword Patterns
// =============================================================================

/// Table or enclosing-div class names that indicate a board.
pub static TABLE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"board|list|bbs|notice|post|article|tbl|table").expect("TABLE_CLASS regex")
});

/// List classes that name a list of posts (popular, best, recent...).
pub static POST_LIST_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)popular|best|hot|new|recent|latest|article|post|board|notice|bbs|news|list_article|list_post",
    )
    .expect("POST_LIST_CLASS regex")
});

/// List-parent classes that suggest a generic board container.
pub static LIST_PARENT_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"list|board|bbs|notice|post|article").expect("LIST_PARENT_CLASS regex")
});

/// List classes that are never post lists (sliders, tabs, menus...).
pub static NON_POST_LIST_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)favorite|slider|banner|carousel|swiper|tab|gnb|lnb|snb|menu|nav|footer|info")
        .expect("NON_POST_LIST_CLASS regex")
});

/// Menu and site-chrome keywords in list or parent classes.
pub static MENU_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"menu|nav|gnb|lnb|snb|quick|sitemap|breadcrumb|footer").expect("MENU_CLASS regex")
});

/// Ranked list items start with a number (`1 Title`, `23 Title`).
pub static RANKING_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s").expect("RANKING_PREFIX regex"));

// =============================================================================
// Text Cleaning Patterns
// =============================================================================

/// Matches whitespace runs for normalization.
pub static WHITESPACE_NORMALIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("WHITESPACE_NORMALIZE regex"));

/// Collapse whitespace runs to single spaces and trim.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_NORMALIZE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_patterns_match_board_dates() {
        assert!(FULL_DATE.is_match("2024-01-15"));
        assert!(FULL_DATE.is_match("작성일 2024.1.5"));
        assert!(!FULL_DATE.is_match("24-01"));
        assert!(SHORT_DATE.is_match("01-15"));
        assert!(SHORT_DATE.is_match("3.14"));
    }

    #[test]
    fn post_list_class_matches_ranking_lists() {
        assert!(POST_LIST_CLASS.is_match("list_popular"));
        assert!(POST_LIST_CLASS.is_match("Best-Articles"));
        assert!(!POST_LIST_CLASS.is_match("gallery"));
    }

    #[test]
    fn non_post_list_class_rejects_chrome() {
        assert!(NON_POST_LIST_CLASS.is_match("main-slider"));
        assert!(NON_POST_LIST_CLASS.is_match("tabs"));
        assert!(!NON_POST_LIST_CLASS.is_match("board-list"));
    }

    #[test]
    fn normalize_whitespace_collapses_runs() {
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
    }
}
