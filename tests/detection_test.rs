//! Selector detection over whole pages.

use rs_catchup::selector::{self, Source};
use rs_catchup::{detect, detect_with_options, dom, Options};

fn board_page(rows: usize) -> String {
    let rows: String = (1..=rows)
        .map(|i| {
            format!(
                r#"<tr><td class="num">{i}</td><td class="subject"><a href="/bbs/view/{i}">Weekly community notice number {i}</a></td><td class="date">24.03.{:02}</td></tr>"#,
                i % 28 + 1
            )
        })
        .collect();
    format!(
        r#"<html><body>
        <header><ul><li><a href="/">Home</a></li><li><a href="/bbs">Board</a></li></ul></header>
        <div class="board-list"><table>{rows}</table></div>
        <footer><a href="/terms">Terms</a></footer>
        </body></html>"#
    )
}

#[test]
fn ten_row_board_table_is_detected() {
    let found = detect(&board_page(10)).expect("board detected");
    assert_eq!(found.selector, ".board-list table tbody tr");
    assert_eq!(found.match_count, 10);
    assert_eq!(found.source, Source::Table);
    // base + 10..100 rows + date + "board" class keyword
    assert!(found.score >= 120.0);
    assert_eq!(found.score, 195.0);
}

#[test]
fn navigation_only_page_has_no_posts() {
    let links: String = (1..=12)
        .map(|i| format!(r#"<li><a href="/section/{i}">Section {i}</a></li>"#))
        .collect();
    let html = format!("<html><body><nav><ul>{links}</ul></nav><p>Welcome</p></body></html>");
    assert!(detect(&html).is_none());
}

#[test]
fn acceptance_threshold_is_respected() {
    let options = Options { acceptance_score: 1_000.0, ..Options::default() };
    assert!(detect_with_options(&board_page(10), &options).is_none());

    // The winner is the best-scoring candidate.
    let doc = dom::parse(&board_page(10));
    let all = selector::candidates(&doc, &Options::default());
    let found = selector::detect(&doc, &Options::default()).expect("board detected");
    assert!(all.iter().all(|c| c.score <= found.score));
}

#[test]
fn detected_selector_always_matches_two_or_more() {
    let pages = [
        board_page(6),
        board_page(30),
        (1..=4)
            .map(|i| format!(r#"<article><h3><a href="/a/{i}">Story {i}</a></h3></article>"#))
            .collect(),
    ];
    for page in &pages {
        let doc = dom::parse(page);
        if let Some(found) = selector::detect(&doc, &Options::default()) {
            assert!(found.score >= 50.0);
            assert!(dom::count_matches(&doc, &found.selector) >= 2);
        }
    }
}

#[test]
fn generic_content_list_is_detected() {
    let items: String = (1..=8)
        .map(|i| format!(r#"<li><a href="/news/{i}">A reasonably long headline for story {i}</a></li>"#))
        .collect();
    let html = format!(r#"<html><body><div><ul>{items}</ul></div></body></html>"#);
    let found = detect(&html).expect("list detected");
    assert_eq!(found.source, Source::List);
    assert_eq!(found.selector, "ul > li");
    assert_eq!(found.match_count, 8);
}

#[test]
fn post_selector_survives_extraction() {
    let html = board_page(10);
    let found = detect(&html).expect("board detected");
    let posts = rs_catchup::extract_posts(&html, &found.selector, "https://bbs.example.kr/bbs/list").unwrap();
    assert_eq!(posts.len(), 10);
    assert_eq!(posts[0].title, "Weekly community notice number 1");
    assert_eq!(posts[0].link, "https://bbs.example.kr/bbs/view/1");
    assert_eq!(posts[0].date, "24.03.02");
}
