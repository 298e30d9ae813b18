//! Snapshot diffing across consecutive checks.

use rs_catchup::differ::hash_titles;
use rs_catchup::{diff, PostRecord, Snapshot};

fn post(title: &str, link: &str) -> PostRecord {
    PostRecord { title: title.into(), link: link.into(), ..PostRecord::default() }
}

fn snapshot_of(posts: &[PostRecord]) -> Snapshot {
    Snapshot { hash: Some(hash_titles(posts)), count: posts.len(), posts: Some(posts.to_vec()) }
}

#[test]
fn unchanged_page_reports_nothing() {
    let posts = vec![post("A", "/a"), post("B", "/b"), post("C", "/c")];
    let out = diff(&snapshot_of(&posts), &posts);
    assert!(!out.changed);
    assert!(out.new_posts.is_empty());
    assert_eq!(Some(out.hash), snapshot_of(&posts).hash);
}

#[test]
fn reordered_page_yields_only_unseen_links() {
    let before = [post("A", "/a"), post("B", "/b"), post("C", "/c")];
    let after = [post("C", "/c"), post("B", "/b"), post("A", "/a"), post("D", "/d")];
    let out = diff(&snapshot_of(&before), &after);
    assert!(out.changed);
    assert!(out.has_new_posts());
    assert_eq!(out.new_posts, vec![post("D", "/d")]);
}

#[test]
fn hash_tracks_titles_only() {
    let base = [post("A", "/a")];
    let retitled = [post("A!", "/a")];
    let mut redated = base.clone();
    redated[0].date = "2024.01.01".into();
    redated[0].author = "someone".into();

    assert_ne!(hash_titles(&base), hash_titles(&retitled));
    assert_eq!(hash_titles(&base), hash_titles(&redated));
}

#[test]
fn second_check_after_baseline_finds_prepended_post() {
    let first = vec![post("A", "/a"), post("B", "/b")];
    let baseline = diff(&Snapshot::default(), &first);
    assert!(!baseline.changed);

    let previous = Snapshot { hash: Some(baseline.hash), count: first.len(), posts: Some(first.clone()) };
    let mut second = vec![post("New", "/new")];
    second.extend(first);
    let out = diff(&previous, &second);
    assert_eq!(out.new_posts, vec![post("New", "/new")]);
}
