//! A watched board over two checks, backed by an in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use rs_catchup::fetch::{ExtractPath, PageExtraction, PageSource};
use rs_catchup::monitor::{SiteStatus, SITE_STATES_KEY};
use rs_catchup::store::{KeyValueStore, MemoryStore, StoreScope};
use rs_catchup::{extract_posts, Candidate, Result, SiteChecker, SiteRegistry};

const SITE: &str = "https://forum.example.kr/board";

/// Serves whatever page HTML is currently set, parsed in-process.
struct LivePage(Mutex<String>);

impl LivePage {
    fn set(&self, html: String) {
        *self.0.lock().unwrap() = html;
    }
}

#[async_trait]
impl PageSource for LivePage {
    async fn extract(&self, url: &Url, selector: Option<&str>) -> Result<PageExtraction> {
        let html = self.0.lock().unwrap().clone();
        let selector = selector.unwrap_or("li.post");
        let posts = extract_posts(&html, selector, url.as_str())?;
        Ok(PageExtraction { posts, selector: selector.to_string(), path: ExtractPath::Fetch })
    }

    async fn detect(&self, _url: &Url) -> Result<Option<Candidate>> {
        Ok(None)
    }
}

fn page(ids: &[u32]) -> String {
    let items: String = ids
        .iter()
        .map(|id| format!(r#"<li class="post"><a href="/board/{id}">Topic {id}</a><span class="date">1h</span></li>"#))
        .collect();
    format!("<html><body><ul>{items}</ul></body></html>")
}

#[tokio::test]
async fn second_check_reports_the_prepended_post() {
    let store = Arc::new(MemoryStore::new());
    let registry = SiteRegistry::new(store.clone());
    registry.register_site(SITE, Some("li.post")).await.unwrap();

    let source = Arc::new(LivePage(Mutex::new(page(&[3, 2, 1]))));
    let checker = SiteChecker::new(registry.clone(), source.clone(), rs_catchup::Options::default());

    let first = checker.check_site(0).await.unwrap();
    assert!(first.success);
    assert_eq!(first.new_count, 0);
    let state = registry.state(SITE).await.unwrap();
    assert!(state.last_hash.is_some());
    assert_eq!(state.last_count, 3);
    assert_eq!(state.status, SiteStatus::Active);

    source.set(page(&[4, 3, 2, 1]));
    let second = checker.check_site(0).await.unwrap();
    assert_eq!(second.new_count, 1);
    assert_eq!(second.new_posts[0].link, "https://forum.example.kr/board/4");

    let state = registry.state(SITE).await.unwrap();
    assert_eq!(state.new_count, 1);
    assert_eq!(state.last_count, 4);
    assert_eq!(state.last_posts.as_ref().map(Vec::len), Some(4));
    assert_ne!(state.last_hash, first_hash(&page(&[3, 2, 1])));

    // States persist in the local scope.
    assert!(store.get(StoreScope::Local, SITE_STATES_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn unchanged_page_keeps_count_at_zero() {
    let registry = SiteRegistry::new(Arc::new(MemoryStore::new()));
    registry.register_site(SITE, Some("li.post")).await.unwrap();
    let source = Arc::new(LivePage(Mutex::new(page(&[2, 1]))));
    let checker = SiteChecker::new(registry.clone(), source, rs_catchup::Options::default());

    checker.check_site(0).await.unwrap();
    let again = checker.check_site(0).await.unwrap();
    assert_eq!(again.new_count, 0);

    let report = checker.check_all().await.unwrap();
    assert!(report.success);
    assert_eq!(report.total_new, 0);
    assert!(report.notifications.is_empty());
}

#[tokio::test]
async fn selector_that_stops_matching_marks_error() {
    let registry = SiteRegistry::new(Arc::new(MemoryStore::new()));
    registry.register_site(SITE, Some("li.post")).await.unwrap();
    let source = Arc::new(LivePage(Mutex::new("<html><body><p>Redesigned</p></body></html>".into())));
    let checker = SiteChecker::new(registry.clone(), source, rs_catchup::Options::default());

    let result = checker.check_site(0).await.unwrap();
    assert!(!result.success);
    assert_eq!(registry.state(SITE).await.unwrap().status, SiteStatus::Error);
}

fn first_hash(html: &str) -> Option<String> {
    let posts = extract_posts(html, "li.post", SITE).unwrap();
    Some(rs_catchup::differ::hash_titles(&posts))
}

#[tokio::test(start_paused = true)]
async fn daily_schedule_checks_then_stops_on_shutdown() {
    use rs_catchup::schedule::{run_daily, CheckTime};
    use tokio::sync::watch;

    let registry = SiteRegistry::new(Arc::new(MemoryStore::new()));
    registry.register_site(SITE, Some("li.post")).await.unwrap();
    let source = Arc::new(LivePage(Mutex::new(page(&[2, 1]))));
    let checker = Arc::new(SiteChecker::new(registry.clone(), source, rs_catchup::Options::default()));

    let (tx, rx) = watch::channel(false);
    let runner = {
        let checker = checker.clone();
        tokio::spawn(async move { run_daily(&checker, CheckTime::default(), rx).await })
    };

    // Non-stop signals keep the scheduler waiting.
    tx.send(false).unwrap();

    // Paused time jumps straight to the next scheduled instant.
    let mut waited = 0;
    while registry.state(SITE).await.unwrap().last_check.is_none() {
        assert!(waited < 48, "no check within two days");
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        waited += 1;
    }
    assert_eq!(registry.state(SITE).await.unwrap().last_count, 2);

    tx.send(true).unwrap();
    runner.await.unwrap();
}
