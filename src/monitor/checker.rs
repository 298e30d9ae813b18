//! Site checking: extract, diff, persist.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use url::Url;

use crate::differ;
use crate::error::{Error, Result};
use crate::extractor::PostRecord;
use crate::fetch::PageSource;
use crate::notify::NotificationPayload;
use crate::url_utils::hostname;
use crate::Options;

use super::model::{CheckReport, NewPost, SiteCheckResult, SiteCheckState, SiteStatus, WatchedSite};
use super::registry::SiteRegistry;

/// Runs checks against a [`PageSource`] and records the outcome.
///
/// Checks of the same URL never overlap: a user-triggered check that races
/// the scheduled pass waits for it instead of clobbering its state.
pub struct SiteChecker {
    registry: SiteRegistry,
    source: Arc<dyn PageSource>,
    options: Options,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for SiteChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteChecker")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SiteChecker {
    /// Checker writing to `registry` and pulling pages from `source`.
    #[must_use]
    pub fn new(registry: SiteRegistry, source: Arc<dyn PageSource>, options: Options) -> Self {
        Self { registry, source, options, locks: Mutex::new(HashMap::new()) }
    }

    /// The registry this checker writes to.
    #[must_use]
    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    async fn lock_for(&self, url: &str) -> Arc<Mutex<()>> {
        self.locks.lock().await.entry(url.to_string()).or_default().clone()
    }

    /// Check the site at `index` of the stored list.
    pub async fn check_site(&self, index: usize) -> Result<SiteCheckResult> {
        let sites = self.registry.list_sites().await?;
        let site = sites
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("site #{index}")))?;
        self.check_one(site).await
    }

    /// Check one site and persist its new state.
    #[instrument(skip_all, fields(url = %site.url))]
    pub async fn check_one(&self, site: &WatchedSite) -> Result<SiteCheckResult> {
        let lock = self.lock_for(&site.url).await;
        let _flight = lock.lock().await;

        let mut state = self.registry.state(&site.url).await?;
        let outcome = match Url::parse(&site.url) {
            Ok(url) => self.source.extract(&url, site.selector.as_deref()).await.map(|page| page.posts),
            Err(e) => Err(Error::Config(format!("invalid url {:?}: {e}", site.url))),
        };
        let result = self.apply(&site.url, &mut state, outcome);
        self.registry.save_state(&site.url, state).await?;
        Ok(result)
    }

    /// Fold one extraction outcome into the site's state.
    fn apply(&self, url: &str, state: &mut SiteCheckState, outcome: Result<Vec<PostRecord>>) -> SiteCheckResult {
        let mut result = SiteCheckResult {
            url: url.to_string(),
            success: true,
            needs_selector: false,
            needs_login: false,
            new_count: 0,
            new_posts: Vec::new(),
            status: SiteStatus::Active,
            error: None,
        };

        let mut posts = match outcome {
            Ok(posts) => posts,
            Err(Error::NeedsSelector) => {
                state.status = SiteStatus::NeedsSelector;
                state.last_check = Some(Utc::now());
                result.needs_selector = true;
                result.status = state.status;
                return result;
            }
            Err(Error::NeedsLogin) => {
                state.status = SiteStatus::LoginRequired;
                state.last_check = Some(Utc::now());
                result.needs_login = true;
                result.status = state.status;
                return result;
            }
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "site check failed");
                state.status = SiteStatus::Error;
                state.error_message = Some(e.to_string());
                result.success = false;
                result.status = state.status;
                result.error = Some(e.to_string());
                return result;
            }
        };

        // The stored snapshot and the diff input must be the same list.
        posts.truncate(self.options.max_snapshot_posts);
        let diff = differ::diff(&state.snapshot(), &posts);

        let mut new_posts = if diff.has_new_posts() { diff.new_posts } else { Vec::new() };
        new_posts.truncate(self.options.max_new_posts);

        state.status = SiteStatus::Active;
        state.error_message = None;
        state.new_count = new_posts.len();
        state.new_posts.clone_from(&new_posts);
        state.last_check = Some(Utc::now());
        state.last_count = posts.len();
        state.last_hash = Some(diff.hash);
        state.last_posts = Some(posts);

        result.new_count = state.new_count;
        result.new_posts = new_posts;
        result
    }

    /// Check every site in stored order.
    ///
    /// A failing site never aborts the pass; its error lands in its state.
    pub async fn check_all(&self) -> Result<CheckReport> {
        let sites = self.registry.list_sites().await?;
        if sites.is_empty() {
            return Ok(CheckReport { error: Some("no sites registered".to_string()), ..CheckReport::default() });
        }

        let mut report = CheckReport { success: true, ..CheckReport::default() };
        for site in &sites {
            let result = match self.check_one(site).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(url = %site.url, error = %e, "could not record check");
                    SiteCheckResult {
                        url: site.url.clone(),
                        success: false,
                        needs_selector: false,
                        needs_login: false,
                        new_count: 0,
                        new_posts: Vec::new(),
                        status: SiteStatus::Error,
                        error: Some(e.to_string()),
                    }
                }
            };

            let host = hostname(&site.url);
            if result.needs_login {
                report.login_required.push(host.clone());
            }
            report.total_new += result.new_posts.len();
            report.new_posts.extend(result.new_posts.iter().map(|post| NewPost {
                post: post.clone(),
                hostname: host.clone(),
                site_url: site.url.clone(),
            }));
            report.results.push(result);
        }

        if !report.login_required.is_empty() {
            report.notifications.push(NotificationPayload::login_required(&report.login_required));
        }
        if report.total_new > 0 && self.registry.settings().await?.show_notification {
            let posts = report.new_posts.iter().map(|p| &p.post);
            report.notifications.push(NotificationPayload::new_posts(report.total_new, posts));
        }

        info!(sites = sites.len(), new_posts = report.total_new, "check pass finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{ExtractPath, PageExtraction};
    use crate::selector::Candidate;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Serves a queue of canned outcomes.
    struct Scripted(StdMutex<Vec<Result<Vec<PostRecord>>>>);

    #[async_trait]
    impl PageSource for Scripted {
        async fn extract(&self, _url: &Url, selector: Option<&str>) -> Result<PageExtraction> {
            let next = self.0.lock().unwrap().remove(0);
            next.map(|posts| PageExtraction {
                posts,
                selector: selector.unwrap_or("li").to_string(),
                path: ExtractPath::Fetch,
            })
        }

        async fn detect(&self, _url: &Url) -> Result<Option<Candidate>> {
            Ok(None)
        }
    }

    fn post(n: usize) -> PostRecord {
        PostRecord { title: format!("post {n}"), link: format!("https://a.test/{n}"), ..PostRecord::default() }
    }

    async fn checker(outcomes: Vec<Result<Vec<PostRecord>>>) -> SiteChecker {
        let registry = SiteRegistry::new(Arc::new(MemoryStore::new()));
        registry.register_site("https://a.test/", Some("li")).await.unwrap();
        SiteChecker::new(registry, Arc::new(Scripted(StdMutex::new(outcomes))), Options::default())
    }

    #[tokio::test]
    async fn statuses_follow_outcomes() {
        let checker = checker(vec![
            Err(Error::NeedsLogin),
            Err(Error::NeedsSelector),
            Err(Error::HttpStatus(503)),
        ])
        .await;

        let r = checker.check_site(0).await.unwrap();
        assert!(r.needs_login && r.success);
        assert_eq!(r.status, SiteStatus::LoginRequired);

        let r = checker.check_site(0).await.unwrap();
        assert!(r.needs_selector);

        let r = checker.check_site(0).await.unwrap();
        assert!(!r.success);
        let state = checker.registry().state("https://a.test/").await.unwrap();
        assert_eq!(state.status, SiteStatus::Error);
        assert_eq!(state.error_message.as_deref(), Some("HTTP 503"));

        assert!(matches!(checker.check_site(5).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn snapshot_capped_before_diff_and_new_capped() {
        let first: Vec<_> = (0..60).map(post).collect();
        let second: Vec<_> = (100..160).map(post).collect();
        let checker = checker(vec![Ok(first), Ok(second)]).await;

        checker.check_site(0).await.unwrap();
        let state = checker.registry().state("https://a.test/").await.unwrap();
        assert_eq!(state.last_count, 50);
        assert_eq!(state.last_posts.as_ref().map(Vec::len), Some(50));

        let r = checker.check_site(0).await.unwrap();
        assert_eq!(r.new_count, 30);
        let state = checker.registry().state("https://a.test/").await.unwrap();
        assert_eq!(state.new_count, state.new_posts.len());
    }

    #[tokio::test]
    async fn check_all_reports_and_notifies() {
        let checker = checker(vec![Ok(vec![post(1)]), Ok(vec![post(2), post(1)])]).await;
        checker.check_all().await.unwrap();
        let report = checker.check_all().await.unwrap();
        assert_eq!(report.total_new, 1);
        assert_eq!(report.new_posts[0].hostname, "a.test");
        assert_eq!(report.notifications.len(), 1);
        assert_eq!(report.notifications[0].message, "• post 2");
    }

    #[tokio::test]
    async fn check_all_without_sites() {
        let registry = SiteRegistry::new(Arc::new(MemoryStore::new()));
        let checker = SiteChecker::new(registry, Arc::new(Scripted(StdMutex::new(vec![]))), Options::default());
        let report = checker.check_all().await.unwrap();
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("no sites registered"));
    }
}
