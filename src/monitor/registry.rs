//! Watched-site registry.
//!
//! Site definitions live in the quota-bound sync scope, check states in the
//! local scope. Registration runs the quota preflight before anything is
//! written, so a rejected site leaves both scopes untouched.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::dom;
use crate::error::{Error, Result};
use crate::notify::{Settings, SETTINGS_KEY};
use crate::store::{get_json, set_json, KeyValueStore, StorageUsage, StoreScope, SyncQuota};

use super::model::{SiteCheckState, SiteStates, WatchedSite, SITES_KEY, SITE_STATES_KEY};

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// The stored site.
    pub site: WatchedSite,
    /// Storage warning when usage is getting close to the quota.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Usage before the write.
    pub usage: StorageUsage,
}

/// Sites, their check states and user settings over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SiteRegistry {
    store: Arc<dyn KeyValueStore>,
    quota: SyncQuota,
    /// Serializes read-modify-write cycles on `siteStates`.
    states_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for SiteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteRegistry").field("quota", &self.quota).finish_non_exhaustive()
    }
}

impl SiteRegistry {
    /// Registry with the standard sync quota.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_quota(store, SyncQuota::default())
    }

    /// Registry with a custom quota.
    #[must_use]
    pub fn with_quota(store: Arc<dyn KeyValueStore>, quota: SyncQuota) -> Self {
        Self { store, quota, states_lock: Arc::new(Mutex::new(())) }
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Watched sites in stored order.
    pub async fn list_sites(&self) -> Result<Vec<WatchedSite>> {
        Ok(get_json(self.store.as_ref(), StoreScope::Sync, SITES_KEY).await?.unwrap_or_default())
    }

    async fn save_sites(&self, sites: &[WatchedSite]) -> Result<()> {
        set_json(self.store.as_ref(), StoreScope::Sync, SITES_KEY, &sites).await
    }

    /// Add a site.
    ///
    /// Fails with [`Error::DuplicateSite`] for a known URL and with
    /// [`Error::QuotaExceeded`] when the entry would push the sync scope past
    /// the block threshold. A `None` selector auto-detects at check time.
    pub async fn register_site(&self, url: &str, selector: Option<&str>) -> Result<Registration> {
        let url = url.trim();
        Url::parse(url).map_err(|e| Error::Config(format!("invalid url {url:?}: {e}")))?;
        let selector = selector.map(dom::validate_selector).transpose()?.map(str::to_string);

        let mut sites = self.list_sites().await?;
        if sites.iter().any(|s| s.url == url) {
            return Err(Error::DuplicateSite(url.to_string()));
        }

        let site = WatchedSite { url: url.to_string(), selector, added_at: Utc::now() };
        let warning = self.quota.preflight(self.store.as_ref(), &site).await?;
        let usage = self.quota.usage(self.store.as_ref()).await?;

        sites.push(site.clone());
        self.save_sites(&sites).await?;

        {
            let _guard = self.states_lock.lock().await;
            let mut states = self.load_states().await?;
            states.insert(site.url.clone(), SiteCheckState::default());
            self.store_states(&states).await?;
        }

        info!(url = %site.url, selector = ?site.selector, "site registered");
        Ok(Registration { site, warning, usage })
    }

    /// Remove a site and its check state.
    pub async fn remove_site(&self, url: &str) -> Result<WatchedSite> {
        let mut sites = self.list_sites().await?;
        let index = sites
            .iter()
            .position(|s| s.url == url)
            .ok_or_else(|| Error::NotFound(url.to_string()))?;
        let removed = sites.remove(index);
        self.save_sites(&sites).await?;

        self.update_states(|states| {
            states.remove(url);
        })
        .await?;
        info!(url, "site removed");
        Ok(removed)
    }

    /// Replace a site's selector; `None` switches it to auto-detection.
    pub async fn update_selector(&self, url: &str, selector: Option<&str>) -> Result<()> {
        let selector = selector.map(dom::validate_selector).transpose()?.map(str::to_string);
        let mut sites = self.list_sites().await?;
        let site = sites
            .iter_mut()
            .find(|s| s.url == url)
            .ok_or_else(|| Error::NotFound(url.to_string()))?;
        site.selector = selector;
        self.save_sites(&sites).await
    }

    async fn load_states(&self) -> Result<SiteStates> {
        Ok(get_json(self.store.as_ref(), StoreScope::Local, SITE_STATES_KEY).await?.unwrap_or_default())
    }

    async fn store_states(&self, states: &SiteStates) -> Result<()> {
        set_json(self.store.as_ref(), StoreScope::Local, SITE_STATES_KEY, states).await
    }

    /// All check states keyed by URL.
    pub async fn states(&self) -> Result<SiteStates> {
        self.load_states().await
    }

    /// Check state of one site; default when never checked.
    pub async fn state(&self, url: &str) -> Result<SiteCheckState> {
        Ok(self.load_states().await?.remove(url).unwrap_or_default())
    }

    /// Apply `f` to the stored states under the states lock.
    pub async fn update_states<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut SiteStates) + Send,
    {
        let _guard = self.states_lock.lock().await;
        let mut states = self.load_states().await?;
        f(&mut states);
        self.store_states(&states).await
    }

    /// Store the state of one site.
    pub async fn save_state(&self, url: &str, state: SiteCheckState) -> Result<()> {
        let url = url.to_string();
        self.update_states(move |states| {
            states.insert(url, state);
        })
        .await
    }

    /// Clear the unread posts of one site.
    pub async fn mark_read(&self, url: &str) -> Result<()> {
        let _guard = self.states_lock.lock().await;
        let mut states = self.load_states().await?;
        states
            .get_mut(url)
            .ok_or_else(|| Error::NotFound(url.to_string()))?
            .clear_new();
        self.store_states(&states).await
    }

    /// Clear the unread posts of every site.
    pub async fn mark_all_read(&self) -> Result<()> {
        self.update_states(|states| states.values_mut().for_each(SiteCheckState::clear_new)).await
    }

    /// Sum of unread posts over all sites.
    pub async fn total_new_count(&self) -> Result<usize> {
        Ok(self.load_states().await?.values().map(|s| s.new_count).sum())
    }

    /// Move sites from the local scope to sync when sync has none.
    ///
    /// Returns the number of sites moved. Only `url`, `selector` and
    /// `addedAt` are kept; stray fields of the legacy entries are dropped.
    pub async fn migrate_local_sites(&self) -> Result<usize> {
        if !self.list_sites().await?.is_empty() {
            return Ok(0);
        }
        let legacy: Vec<WatchedSite> =
            get_json(self.store.as_ref(), StoreScope::Local, SITES_KEY).await?.unwrap_or_default();
        if legacy.is_empty() {
            return Ok(0);
        }
        self.save_sites(&legacy).await?;
        self.store.remove(StoreScope::Local, SITES_KEY).await?;
        debug!(count = legacy.len(), "migrated local sites to sync");
        Ok(legacy.len())
    }

    /// Sync-scope usage.
    pub async fn usage(&self) -> Result<StorageUsage> {
        self.quota.usage(self.store.as_ref()).await
    }

    /// User settings; defaults when never saved.
    pub async fn settings(&self) -> Result<Settings> {
        Ok(get_json(self.store.as_ref(), StoreScope::Sync, SETTINGS_KEY).await?.unwrap_or_default())
    }

    /// Persist user settings.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        set_json(self.store.as_ref(), StoreScope::Sync, SETTINGS_KEY, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::model::SiteStatus;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn registry() -> SiteRegistry {
        SiteRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn register_writes_site_and_initial_state() {
        let reg = registry();
        let out = reg.register_site(" https://a.test/board ", Some(".post")).await.unwrap();
        assert_eq!(out.site.url, "https://a.test/board");
        assert!(out.warning.is_none());

        let sites = reg.list_sites().await.unwrap();
        assert_eq!(sites.len(), 1);
        let state = reg.state("https://a.test/board").await.unwrap();
        assert_eq!(state.status, SiteStatus::Active);
        assert!(state.last_hash.is_none());
    }

    #[tokio::test]
    async fn duplicate_and_invalid_input_rejected() {
        let reg = registry();
        reg.register_site("https://a.test/", None).await.unwrap();
        assert!(matches!(
            reg.register_site("https://a.test/", None).await,
            Err(Error::DuplicateSite(_))
        ));
        assert!(matches!(
            reg.register_site("https://b.test/", Some("div[")).await,
            Err(Error::InvalidSelector(_))
        ));
        assert!(matches!(reg.register_site("not a url", None).await, Err(Error::Config(_))));
        assert_eq!(reg.list_sites().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quota_block_leaves_store_untouched() {
        let quota = SyncQuota { quota: 100, ..SyncQuota::default() };
        let reg = SiteRegistry::with_quota(Arc::new(MemoryStore::new()), quota);
        let err = reg.register_site("https://a.test/", None).await.unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { .. }));
        assert!(reg.list_sites().await.unwrap().is_empty());
        assert!(reg.states().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_drops_state_and_mark_read_clears() {
        let reg = registry();
        reg.register_site("https://a.test/", None).await.unwrap();
        reg.register_site("https://b.test/", None).await.unwrap();

        let state = SiteCheckState {
            new_count: 1,
            new_posts: vec![crate::PostRecord { title: "t".into(), ..Default::default() }],
            ..SiteCheckState::default()
        };
        reg.save_state("https://b.test/", state).await.unwrap();
        assert_eq!(reg.total_new_count().await.unwrap(), 1);

        reg.mark_read("https://b.test/").await.unwrap();
        assert_eq!(reg.total_new_count().await.unwrap(), 0);
        assert!(matches!(reg.mark_read("https://c.test/").await, Err(Error::NotFound(_))));

        reg.remove_site("https://a.test/").await.unwrap();
        assert!(!reg.states().await.unwrap().contains_key("https://a.test/"));
    }

    #[tokio::test]
    async fn selector_updates_validate() {
        let reg = registry();
        reg.register_site("https://a.test/", None).await.unwrap();
        reg.update_selector("https://a.test/", Some(" .row ")).await.unwrap();
        assert_eq!(reg.list_sites().await.unwrap()[0].selector.as_deref(), Some(".row"));
        assert!(matches!(
            reg.update_selector("https://a.test/", Some("li[")).await,
            Err(Error::InvalidSelector(_))
        ));
        assert!(matches!(reg.update_selector("https://z.test/", None).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn legacy_local_sites_migrate_once() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                StoreScope::Local,
                SITES_KEY,
                json!([{"url": "https://a.test/", "selector": null, "addedAt": "2024-01-01T00:00:00Z", "extra": 1}]),
            )
            .await
            .unwrap();
        let reg = SiteRegistry::new(store.clone());
        assert_eq!(reg.migrate_local_sites().await.unwrap(), 1);
        assert_eq!(reg.list_sites().await.unwrap()[0].url, "https://a.test/");
        assert_eq!(store.get(StoreScope::Local, SITES_KEY).await.unwrap(), None);
        assert_eq!(reg.migrate_local_sites().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn settings_default_then_saved() {
        let reg = registry();
        assert!(reg.settings().await.unwrap().show_notification);
        let settings = Settings { show_notification: false, ..Settings::default() };
        reg.save_settings(&settings).await.unwrap();
        assert!(!reg.settings().await.unwrap().show_notification);
    }
}
