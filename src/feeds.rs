//! RSS/Atom feed tracking.
//!
//! Decoding XML is left to a [`FeedDecoder`]; this module only tracks which
//! items were already seen. Feed items are diffed by `guid` with the same
//! identity subtraction used for HTML posts.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::differ::{self, Identified};
use crate::error::{Error, Result};
use crate::store::{get_json, set_json, KeyValueStore, StoreScope};
use crate::url_utils::short_name;

/// Sync-scope key of the feed list.
pub const FEEDS_KEY: &str = "rss_feeds";

/// Local-scope key of the feed states.
pub const FEED_STATES_KEY: &str = "rss_feed_states";

/// Guids remembered per feed.
pub const MAX_SEEN_GUIDS: usize = 50;

/// Unread items kept per feed.
pub const MAX_NEW_ITEMS: usize = 20;

/// One decoded feed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedItem {
    /// Stable id; the item link when the feed has none.
    pub guid: String,
    /// Title.
    pub title: String,
    /// Link.
    pub link: String,
    /// Publication date as ISO 8601, when known.
    #[serde(default)]
    pub pub_date: Option<String>,
    /// Author.
    #[serde(default)]
    pub author: String,
}

impl Identified for NormalizedItem {
    fn identity(&self) -> &str {
        &self.guid
    }

    fn fingerprint(&self) -> &str {
        &self.title
    }
}

/// Channel-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedInfo {
    /// Channel title.
    pub title: String,
    /// Channel description.
    pub description: String,
    /// Channel image URL.
    pub image: Option<String>,
}

/// Decoded feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    /// Items in feed order.
    pub items: Vec<NormalizedItem>,
    /// Channel metadata.
    pub info: FeedInfo,
}

/// Fetches and decodes a feed.
#[async_trait]
pub trait FeedDecoder: Send + Sync {
    /// Fetch `url` and decode RSS or Atom.
    async fn fetch_and_parse(&self, url: &str) -> Result<ParsedFeed>;
}

/// A subscribed feed, stored in the sync scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    /// Millisecond timestamp of creation, as a string.
    pub id: String,
    /// Feed URL.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Channel description.
    #[serde(default)]
    pub description: String,
    /// Channel image.
    #[serde(default)]
    pub image: Option<String>,
    /// Subscription time.
    pub added_at: DateTime<Utc>,
}

/// Per-feed state, stored in the local scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedState {
    /// Last check.
    pub last_check: Option<DateTime<Utc>>,
    /// Guids of the latest items.
    pub last_item_guids: Vec<String>,
    /// Items new in the last check, before capping.
    pub new_count: usize,
    /// Unread items, capped.
    pub new_items: Vec<NormalizedItem>,
}

impl FeedState {
    fn clear_new(&mut self) {
        self.new_count = 0;
        self.new_items.clear();
    }
}

/// Outcome of checking one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedCheck {
    /// The check succeeded.
    pub success: bool,
    /// New item count.
    pub count: usize,
    /// New items, capped.
    pub items: Vec<NormalizedItem>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Feed states keyed by feed id.
pub type FeedStates = BTreeMap<String, FeedState>;

/// Sum of stored feed new counts, readable without a decoder.
pub async fn total_new_count(store: &dyn KeyValueStore) -> Result<usize> {
    let states: FeedStates = get_json(store, StoreScope::Local, FEED_STATES_KEY).await?.unwrap_or_default();
    Ok(states.values().map(|s| s.new_count).sum())
}

/// Feed subscriptions over a [`KeyValueStore`].
pub struct FeedManager {
    store: Arc<dyn KeyValueStore>,
    decoder: Arc<dyn FeedDecoder>,
    states_lock: Mutex<()>,
}

impl std::fmt::Debug for FeedManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedManager").finish_non_exhaustive()
    }
}

fn seen_guids(items: &[NormalizedItem]) -> Vec<String> {
    items.iter().take(MAX_SEEN_GUIDS).map(|i| i.guid.clone()).collect()
}

impl FeedManager {
    /// Manager persisting to `store` and parsing through `decoder`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, decoder: Arc<dyn FeedDecoder>) -> Self {
        Self { store, decoder, states_lock: Mutex::new(()) }
    }

    /// Subscribed feeds.
    pub async fn feeds(&self) -> Result<Vec<Feed>> {
        Ok(get_json(self.store.as_ref(), StoreScope::Sync, FEEDS_KEY).await?.unwrap_or_default())
    }

    /// Feed states keyed by feed id.
    pub async fn states(&self) -> Result<FeedStates> {
        Ok(get_json(self.store.as_ref(), StoreScope::Local, FEED_STATES_KEY).await?.unwrap_or_default())
    }

    async fn update_states(&self, f: impl FnOnce(&mut FeedStates) + Send) -> Result<()> {
        let _guard = self.states_lock.lock().await;
        let mut states = self.states().await?;
        f(&mut states);
        set_json(self.store.as_ref(), StoreScope::Local, FEED_STATES_KEY, &states).await
    }

    /// Subscribe to `url`.
    ///
    /// The feed is fetched once: empty feeds are rejected and the current
    /// items become the baseline, so nothing is new right after adding.
    pub async fn add_feed(&self, url: &str, display_name: Option<&str>) -> Result<Feed> {
        let mut feeds = self.feeds().await?;
        if feeds.iter().any(|f| f.url == url) {
            return Err(Error::DuplicateSite(url.to_string()));
        }

        let parsed = self.decoder.fetch_and_parse(url).await?;
        if parsed.items.is_empty() {
            return Err(Error::ParseError(format!("no items found in feed {url}")));
        }

        let now = Utc::now();
        let mut id = now.timestamp_millis();
        while feeds.iter().any(|f| f.id == id.to_string()) {
            id += 1;
        }
        let name = match display_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None if !parsed.info.title.is_empty() => parsed.info.title.clone(),
            None => short_name(url),
        };
        let feed = Feed {
            id: id.to_string(),
            url: url.to_string(),
            name,
            description: parsed.info.description,
            image: parsed.info.image,
            added_at: now,
        };

        feeds.push(feed.clone());
        set_json(self.store.as_ref(), StoreScope::Sync, FEEDS_KEY, &feeds).await?;

        let state = FeedState { last_check: Some(now), last_item_guids: seen_guids(&parsed.items), ..FeedState::default() };
        let key = feed.id.clone();
        self.update_states(move |states| {
            states.insert(key, state);
        })
        .await?;

        info!(url, items = parsed.items.len(), "feed added");
        Ok(feed)
    }

    /// Unsubscribe and drop the state.
    pub async fn remove_feed(&self, id: &str) -> Result<()> {
        let feeds: Vec<Feed> = self.feeds().await?.into_iter().filter(|f| f.id != id).collect();
        set_json(self.store.as_ref(), StoreScope::Sync, FEEDS_KEY, &feeds).await?;
        self.update_states(|states| {
            states.remove(id);
        })
        .await
    }

    /// Check one feed for unseen guids.
    pub async fn check_feed(&self, id: &str) -> Result<FeedCheck> {
        let feed = self
            .feeds()
            .await?
            .into_iter()
            .find(|f| f.id == id)
            .ok_or_else(|| Error::NotFound(format!("feed {id}")))?;

        let parsed = self.decoder.fetch_and_parse(&feed.url).await?;
        let previous = self.states().await?.remove(id).unwrap_or_default();
        let seen: Vec<NormalizedItem> = previous
            .last_item_guids
            .into_iter()
            .map(|guid| NormalizedItem { guid, ..NormalizedItem::default() })
            .collect();
        let fresh = differ::diff_by_identity(&seen, &parsed.items);

        let state = FeedState {
            last_check: Some(Utc::now()),
            last_item_guids: seen_guids(&parsed.items),
            new_count: fresh.len(),
            new_items: fresh.into_iter().take(MAX_NEW_ITEMS).collect(),
        };
        let check = FeedCheck { success: true, count: state.new_count, items: state.new_items.clone(), error: None };
        let key = id.to_string();
        self.update_states(move |states| {
            states.insert(key, state);
        })
        .await?;
        Ok(check)
    }

    /// Check every feed; failures are reported per feed.
    pub async fn check_all_feeds(&self) -> Result<(usize, BTreeMap<String, FeedCheck>)> {
        let mut total = 0;
        let mut results = BTreeMap::new();
        for feed in self.feeds().await? {
            let check = self.check_feed(&feed.id).await.unwrap_or_else(|e| {
                warn!(url = %feed.url, error = %e, "feed check failed");
                FeedCheck { error: Some(e.to_string()), ..FeedCheck::default() }
            });
            total += check.count;
            results.insert(feed.id, check);
        }
        Ok((total, results))
    }

    /// Clear the unread items of one feed.
    pub async fn mark_feed_read(&self, id: &str) -> Result<()> {
        self.update_states(|states| {
            if let Some(state) = states.get_mut(id) {
                state.clear_new();
            }
        })
        .await
    }

    /// Clear the unread items of every feed.
    pub async fn mark_all_feeds_read(&self) -> Result<()> {
        self.update_states(|states| states.values_mut().for_each(FeedState::clear_new)).await
    }

    /// Sum of new counts over all feeds.
    pub async fn total_new_count(&self) -> Result<usize> {
        total_new_count(self.store.as_ref()).await
    }
}
