//! Persisted site types and per-check results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::differ::Snapshot;
use crate::extractor::PostRecord;
use crate::notify::NotificationPayload;

/// Sync-scope key of the watched site list.
pub const SITES_KEY: &str = "sites";

/// Local-scope key of the per-site check states.
pub const SITE_STATES_KEY: &str = "siteStates";

/// A watched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedSite {
    /// Page URL, also the state key.
    pub url: String,
    /// Post selector; `None` auto-detects at check time.
    #[serde(default)]
    pub selector: Option<String>,
    /// Registration time.
    pub added_at: DateTime<Utc>,
}

/// Site status shown next to each watched page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    /// Last check succeeded.
    #[default]
    Active,
    /// No selector and auto-detection found nothing.
    NeedsSelector,
    /// Login wall detected.
    LoginRequired,
    /// Last check failed; see `error_message`.
    Error,
}

/// Check state of one site, stored in the local scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteCheckState {
    /// Last check attempt.
    pub last_check: Option<DateTime<Utc>>,
    /// Title hash of `last_posts`.
    pub last_hash: Option<String>,
    /// Number of posts seen last time.
    pub last_count: usize,
    /// Capped snapshot used for the next diff.
    pub last_posts: Option<Vec<PostRecord>>,
    /// Unread count, always `new_posts.len()`.
    pub new_count: usize,
    /// Unread posts, capped.
    pub new_posts: Vec<PostRecord>,
    /// Status.
    pub status: SiteStatus,
    /// Message of the last failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SiteCheckState {
    /// The previous snapshot for diffing.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            hash: self.last_hash.clone(),
            count: self.last_count,
            posts: self.last_posts.clone(),
        }
    }

    /// Reset the unread list.
    pub fn clear_new(&mut self) {
        self.new_count = 0;
        self.new_posts.clear();
    }
}

/// Check states keyed by site URL.
pub type SiteStates = BTreeMap<String, SiteCheckState>;

/// Outcome of checking one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteCheckResult {
    /// Site URL.
    pub url: String,
    /// The check produced a snapshot.
    pub success: bool,
    /// No selector could be found.
    pub needs_selector: bool,
    /// Login wall.
    pub needs_login: bool,
    /// Unread posts after this check.
    pub new_count: usize,
    /// Posts that are new in this check.
    #[serde(skip)]
    pub new_posts: Vec<PostRecord>,
    /// Resulting status.
    pub status: SiteStatus,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A new post tagged with the site it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    /// The post.
    #[serde(flatten)]
    pub post: PostRecord,
    /// Host of the watched site.
    pub hostname: String,
    /// Watched site URL.
    pub site_url: String,
}

/// Summary of one check-all pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    /// Whether the pass ran.
    pub success: bool,
    /// New posts found across all sites.
    pub total_new: usize,
    /// Those posts, tagged.
    pub new_posts: Vec<NewPost>,
    /// Hostnames that need a login.
    pub login_required: Vec<String>,
    /// Notifications to show.
    pub notifications: Vec<NotificationPayload>,
    /// Per-site outcomes in stored order.
    pub results: Vec<SiteCheckResult>,
    /// Pass-level failure, e.g. no sites registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_camel_case_keys() {
        let state = SiteCheckState { status: SiteStatus::LoginRequired, ..SiteCheckState::default() };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "login_required");
        assert!(json.get("lastHash").is_some());
        assert!(json.get("errorMessage").is_none());
    }

    #[test]
    fn legacy_state_without_fields_loads() {
        let state: SiteCheckState = serde_json::from_str(r#"{"lastHash":"abc","newCount":2}"#).unwrap();
        assert_eq!(state.last_hash.as_deref(), Some("abc"));
        assert_eq!(state.status, SiteStatus::Active);
        assert!(state.snapshot().posts.is_none());
    }
}
