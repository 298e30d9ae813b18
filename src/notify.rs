//! Badge aggregation, user settings and notification payloads.
//!
//! Every source (watched sites, feeds, connected platforms) contributes a
//! count of new items. The badge shows their sum, gated by the per-source
//! toggles in [`Settings`]. Delivering notifications is up to the host; this
//! module only builds the payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::extractor::PostRecord;
use crate::schedule::CheckTime;

/// Sync-scope key of [`Settings`].
pub const SETTINGS_KEY: &str = "settings";

/// Titles listed in a new-posts notification.
const PREVIEW_TITLES: usize = 3;

/// Characters kept per listed title.
const PREVIEW_TITLE_CHARS: usize = 40;

/// Which sources count towards the badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceToggles {
    /// Watched web pages.
    pub sites: bool,
    /// RSS/Atom feeds.
    pub feeds: bool,
    /// Per platform name; missing entries are enabled.
    pub platforms: BTreeMap<String, bool>,
}

impl Default for SourceToggles {
    fn default() -> Self {
        Self { sites: true, feeds: true, platforms: BTreeMap::new() }
    }
}

impl SourceToggles {
    /// Whether the named platform counts.
    #[must_use]
    pub fn platform_enabled(&self, name: &str) -> bool {
        self.platforms.get(name).copied().unwrap_or(true)
    }
}

/// User settings, stored in the sync scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Daily check time.
    pub check_time: CheckTime,
    /// Show a notification when new posts are found.
    pub show_notification: bool,
    /// Per-source badge toggles.
    pub sources: SourceToggles,
}

impl Default for Settings {
    fn default() -> Self {
        Self { check_time: CheckTime::default(), show_notification: true, sources: SourceToggles::default() }
    }
}

/// New-item counts per source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    /// Sum of `newCount` over watched sites.
    pub sites: usize,
    /// Sum of `newCount` over feeds.
    pub feeds: usize,
    /// `(platform name, count)` pairs.
    pub platforms: Vec<(String, usize)>,
}

/// Total badge count across enabled sources.
#[must_use]
pub fn aggregate_badge(counts: &SourceCounts, settings: &Settings) -> usize {
    let toggles = &settings.sources;
    let mut total = 0;
    if toggles.sites {
        total += counts.sites;
    }
    if toggles.feeds {
        total += counts.feeds;
    }
    total += counts
        .platforms
        .iter()
        .filter(|(name, _)| toggles.platform_enabled(name))
        .map(|(_, n)| n)
        .sum::<usize>();
    total
}

/// Badge text: `!` while a login is required, blank for zero, else the count.
#[must_use]
pub fn badge_text(total: usize, login_required: bool) -> String {
    if login_required {
        "!".to_string()
    } else if total == 0 {
        String::new()
    } else {
        total.to_string()
    }
}

/// Notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// New posts were found.
    NewPosts,
    /// One or more sites need a fresh login.
    LoginRequired,
}

/// A notification ready for the host to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Kind.
    pub kind: NotificationKind,
    /// Title line.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Keep on screen until dismissed.
    pub require_interaction: bool,
}

impl NotificationPayload {
    /// "N new posts" with up to three bulleted, truncated titles.
    #[must_use]
    pub fn new_posts<'a>(total: usize, posts: impl IntoIterator<Item = &'a PostRecord>) -> Self {
        let message = posts
            .into_iter()
            .take(PREVIEW_TITLES)
            .map(|p| format!("• {}", p.title.chars().take(PREVIEW_TITLE_CHARS).collect::<String>()))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            kind: NotificationKind::NewPosts,
            title: format!("{total} new post{}!", if total == 1 { "" } else { "s" }),
            message,
            require_interaction: false,
        }
    }

    /// Login reminder naming the affected hosts.
    #[must_use]
    pub fn login_required(hostnames: &[String]) -> Self {
        Self {
            kind: NotificationKind::LoginRequired,
            title: "Login required".to_string(),
            message: format!("Please log in again to {}.", hostnames.join(", ")),
            require_interaction: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str) -> PostRecord {
        PostRecord { title: title.into(), link: "https://x.test/".into(), ..PostRecord::default() }
    }

    #[test]
    fn badge_respects_toggles() {
        let counts = SourceCounts {
            sites: 2,
            feeds: 3,
            platforms: vec![("github".into(), 4), ("gmail".into(), 5)],
        };
        let mut settings = Settings::default();
        assert_eq!(aggregate_badge(&counts, &settings), 14);

        settings.sources.feeds = false;
        settings.sources.platforms.insert("gmail".into(), false);
        assert_eq!(aggregate_badge(&counts, &settings), 6);
    }

    #[test]
    fn badge_text_forms() {
        assert_eq!(badge_text(0, false), "");
        assert_eq!(badge_text(12, false), "12");
        assert_eq!(badge_text(12, true), "!");
    }

    #[test]
    fn new_posts_body_lists_three_truncated_titles() {
        let long = "x".repeat(60);
        let posts = [post(&long), post("b"), post("c"), post("d")];
        let payload = NotificationPayload::new_posts(4, &posts);
        assert_eq!(payload.title, "4 new posts!");
        let lines: Vec<_> = payload.message.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].chars().count(), 2 + 40);
        assert_eq!(lines[2], "• c");
    }

    #[test]
    fn settings_default_when_fields_missing() {
        let settings: Settings = serde_json::from_str(r#"{"showNotification": false}"#).unwrap();
        assert!(!settings.show_notification);
        assert_eq!(settings.check_time, CheckTime::default());
        assert!(settings.sources.sites);
    }
}
