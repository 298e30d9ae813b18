//! Snapshot Differ
//!
//! Decides whether a page changed since the last check and which records are
//! new. A SHA-256 over the joined titles is the cheap "anything changed" gate;
//! when it trips, new records are found by subtracting the previous link set.
//! Without a usable previous snapshot a positional heuristic takes over that
//! assumes new items are prepended.
//!
//! The same logic serves HTML posts (keyed by link) and feed items (keyed by
//! guid) through the [`Identified`] trait.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::extractor::PostRecord;

/// A record that can be diffed.
pub trait Identified {
    /// Stable dedup key (link or guid). Empty means "unknown".
    fn identity(&self) -> &str;

    /// Text that feeds the change hash.
    fn fingerprint(&self) -> &str;
}

impl Identified for PostRecord {
    fn identity(&self) -> &str {
        &self.link
    }

    fn fingerprint(&self) -> &str {
        &self.title
    }
}

/// Lowercase hex SHA-256 of the fingerprints joined with `|`.
#[must_use]
pub fn hash_titles<T: Identified>(items: &[T]) -> String {
    let joined = items.iter().map(Identified::fingerprint).collect::<Vec<_>>().join("|");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// State persisted from the previous successful check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<T = PostRecord> {
    /// Hash of the previous titles; `None` before the first check.
    pub hash: Option<String>,
    /// Number of records seen last time.
    pub count: usize,
    /// Previous records, when kept.
    pub posts: Option<Vec<T>>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self { hash: None, count: 0, posts: None }
    }
}

/// Result of one diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOutcome<T = PostRecord> {
    /// Hash of the current records.
    pub hash: String,
    /// A previous hash existed and differs from `hash`.
    pub changed: bool,
    /// Records judged new, in current order.
    pub new_posts: Vec<T>,
}

impl<T> DiffOutcome<T> {
    /// Changed and at least one record is new.
    #[must_use]
    pub fn has_new_posts(&self) -> bool {
        self.changed && !self.new_posts.is_empty()
    }
}

/// Records of `current` whose identity is absent from `previous`.
#[must_use]
pub fn diff_by_identity<T: Identified + Clone>(previous: &[T], current: &[T]) -> Vec<T> {
    let seen: HashSet<&str> = previous.iter().map(Identified::identity).collect();
    current
        .iter()
        .filter(|item| !seen.contains(item.identity()))
        .cloned()
        .collect()
}

/// Compare the current records with the previous snapshot.
///
/// The first check (no previous hash) only establishes a baseline.
#[must_use]
pub fn diff<T: Identified + Clone>(previous: &Snapshot<T>, current: &[T]) -> DiffOutcome<T> {
    let hash = hash_titles(current);
    let changed = previous.hash.as_deref().is_some_and(|old| old != hash);

    let new_posts = if changed {
        match previous.posts.as_deref() {
            Some(old) if old.iter().all(|p| !p.identity().is_empty()) => diff_by_identity(old, current),
            _ => {
                let added = current.len().saturating_sub(previous.count);
                current[..added].to_vec()
            }
        }
    } else {
        Vec::new()
    };

    DiffOutcome { hash, changed, new_posts }
}
