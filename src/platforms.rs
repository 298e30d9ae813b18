//! Third-party platform sources (mail, video, code hosting, social).
//!
//! No client ships with this crate. Each integration implements
//! [`PlatformSource`] and contributes its unread count to the badge next to
//! sites and feeds.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::Result;

/// Connection status of a platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStatus {
    /// A usable token is stored.
    pub connected: bool,
    /// Account name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

/// New items reported by a platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformItems {
    /// Unread count.
    pub count: usize,
    /// Platform-specific item payloads.
    #[serde(default)]
    pub items: Vec<Value>,
}

/// A platform client.
#[async_trait]
pub trait PlatformSource: Send + Sync {
    /// Stable name, also the settings toggle key (`github`, `gmail`, ...).
    fn name(&self) -> &str;

    /// Whether the client is connected.
    async fn get_status(&self) -> Result<PlatformStatus>;

    /// Fetch unread items.
    async fn check_new(&self) -> Result<PlatformItems>;

    /// Mark everything as seen.
    async fn mark_seen(&self) -> Result<()>;
}

/// `(name, count)` for every connected platform; failures count as zero.
pub async fn platform_counts(platforms: &[Arc<dyn PlatformSource>]) -> Vec<(String, usize)> {
    let mut counts = Vec::with_capacity(platforms.len());
    for platform in platforms {
        let connected = match platform.get_status().await {
            Ok(status) => status.connected,
            Err(e) => {
                warn!(platform = platform.name(), error = %e, "status check failed");
                false
            }
        };
        if !connected {
            continue;
        }
        let count = match platform.check_new().await {
            Ok(items) => items.count,
            Err(e) => {
                warn!(platform = platform.name(), error = %e, "platform check failed");
                0
            }
        };
        counts.push((platform.name().to_string(), count));
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Fixed {
        name: &'static str,
        connected: bool,
        count: Option<usize>,
    }

    #[async_trait]
    impl PlatformSource for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn get_status(&self) -> Result<PlatformStatus> {
            Ok(PlatformStatus { connected: self.connected, account: None })
        }

        async fn check_new(&self) -> Result<PlatformItems> {
            self.count
                .map(|count| PlatformItems { count, items: Vec::new() })
                .ok_or_else(|| Error::HttpStatus(401))
        }

        async fn mark_seen(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn counts_skip_disconnected_and_zero_failures() {
        let platforms: Vec<Arc<dyn PlatformSource>> = vec![
            Arc::new(Fixed { name: "github", connected: true, count: Some(3) }),
            Arc::new(Fixed { name: "gmail", connected: false, count: Some(9) }),
            Arc::new(Fixed { name: "reddit", connected: true, count: None }),
        ];
        let counts = platform_counts(&platforms).await;
        assert_eq!(counts, vec![("github".to_string(), 3), ("reddit".to_string(), 0)]);
    }
}
