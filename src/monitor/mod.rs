//! Watched sites: registration, per-site state and the check pipeline.
//!
//! [`SiteRegistry`] owns the persisted site list and check states;
//! [`SiteChecker`] pulls posts through a [`PageSource`](crate::fetch::PageSource),
//! diffs them against the stored snapshot and records the result.

pub mod checker;
pub mod model;
pub mod registry;

pub use checker::SiteChecker;
pub use model::{
    CheckReport, NewPost, SiteCheckResult, SiteCheckState, SiteStates, SiteStatus, WatchedSite, SITES_KEY,
    SITE_STATES_KEY,
};
pub use registry::{Registration, SiteRegistry};
