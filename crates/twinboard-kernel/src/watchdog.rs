//! [`FeedWatchdog`] – cycle-counted input liveness.
//!
//! The dispatcher reports once per cycle whether each input feed delivered a
//! new sample. A feed is [`AppStatus::Online`] while fewer than its
//! threshold of consecutive cycles have passed without one, and
//! [`AppStatus::Offline`] from the cycle the count reaches the threshold.
//!
//! Time is measured only in dispatch cycles; there is no wall clock here.
//! A feed starts offline until its first sample arrives.

use std::collections::HashMap;

use tracing::{info, warn};
use twinboard_types::AppStatus;

struct FeedEntry {
    missed: u32,
    stale_after: u32,
    status: AppStatus,
}

/// Tracks consecutive missed cycles per named feed.
///
/// # Example
///
/// ```
/// use twinboard_kernel::watchdog::FeedWatchdog;
/// use twinboard_types::AppStatus;
///
/// let mut wd = FeedWatchdog::new();
/// wd.register("operator", 2);
/// assert_eq!(wd.observe("operator", true), AppStatus::Online);
/// assert_eq!(wd.observe("operator", false), AppStatus::Online);
/// assert_eq!(wd.observe("operator", false), AppStatus::Offline);
/// ```
#[derive(Default)]
pub struct FeedWatchdog {
    feeds: HashMap<String, FeedEntry>,
}

impl FeedWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `feed`, declaring it offline after `stale_after` consecutive
    /// cycles without a sample (minimum 1). Re-registering resets it.
    pub fn register(&mut self, feed: &str, stale_after: u32) {
        let stale_after = stale_after.max(1);
        self.feeds.insert(
            feed.to_string(),
            FeedEntry {
                missed: stale_after,
                stale_after,
                status: AppStatus::Offline,
            },
        );
    }

    /// Record this cycle's outcome for `feed` and return its status.
    ///
    /// Unknown feeds are reported offline.
    pub fn observe(&mut self, feed: &str, fresh: bool) -> AppStatus {
        let Some(entry) = self.feeds.get_mut(feed) else {
            return AppStatus::Offline;
        };
        entry.missed = if fresh {
            0
        } else {
            entry.missed.saturating_add(1)
        };
        let status = if entry.missed < entry.stale_after {
            AppStatus::Online
        } else {
            AppStatus::Offline
        };
        if status != entry.status {
            match status {
                AppStatus::Online => info!(feed, "input feed online"),
                _ => warn!(feed, missed = entry.missed, "input feed offline"),
            }
            entry.status = status;
        }
        status
    }

    /// Status as of the last [`observe`](Self::observe).
    pub fn status(&self, feed: &str) -> AppStatus {
        self.feeds
            .get(feed)
            .map_or(AppStatus::Offline, |entry| entry.status)
    }

    /// Consecutive missed cycles of `feed`.
    pub fn missed(&self, feed: &str) -> Option<u32> {
        self.feeds.get(feed).map(|entry| entry.missed)
    }

    /// Names of all feeds currently offline, sorted.
    pub fn offline_feeds(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .feeds
            .iter()
            .filter(|(_, entry)| entry.status != AppStatus::Online)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}
