//! services/api/src/web/feed.rs
//!
//! The in-process change feed. Every successful write announces the class day it
//! touched; live subscriptions listen here and resend their snapshot.

use classroom_core::ClassDay;
use tokio::sync::broadcast;
use tracing::debug;

/// Number of unread changes a slow subscriber may fall behind before it is told
/// it lagged.
pub const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Understanding,
    Questions,
    Window,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeChange {
    pub day: ClassDay,
    pub kind: ChangeKind,
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ScopeChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, day: &ClassDay, kind: ChangeKind) {
        // No receivers simply means nobody is watching right now.
        let watchers = self
            .sender
            .send(ScopeChange {
                day: day.clone(),
                kind,
            })
            .unwrap_or(0);
        debug!(day = %day, ?kind, watchers, "Change published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScopeChange> {
        self.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(FEED_CAPACITY)
    }
}
