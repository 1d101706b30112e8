//! Change notification.
//!
//! Subscribers receive only the category that changed and re-read the
//! catalog through its getters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::broadcast;

const ASPECT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionAspect {
    /// The ordered artifact list was republished.
    SessionsChanged,
    ProfilingSessionChanged,
    SelectedSessionChanged,
    /// A live session was observed ending.
    OngoingSessionNewlyEnded,
    /// Transient item state (duration, agent wait) moved.
    ItemsUpdated,
}

/// Broadcast side of the aspect channel.
#[derive(Debug, Clone)]
pub(crate) struct AspectPublisher {
    sender: broadcast::Sender<SessionAspect>,
}

impl AspectPublisher {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(ASPECT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionAspect> {
        self.sender.subscribe()
    }

    pub(crate) fn publish(&self, pending: PendingAspects) {
        for aspect in pending.0 {
            // No subscribers is fine.
            let _ = self.sender.send(aspect);
        }
    }
}

/// Aspects collected during one state transition, fired once each afterwards.
#[derive(Debug, Default)]
pub(crate) struct PendingAspects(BTreeSet<SessionAspect>);

impl PendingAspects {
    pub(crate) fn mark(&mut self, aspect: SessionAspect) {
        self.0.insert(aspect);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
