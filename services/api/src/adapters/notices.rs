//! services/api/src/adapters/notices.rs
//!
//! Fans a user's notices out to every connected player socket.

use playlist_core::domain::{Notice, NoticeKind};
use playlist_core::ports::NoticeSink;
use tokio::sync::broadcast;
use tracing::debug;

/// Notices older than this many messages are dropped for slow subscribers.
const NOTICE_BUFFER: usize = 32;

/// A `NoticeSink` backed by a broadcast channel. Sending never blocks and a
/// notice with no listener is simply dropped.
#[derive(Clone)]
pub struct BroadcastNotices {
    sender: broadcast::Sender<Notice>,
}

impl BroadcastNotices {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTICE_BUFFER);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotices {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeSink for BroadcastNotices {
    fn notify(&self, notice: Notice) {
        let kind = match notice.kind {
            NoticeKind::Success => "success",
            NoticeKind::Info => "info",
            NoticeKind::Error => "error",
        };
        debug!(kind, message = %notice.message, "Notice");
        let _ = self.sender.send(notice);
    }
}
