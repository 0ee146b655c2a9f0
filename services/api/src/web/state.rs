//! services/api/src/web/state.rs
//!
//! Defines the shared application state and the per-user list sessions.

use crate::adapters::BroadcastNotices;
use crate::config::Config;
use playlist_core::listen_queue::ListenQueueService;
use playlist_core::ports::{ListenQueueStore, ReadingListStore};
use playlist_core::reading_list::ReadingListService;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// Global Application State
//=========================================================================================

/// Holds the shared state that is accessible to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub reading_store: Arc<dyn ReadingListStore>,
    pub queue_store: Arc<dyn ListenQueueStore>,
    sessions: Mutex<HashMap<Uuid, CachedLists>>,
}

struct CachedLists {
    lists: Arc<UserLists>,
    last_used: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        reading_store: Arc<dyn ReadingListStore>,
        queue_store: Arc<dyn ListenQueueStore>,
    ) -> Self {
        Self {
            config,
            reading_store,
            queue_store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the list session of `user_id`, creating it on first use.
    ///
    /// Sessions nobody holds and nobody asked for within
    /// `session_idle_timeout` are dropped on the way.
    pub async fn lists_for(&self, user_id: Uuid) -> Arc<UserLists> {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        let idle_timeout = self.config.session_idle_timeout;

        let before = sessions.len();
        sessions.retain(|id, cached| {
            *id == user_id
                || Arc::strong_count(&cached.lists) > 1
                || now.duration_since(cached.last_used) < idle_timeout
        });
        if sessions.len() < before {
            debug!(evicted = before - sessions.len(), "Dropped idle list sessions");
        }

        let cached = sessions.entry(user_id).or_insert_with(|| {
            debug!(%user_id, "Creating list session");
            CachedLists {
                lists: Arc::new(UserLists::new(
                    user_id,
                    self.reading_store.clone(),
                    self.queue_store.clone(),
                )),
                last_used: now,
            }
        });
        cached.last_used = now;
        cached.lists.clone()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

//=========================================================================================
// Per-User List Sessions
//=========================================================================================

/// The two list services of one user plus their notice channel.
///
/// Each service sits behind its own mutex, so mutations on a user's list are
/// applied one at a time and always see the result of the previous one.
pub struct UserLists {
    pub user_id: Uuid,
    pub notices: BroadcastNotices,
    reading: Mutex<ReadingListService>,
    queue: Mutex<ListenQueueService>,
}

impl UserLists {
    pub fn new(
        user_id: Uuid,
        reading_store: Arc<dyn ReadingListStore>,
        queue_store: Arc<dyn ListenQueueStore>,
    ) -> Self {
        let notices = BroadcastNotices::new();
        let sink = Arc::new(notices.clone());
        Self {
            user_id,
            reading: Mutex::new(ReadingListService::new(reading_store, sink.clone())),
            queue: Mutex::new(ListenQueueService::new(queue_store, sink)),
            notices,
        }
    }

    /// Locks the reading list, fetching it first if this session never has.
    pub async fn reading(&self) -> MutexGuard<'_, ReadingListService> {
        let mut reading = self.reading.lock().await;
        if !reading.is_loaded() {
            reading.list(self.user_id).await;
        }
        reading
    }

    /// Locks the listen queue, fetching it first if this session never has.
    pub async fn queue(&self) -> MutexGuard<'_, ListenQueueService> {
        let mut queue = self.queue.lock().await;
        if !queue.is_loaded() {
            queue.list(self.user_id).await;
        }
        queue
    }
}
