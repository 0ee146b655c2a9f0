//! crates/playlist_core/src/listen_queue.rs
//!
//! The ordered "listen later" queue of a single user session. Mirrors the
//! reading list, except entries are keyed by rendition and carry an explicit
//! `queue_order` that new entries append after.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{AudioVersion, ListenQueueEntry, MutationOutcome, NewListenQueueEntry, Notice};
use crate::playback::PlaybackEffect;
use crate::ports::{ListenQueueStore, NoticeSink, PortError};

pub struct ListenQueueService {
    store: Arc<dyn ListenQueueStore>,
    notices: Arc<dyn NoticeSink>,
    entries: Vec<ListenQueueEntry>,
    loaded: bool,
}

impl ListenQueueService {
    pub fn new(store: Arc<dyn ListenQueueStore>, notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            store,
            notices,
            entries: Vec::new(),
            loaded: false,
        }
    }

    /// Refetches the queue in `queue_order`. A failed fetch degrades to an empty queue.
    pub async fn list(&mut self, user_id: Uuid) -> &[ListenQueueEntry] {
        match self.store.list_queue_entries(user_id).await {
            Ok(entries) => self.entries = entries,
            Err(e) => {
                error!(%user_id, error = %e, "Failed to fetch listen queue");
                self.entries.clear();
            }
        }
        self.loaded = true;
        &self.entries
    }

    pub fn entries(&self) -> &[ListenQueueEntry] {
        &self.entries
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Order the next appended entry receives: one past the current maximum,
    /// or 1 for an empty queue. Gaps left by removals are never reused.
    pub fn next_queue_order(&self) -> i32 {
        self.entries
            .iter()
            .map(|e| e.queue_order)
            .max()
            .map_or(1, |max| max + 1)
    }

    pub async fn add(
        &mut self,
        user_id: Uuid,
        article_id: Uuid,
        version: AudioVersion,
    ) -> MutationOutcome {
        let new_entry = NewListenQueueEntry {
            user_id,
            article_id,
            audio_version: version,
            queue_order: self.next_queue_order(),
        };

        match self.store.insert_queue_entry(new_entry).await {
            Ok(entry) => {
                info!(
                    %user_id, %article_id, %version,
                    queue_order = entry.queue_order,
                    "Rendition queued"
                );
                self.notices
                    .notify(Notice::success(format!("Added to playlist ({})", version.label())));
                self.list(user_id).await;
                MutationOutcome::Applied
            }
            Err(PortError::UniqueViolation(_)) => {
                self.notices
                    .notify(Notice::info("This version is already in your playlist"));
                MutationOutcome::Unchanged
            }
            Err(e) => {
                error!(%user_id, %article_id, %version, error = %e, "Failed to queue rendition");
                self.notices.notify(Notice::error("Could not add to playlist"));
                MutationOutcome::Failed
            }
        }
    }

    pub async fn remove(&mut self, user_id: Uuid, entry_id: Uuid) -> MutationOutcome {
        match self.store.delete_queue_entry(user_id, entry_id).await {
            Ok(()) => {
                self.entries.retain(|e| e.id != entry_id);
                self.notices.notify(Notice::success("Removed from playlist"));
                MutationOutcome::Applied
            }
            Err(e) => {
                error!(%user_id, %entry_id, error = %e, "Failed to remove from playlist");
                self.notices.notify(Notice::error("Could not remove from playlist"));
                MutationOutcome::Failed
            }
        }
    }

    /// Silent on both success and failure; completion marks entries played
    /// without user involvement.
    pub async fn mark_played(
        &mut self,
        user_id: Uuid,
        entry_id: Uuid,
        is_played: bool,
    ) -> MutationOutcome {
        match self.store.set_played(user_id, entry_id, is_played).await {
            Ok(()) => {
                if let Some(entry) = self.entries.iter_mut().find(|e| e.id == entry_id) {
                    entry.is_played = is_played;
                    entry.played_at = is_played.then(Utc::now);
                }
                MutationOutcome::Applied
            }
            Err(e) => {
                error!(%user_id, %entry_id, is_played, error = %e, "Failed to update played status");
                MutationOutcome::Failed
            }
        }
    }

    /// Best-effort checkpoint of the playback position. Throttling is the
    /// caller's job.
    pub async fn update_progress(&mut self, user_id: Uuid, entry_id: Uuid, seconds: u32) {
        if let Err(e) = self
            .store
            .set_progress_seconds(user_id, entry_id, seconds)
            .await
        {
            warn!(%entry_id, seconds, error = %e, "Failed to save playback progress");
            return;
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == entry_id) {
            entry.progress_seconds = seconds;
        }
    }

    /// Persists a new `queue_order`. The in-memory field is patched but the
    /// collection is not re-sorted; refetch to observe the new order.
    pub async fn reorder(
        &mut self,
        user_id: Uuid,
        entry_id: Uuid,
        new_order: i32,
    ) -> MutationOutcome {
        match self.store.set_queue_order(user_id, entry_id, new_order).await {
            Ok(()) => {
                if let Some(entry) = self.entries.iter_mut().find(|e| e.id == entry_id) {
                    entry.queue_order = new_order;
                }
                MutationOutcome::Applied
            }
            Err(e) => {
                error!(%user_id, %entry_id, new_order, error = %e, "Failed to reorder playlist");
                self.notices.notify(Notice::error("Could not reorder playlist"));
                MutationOutcome::Failed
            }
        }
    }

    pub async fn clear_played(&mut self, user_id: Uuid) -> MutationOutcome {
        match self.store.delete_played_entries(user_id).await {
            Ok(removed) => {
                info!(%user_id, removed, "Cleared played audio");
                self.entries.retain(|e| !e.is_played);
                self.notices.notify(Notice::success("Played audio cleared"));
                MutationOutcome::Applied
            }
            Err(e) => {
                error!(%user_id, error = %e, "Failed to clear played audio");
                self.notices.notify(Notice::error("Could not clear playlist"));
                MutationOutcome::Failed
            }
        }
    }

    /// True when any rendition of the article is queued.
    pub fn is_in_list(&self, article_id: Uuid) -> bool {
        self.entries.iter().any(|e| e.article_id == article_id)
    }

    pub fn is_queued(&self, article_id: Uuid, version: AudioVersion) -> bool {
        self.entries
            .iter()
            .any(|e| e.article_id == article_id && e.audio_version == version)
    }

    /// Remaining listening time in seconds across unplayed entries.
    pub fn total_duration(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| !e.is_played)
            .map(|e| u64::from(e.duration_seconds()))
            .sum()
    }

    /// Writes back what the playback controller asked for.
    pub async fn apply_playback_effects(&mut self, user_id: Uuid, effects: Vec<PlaybackEffect>) {
        for effect in effects {
            match effect {
                PlaybackEffect::SaveProgress { entry_id, seconds } => {
                    self.update_progress(user_id, entry_id, seconds).await;
                }
                PlaybackEffect::MarkPlayed { entry_id } => {
                    self.mark_played(user_id, entry_id, true).await;
                }
            }
        }
    }
}
