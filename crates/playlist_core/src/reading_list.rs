//! crates/playlist_core/src/reading_list.rs
//!
//! The "read later" list of a single user session. Every store failure is
//! caught here: user-initiated mutations report through the notice channel,
//! passive writes and refreshes only log.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{MutationOutcome, Notice, ReadingListEntry};
use crate::ports::{NoticeSink, PortError, ReadingListStore};

pub struct ReadingListService {
    store: Arc<dyn ReadingListStore>,
    notices: Arc<dyn NoticeSink>,
    entries: Vec<ReadingListEntry>,
    loaded: bool,
}

impl ReadingListService {
    pub fn new(store: Arc<dyn ReadingListStore>, notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            store,
            notices,
            entries: Vec::new(),
            loaded: false,
        }
    }

    /// Refetches the list. A failed fetch degrades to an empty list.
    pub async fn list(&mut self, user_id: Uuid) -> &[ReadingListEntry] {
        match self.store.list_reading_entries(user_id).await {
            Ok(entries) => self.entries = entries,
            Err(e) => {
                error!(%user_id, error = %e, "Failed to fetch reading list");
                self.entries.clear();
            }
        }
        self.loaded = true;
        &self.entries
    }

    pub fn entries(&self) -> &[ReadingListEntry] {
        &self.entries
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub async fn add(&mut self, user_id: Uuid, article_id: Uuid) -> MutationOutcome {
        match self.store.insert_reading_entry(user_id, article_id).await {
            Ok(entry) => {
                info!(%user_id, %article_id, entry_id = %entry.id, "Article saved for later");
                self.notices.notify(Notice::success("Added to your reading list"));
                self.list(user_id).await;
                MutationOutcome::Applied
            }
            Err(PortError::UniqueViolation(_)) => {
                self.notices.notify(Notice::info("Article is already in your reading list"));
                MutationOutcome::Unchanged
            }
            Err(e) => {
                error!(%user_id, %article_id, error = %e, "Failed to add to reading list");
                self.notices.notify(Notice::error("Could not add to your reading list"));
                MutationOutcome::Failed
            }
        }
    }

    pub async fn remove(&mut self, user_id: Uuid, entry_id: Uuid) -> MutationOutcome {
        match self.store.delete_reading_entry(user_id, entry_id).await {
            Ok(()) => {
                self.entries.retain(|e| e.id != entry_id);
                self.notices.notify(Notice::success("Removed from your reading list"));
                MutationOutcome::Applied
            }
            Err(e) => {
                error!(%user_id, %entry_id, error = %e, "Failed to remove from reading list");
                self.notices.notify(Notice::error("Could not remove from your reading list"));
                MutationOutcome::Failed
            }
        }
    }

    /// Only marking as read produces a success notice; un-marking is silent.
    pub async fn mark_read(
        &mut self,
        user_id: Uuid,
        entry_id: Uuid,
        is_read: bool,
    ) -> MutationOutcome {
        match self.store.set_read(user_id, entry_id, is_read).await {
            Ok(()) => {
                if let Some(entry) = self.entries.iter_mut().find(|e| e.id == entry_id) {
                    entry.is_read = is_read;
                    entry.read_at = is_read.then(chrono::Utc::now);
                }
                if is_read {
                    self.notices.notify(Notice::success("Marked as read"));
                }
                MutationOutcome::Applied
            }
            Err(e) => {
                error!(%user_id, %entry_id, is_read, error = %e, "Failed to update read status");
                self.notices.notify(Notice::error("Could not update read status"));
                MutationOutcome::Failed
            }
        }
    }

    /// Best-effort persistence of the reading position.
    ///
    /// Progress is clamped to `[0, 1]`. For an unread entry a value below the
    /// known position is dropped; reaching `1.0` marks the entry read.
    pub async fn update_progress(&mut self, user_id: Uuid, entry_id: Uuid, progress: f32) {
        if !progress.is_finite() {
            warn!(%entry_id, progress, "Ignoring non-finite reading progress");
            return;
        }
        let progress = progress.clamp(0.0, 1.0);

        let known = self.entries.iter().find(|e| e.id == entry_id);
        if let Some(entry) = known {
            if !entry.is_read && progress < entry.reading_progress {
                debug!(%entry_id, progress, current = entry.reading_progress, "Skipping backwards progress");
                return;
            }
        }
        let mark_read = progress >= 1.0 && known.map_or(true, |e| !e.is_read);

        if let Err(e) = self
            .store
            .set_reading_progress(user_id, entry_id, progress, mark_read)
            .await
        {
            warn!(%entry_id, error = %e, "Failed to save reading progress");
            return;
        }

        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == entry_id) {
            entry.reading_progress = progress;
            if mark_read {
                entry.is_read = true;
                entry.read_at = Some(chrono::Utc::now());
            }
        }
    }

    pub async fn clear_read(&mut self, user_id: Uuid) -> MutationOutcome {
        match self.store.delete_read_entries(user_id).await {
            Ok(removed) => {
                info!(%user_id, removed, "Cleared read articles");
                self.entries.retain(|e| !e.is_read);
                self.notices.notify(Notice::success("Read articles cleared"));
                MutationOutcome::Applied
            }
            Err(e) => {
                error!(%user_id, error = %e, "Failed to clear read articles");
                self.notices.notify(Notice::error("Could not clear your reading list"));
                MutationOutcome::Failed
            }
        }
    }

    /// Membership over the in-memory list; never touches the store.
    pub fn is_in_list(&self, article_id: Uuid) -> bool {
        self.entries.iter().any(|e| e.article_id == article_id)
    }

    pub fn total_unread(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_read).count()
    }
}
