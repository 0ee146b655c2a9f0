//! In-memory list stores for the web layer tests.

use async_trait::async_trait;
use chrono::Utc;
use playlist_core::domain::{ListenQueueEntry, NewListenQueueEntry, ReadingListEntry};
use playlist_core::ports::{ListenQueueStore, PortError, PortResult, ReadingListStore};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Both tables as plain vectors. Entry-id writes honour the owning user.
#[derive(Default)]
pub struct MemoryLists {
    pub reading: Mutex<Vec<ReadingListEntry>>,
    pub queue: Mutex<Vec<ListenQueueEntry>>,
    pub progress_writes: Mutex<Vec<(Uuid, u32)>>,
}

impl MemoryLists {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_queue(rows: Vec<ListenQueueEntry>) -> Arc<Self> {
        let store = Self::default();
        *store.queue.lock().unwrap() = rows;
        Arc::new(store)
    }

    fn update_queue(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        apply: impl FnOnce(&mut ListenQueueEntry),
    ) -> PortResult<()> {
        let mut rows = self.queue.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|e| e.id == entry_id && e.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(entry_id.to_string()))?;
        apply(row);
        Ok(())
    }

    fn update_reading(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        apply: impl FnOnce(&mut ReadingListEntry),
    ) -> PortResult<()> {
        let mut rows = self.reading.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|e| e.id == entry_id && e.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(entry_id.to_string()))?;
        apply(row);
        Ok(())
    }
}

#[async_trait]
impl ReadingListStore for MemoryLists {
    async fn list_reading_entries(&self, user_id: Uuid) -> PortResult<Vec<ReadingListEntry>> {
        let mut rows: Vec<_> = self
            .reading
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn insert_reading_entry(
        &self,
        user_id: Uuid,
        article_id: Uuid,
    ) -> PortResult<ReadingListEntry> {
        let mut rows = self.reading.lock().unwrap();
        if rows.iter().any(|e| e.user_id == user_id && e.article_id == article_id) {
            return Err(PortError::UniqueViolation("read_later_user_article".into()));
        }
        let entry = ReadingListEntry {
            id: Uuid::new_v4(),
            user_id,
            article_id,
            is_read: false,
            reading_progress: 0.0,
            added_at: Utc::now(),
            read_at: None,
            article: None,
        };
        rows.push(entry.clone());
        Ok(entry)
    }

    async fn set_read(&self, user_id: Uuid, entry_id: Uuid, is_read: bool) -> PortResult<()> {
        self.update_reading(user_id, entry_id, |e| e.is_read = is_read)
    }

    async fn set_reading_progress(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        progress: f32,
        mark_read: bool,
    ) -> PortResult<()> {
        self.update_reading(user_id, entry_id, |e| {
            e.reading_progress = progress;
            e.is_read |= mark_read;
        })
    }

    async fn delete_reading_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()> {
        self.update_reading(user_id, entry_id, |_| {})?;
        self.reading.lock().unwrap().retain(|e| e.id != entry_id);
        Ok(())
    }

    async fn delete_read_entries(&self, user_id: Uuid) -> PortResult<u64> {
        let mut rows = self.reading.lock().unwrap();
        let before = rows.len();
        rows.retain(|e| !(e.user_id == user_id && e.is_read));
        Ok((before - rows.len()) as u64)
    }
}

#[async_trait]
impl ListenQueueStore for MemoryLists {
    async fn list_queue_entries(&self, user_id: Uuid) -> PortResult<Vec<ListenQueueEntry>> {
        let mut rows: Vec<_> = self
            .queue
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.queue_order);
        Ok(rows)
    }

    async fn insert_queue_entry(&self, new: NewListenQueueEntry) -> PortResult<ListenQueueEntry> {
        let mut rows = self.queue.lock().unwrap();
        if rows.iter().any(|e| {
            e.user_id == new.user_id
                && e.article_id == new.article_id
                && e.audio_version == new.audio_version
        }) {
            return Err(PortError::UniqueViolation("listen_later_user_article_version".into()));
        }
        let entry = ListenQueueEntry {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            article_id: new.article_id,
            audio_version: new.audio_version,
            queue_order: new.queue_order,
            is_played: false,
            progress_seconds: 0,
            playback_speed: 1.0,
            added_at: Utc::now(),
            played_at: None,
            article: None,
            audio: Default::default(),
        };
        rows.push(entry.clone());
        Ok(entry)
    }

    async fn set_played(&self, user_id: Uuid, entry_id: Uuid, is_played: bool) -> PortResult<()> {
        self.update_queue(user_id, entry_id, |e| e.is_played = is_played)
    }

    async fn set_progress_seconds(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        seconds: u32,
    ) -> PortResult<()> {
        self.progress_writes.lock().unwrap().push((entry_id, seconds));
        self.update_queue(user_id, entry_id, |e| e.progress_seconds = seconds)
    }

    async fn set_queue_order(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        queue_order: i32,
    ) -> PortResult<()> {
        self.update_queue(user_id, entry_id, |e| e.queue_order = queue_order)
    }

    async fn delete_queue_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()> {
        self.update_queue(user_id, entry_id, |_| {})?;
        self.queue.lock().unwrap().retain(|e| e.id != entry_id);
        Ok(())
    }

    async fn delete_played_entries(&self, user_id: Uuid) -> PortResult<u64> {
        let mut rows = self.queue.lock().unwrap();
        let before = rows.len();
        rows.retain(|e| !(e.user_id == user_id && e.is_played));
        Ok((before - rows.len()) as u64)
    }
}
