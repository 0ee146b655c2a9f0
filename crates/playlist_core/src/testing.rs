//! In-memory doubles for the ports, shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    ArticleAudio, AudioRendition, AudioVersion, ListenQueueEntry, NewListenQueueEntry, Notice,
    NoticeKind, ReadingListEntry,
};
use crate::ports::{
    AudioOutput, ListenQueueStore, NoticeSink, PortError, PortResult, ReadingListStore,
};

#[derive(Default)]
pub struct MemoryStore {
    pub reading: Mutex<Vec<ReadingListEntry>>,
    pub queue: Mutex<Vec<ListenQueueEntry>>,
    pub audio: Mutex<HashMap<Uuid, ArticleAudio>>,
    failing: Mutex<HashSet<&'static str>>,
    pub progress_writes: Mutex<Vec<(Uuid, u32)>>,
    pub played_writes: Mutex<Vec<(Uuid, bool)>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every call of the named operation fail with `Unexpected`.
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn with_audio(&self, article_id: Uuid, audio: ArticleAudio) {
        self.audio.lock().unwrap().insert(article_id, audio);
    }

    fn check(&self, op: &'static str) -> PortResult<()> {
        if self.failing.lock().unwrap().contains(op) {
            Err(PortError::Unexpected(format!("{} failed", op)))
        } else {
            Ok(())
        }
    }

    pub fn reading_rows(&self) -> Vec<ReadingListEntry> {
        self.reading.lock().unwrap().clone()
    }

    pub fn queue_rows(&self) -> Vec<ListenQueueEntry> {
        self.queue.lock().unwrap().clone()
    }
}

fn not_found(entry_id: Uuid) -> PortError {
    PortError::NotFound(format!("entry {} not found", entry_id))
}

/// The row `entry_id` if it belongs to `user_id`, like a `WHERE id AND user_id` update.
fn owned<'a, T: 'a>(
    mut rows: impl Iterator<Item = &'a mut T>,
    user_id: Uuid,
    entry_id: Uuid,
    key: impl Fn(&T) -> (Uuid, Uuid),
) -> PortResult<&'a mut T> {
    rows.find(|row| key(row) == (user_id, entry_id))
        .ok_or_else(|| not_found(entry_id))
}

#[async_trait]
impl ReadingListStore for MemoryStore {
    async fn list_reading_entries(&self, user_id: Uuid) -> PortResult<Vec<ReadingListEntry>> {
        self.check("list_reading")?;
        let mut rows: Vec<_> = self
            .reading
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(rows)
    }

    async fn insert_reading_entry(
        &self,
        user_id: Uuid,
        article_id: Uuid,
    ) -> PortResult<ReadingListEntry> {
        self.check("insert_reading")?;
        let mut rows = self.reading.lock().unwrap();
        if rows.iter().any(|e| e.user_id == user_id && e.article_id == article_id) {
            return Err(PortError::UniqueViolation("read_later_user_article".to_string()));
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
        self.check("set_read")?;
        let mut rows = self.reading.lock().unwrap();
        let e = owned(rows.iter_mut(), user_id, entry_id, |e| (e.user_id, e.id))?;
        e.is_read = is_read;
        e.read_at = is_read.then(Utc::now);
        Ok(())
    }

    async fn set_reading_progress(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        progress: f32,
        mark_read: bool,
    ) -> PortResult<()> {
        self.check("set_reading_progress")?;
        let mut rows = self.reading.lock().unwrap();
        let e = owned(rows.iter_mut(), user_id, entry_id, |e| (e.user_id, e.id))?;
        e.reading_progress = progress;
        if mark_read {
            e.is_read = true;
        }
        Ok(())
    }

    async fn delete_reading_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()> {
        self.check("delete_reading")?;
        let mut rows = self.reading.lock().unwrap();
        let before = rows.len();
        rows.retain(|e| !(e.id == entry_id && e.user_id == user_id));
        if rows.len() == before {
            return Err(not_found(entry_id));
        }
        Ok(())
    }

    async fn delete_read_entries(&self, user_id: Uuid) -> PortResult<u64> {
        self.check("delete_read")?;
        let mut rows = self.reading.lock().unwrap();
        let before = rows.len();
        rows.retain(|e| !(e.user_id == user_id && e.is_read));
        Ok((before - rows.len()) as u64)
    }
}

#[async_trait]
impl ListenQueueStore for MemoryStore {
    async fn list_queue_entries(&self, user_id: Uuid) -> PortResult<Vec<ListenQueueEntry>> {
        self.check("list_queue")?;
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
        self.check("insert_queue")?;
        let audio = self
            .audio
            .lock()
            .unwrap()
            .get(&new.article_id)
            .cloned()
            .unwrap_or_default();
        let mut rows = self.queue.lock().unwrap();
        if rows.iter().any(|e| {
            e.user_id == new.user_id
                && e.article_id == new.article_id
                && e.audio_version == new.audio_version
        }) {
            return Err(PortError::UniqueViolation("listen_later_user_article_version".to_string()));
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
            audio,
        };
        rows.push(entry.clone());
        Ok(entry)
    }

    async fn set_played(&self, user_id: Uuid, entry_id: Uuid, is_played: bool) -> PortResult<()> {
        self.played_writes.lock().unwrap().push((entry_id, is_played));
        self.check("set_played")?;
        let mut rows = self.queue.lock().unwrap();
        let e = owned(rows.iter_mut(), user_id, entry_id, |e| (e.user_id, e.id))?;
        e.is_played = is_played;
        e.played_at = is_played.then(Utc::now);
        Ok(())
    }

    async fn set_progress_seconds(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        seconds: u32,
    ) -> PortResult<()> {
        self.progress_writes.lock().unwrap().push((entry_id, seconds));
        self.check("set_progress_seconds")?;
        let mut rows = self.queue.lock().unwrap();
        owned(rows.iter_mut(), user_id, entry_id, |e| (e.user_id, e.id))?.progress_seconds = seconds;
        Ok(())
    }

    async fn set_queue_order(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        queue_order: i32,
    ) -> PortResult<()> {
        self.check("set_queue_order")?;
        let mut rows = self.queue.lock().unwrap();
        owned(rows.iter_mut(), user_id, entry_id, |e| (e.user_id, e.id))?.queue_order = queue_order;
        Ok(())
    }

    async fn delete_queue_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()> {
        self.check("delete_queue")?;
        let mut rows = self.queue.lock().unwrap();
        let before = rows.len();
        rows.retain(|e| !(e.id == entry_id && e.user_id == user_id));
        if rows.len() == before {
            return Err(not_found(entry_id));
        }
        Ok(())
    }

    async fn delete_played_entries(&self, user_id: Uuid) -> PortResult<u64> {
        self.check("delete_played")?;
        let mut rows = self.queue.lock().unwrap();
        let before = rows.len();
        rows.retain(|e| !(e.user_id == user_id && e.is_played));
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct RecordingNotices {
    pub notices: Mutex<Vec<Notice>>,
}

impl RecordingNotices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn kinds(&self) -> Vec<NoticeKind> {
        self.notices.lock().unwrap().iter().map(|n| n.kind).collect()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.notices.lock().unwrap().len()
    }
}

impl NoticeSink for RecordingNotices {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    Attach(String),
    SetRate(f32),
    Seek(f64),
    Play,
    Pause,
    Release,
}

/// Records every command; clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingAudio {
    pub calls: Arc<Mutex<Vec<AudioCall>>>,
}

impl RecordingAudio {
    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn play_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == AudioCall::Play).count()
    }
}

impl AudioOutput for RecordingAudio {
    fn attach(&mut self, url: &str) {
        self.calls.lock().unwrap().push(AudioCall::Attach(url.to_string()));
    }
    fn set_rate(&mut self, rate: f32) {
        self.calls.lock().unwrap().push(AudioCall::SetRate(rate));
    }
    fn seek(&mut self, position_seconds: f64) {
        self.calls.lock().unwrap().push(AudioCall::Seek(position_seconds));
    }
    fn play(&mut self) {
        self.calls.lock().unwrap().push(AudioCall::Play);
    }
    fn pause(&mut self) {
        self.calls.lock().unwrap().push(AudioCall::Pause);
    }
    fn release(&mut self) {
        self.calls.lock().unwrap().push(AudioCall::Release);
    }
}

/// A queue entry with a playable rendition of the given duration.
pub fn queue_entry(order: i32, duration: u32) -> ListenQueueEntry {
    let article_id = Uuid::new_v4();
    ListenQueueEntry {
        id: Uuid::new_v4(),
        user_id: Uuid::nil(),
        article_id,
        audio_version: AudioVersion::Summary,
        queue_order: order,
        is_played: false,
        progress_seconds: 0,
        playback_speed: 1.0,
        added_at: Utc::now(),
        played_at: None,
        article: None,
        audio: ArticleAudio {
            summary: Some(AudioRendition {
                url: Some(format!("https://cdn.test/{}-summary.mp3", article_id)),
                duration_seconds: Some(duration),
            }),
            full: None,
        },
    }
}
