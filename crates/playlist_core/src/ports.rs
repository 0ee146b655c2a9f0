//! crates/playlist_core/src/ports.rs
//!
//! Defines the service contracts (traits) the list services and the playback
//! controller depend on. These traits form the boundary of the hexagonal
//! architecture: the remote table store, the notice channel and the audio
//! primitive are all provided by the host.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ListenQueueEntry, NewListenQueueEntry, Notice, ReadingListEntry};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Duplicate entry: {0}")]
    UniqueViolation(String),
    #[error("Operation timed out: {0}")]
    Timeout(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Remote Store Ports (Traits)
//=========================================================================================

/// The `read_later` table.
///
/// Writes keyed by an entry id only touch rows owned by `user_id`; a row of
/// another user is reported as `PortError::NotFound`.
#[async_trait]
pub trait ReadingListStore: Send + Sync {
    /// All entries of a user, most recently added first, with the article card joined.
    async fn list_reading_entries(&self, user_id: Uuid) -> PortResult<Vec<ReadingListEntry>>;

    /// Fails with `PortError::UniqueViolation` when the article is already saved.
    async fn insert_reading_entry(
        &self,
        user_id: Uuid,
        article_id: Uuid,
    ) -> PortResult<ReadingListEntry>;

    /// Sets `is_read` and stamps or clears `read_at`.
    async fn set_read(&self, user_id: Uuid, entry_id: Uuid, is_read: bool) -> PortResult<()>;

    async fn set_reading_progress(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        progress: f32,
        mark_read: bool,
    ) -> PortResult<()>;

    async fn delete_reading_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()>;

    /// Deletes every read entry of the user and returns how many went away.
    async fn delete_read_entries(&self, user_id: Uuid) -> PortResult<u64>;
}

/// The `listen_later` table. Entry-id writes are scoped to `user_id` like
/// those of `ReadingListStore`.
#[async_trait]
pub trait ListenQueueStore: Send + Sync {
    /// All entries of a user in `queue_order`, with article card and audio joined.
    async fn list_queue_entries(&self, user_id: Uuid) -> PortResult<Vec<ListenQueueEntry>>;

    /// Fails with `PortError::UniqueViolation` when the rendition is already queued.
    async fn insert_queue_entry(&self, entry: NewListenQueueEntry) -> PortResult<ListenQueueEntry>;

    /// Sets `is_played` and stamps or clears `played_at`.
    async fn set_played(&self, user_id: Uuid, entry_id: Uuid, is_played: bool) -> PortResult<()>;

    async fn set_progress_seconds(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        seconds: u32,
    ) -> PortResult<()>;

    async fn set_queue_order(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        queue_order: i32,
    ) -> PortResult<()>;

    async fn delete_queue_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()>;

    async fn delete_played_entries(&self, user_id: Uuid) -> PortResult<u64>;
}

//=========================================================================================
// Side-Channel Ports
//=========================================================================================

/// Receives user-facing notices. Implementations must not block.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// The single audio resource driven by the playback controller.
///
/// Every call is a command; its asynchronous completion comes back to the
/// controller as an `AudioEvent`.
pub trait AudioOutput: Send {
    fn attach(&mut self, url: &str);
    fn set_rate(&mut self, rate: f32);
    fn seek(&mut self, position_seconds: f64);
    fn play(&mut self);
    fn pause(&mut self);
    /// Detaches the current source and frees the resource.
    fn release(&mut self);
}
