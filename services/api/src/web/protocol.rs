//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser's player and the
//! API server. The browser owns the actual `<audio>` element: the server sends
//! it commands and the browser reports back what the element did.

use playlist_core::domain::{Notice, NoticeKind};
use playlist_core::playback::{PlaybackSnapshot, PlaybackState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Player commands from the UI and events from the audio element.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Play,
    Pause,
    Next,
    Previous,
    /// Jump to a percentage (0-100) of the current item.
    Seek { percentage: f64 },
    ChangeSpeed { rate: f32 },
    PlayItem { index: usize },
    /// Refetch the queue, e.g. after it was edited elsewhere.
    Refresh,

    // --- Audio element events ---
    MetadataLoaded { duration_seconds: f64 },
    TimeUpdate { position_seconds: f64 },
    Ended,
    AudioError { message: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Commands for the audio element, session state and notices.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the player session is ready.
    SessionInitialized { user_id: Uuid, queue_len: usize },

    // --- Audio element commands ---
    AttachSource { url: String },
    SetRate { rate: f32 },
    Seek { position_seconds: f64 },
    Play,
    Pause,
    Release,

    /// The controller's view of the session after a command.
    State(PlayerState),

    /// A transient message for a toast.
    Notice { kind: NoticeLevel, message: String },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

impl From<Notice> for ServerMessage {
    fn from(notice: Notice) -> Self {
        let kind = match notice.kind {
            NoticeKind::Success => NoticeLevel::Success,
            NoticeKind::Info => NoticeLevel::Info,
            NoticeKind::Error => NoticeLevel::Error,
        };
        ServerMessage::Notice { kind, message: notice.message }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub state: &'static str,
    pub current_index: Option<usize>,
    pub current_entry_id: Option<Uuid>,
    pub unplayable_entry_id: Option<Uuid>,
    pub is_playing: bool,
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
    pub progress_percentage: f64,
    pub playback_rate: f32,
    pub queue_len: usize,
}

impl From<PlaybackSnapshot> for PlayerState {
    fn from(snapshot: PlaybackSnapshot) -> Self {
        let (state, unplayable_entry_id) = match snapshot.state {
            PlaybackState::Idle => ("idle", None),
            PlaybackState::Loading => ("loading", None),
            PlaybackState::Loaded => ("loaded", None),
            PlaybackState::Playing => ("playing", None),
            PlaybackState::Paused => ("paused", None),
            PlaybackState::Completed => ("completed", None),
            PlaybackState::Unplayable { entry_id } => ("unplayable", Some(entry_id)),
        };
        Self {
            state,
            current_index: snapshot.current_index,
            current_entry_id: snapshot.current_entry_id,
            unplayable_entry_id,
            is_playing: snapshot.is_playing,
            elapsed_seconds: snapshot.elapsed_seconds,
            duration_seconds: snapshot.duration_seconds,
            progress_percentage: snapshot.progress_percentage,
            playback_rate: snapshot.playback_rate,
            queue_len: snapshot.queue_len,
        }
    }
}
