//! crates/playlist_core/src/domain.rs
//!
//! Defines the pure, core data structures for the read-later list and the
//! listen-later queue. These structs are independent of any database or
//! serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// The category tag shown next to an article card.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTag {
    pub name: String,
    pub slug: String,
    pub color: String,
}

/// The read-only article data joined onto list entries for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleCard {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub category: Option<CategoryTag>,
}

/// One audio form of an article. Either field may be missing when the audio
/// was never generated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioRendition {
    pub url: Option<String>,
    pub duration_seconds: Option<u32>,
}

/// Both renditions of an article.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleAudio {
    pub summary: Option<AudioRendition>,
    pub full: Option<AudioRendition>,
}

/// Which rendition a queue entry plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioVersion {
    Summary,
    Full,
}

impl AudioVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioVersion::Summary => "summary",
            AudioVersion::Full => "full",
        }
    }

    /// Human-readable label used in notices.
    pub fn label(&self) -> &'static str {
        match self {
            AudioVersion::Summary => "Summary",
            AudioVersion::Full => "Full",
        }
    }
}

impl fmt::Display for AudioVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AudioVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(AudioVersion::Summary),
            "full" => Ok(AudioVersion::Full),
            other => Err(format!("unknown audio version '{}'", other)),
        }
    }
}

/// A saved "read later" article. At most one per `(user_id, article_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingListEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub article_id: Uuid,
    pub is_read: bool,
    /// Fraction of the article read, in `[0, 1]`.
    pub reading_progress: f32,
    pub added_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub article: Option<ArticleCard>,
}

/// A queued "listen later" rendition. At most one per
/// `(user_id, article_id, audio_version)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenQueueEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub article_id: Uuid,
    pub audio_version: AudioVersion,
    pub queue_order: i32,
    pub is_played: bool,
    pub progress_seconds: u32,
    pub playback_speed: f32,
    pub added_at: DateTime<Utc>,
    pub played_at: Option<DateTime<Utc>>,
    pub article: Option<ArticleCard>,
    pub audio: ArticleAudio,
}

impl ListenQueueEntry {
    /// The rendition this entry was queued with, if the article has one.
    pub fn rendition(&self) -> Option<&AudioRendition> {
        match self.audio_version {
            AudioVersion::Summary => self.audio.summary.as_ref(),
            AudioVersion::Full => self.audio.full.as_ref(),
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        self.rendition()
            .and_then(|r| r.url.as_deref())
            .filter(|url| !url.trim().is_empty())
    }

    /// Duration of the chosen rendition, zero when the metadata is missing.
    pub fn duration_seconds(&self) -> u32 {
        self.rendition()
            .and_then(|r| r.duration_seconds)
            .unwrap_or(0)
    }
}

/// The row written when a rendition is queued.
#[derive(Debug, Clone, PartialEq)]
pub struct NewListenQueueEntry {
    pub user_id: Uuid,
    pub article_id: Uuid,
    pub audio_version: AudioVersion,
    pub queue_order: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Error,
}

/// A transient user-facing message emitted alongside a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Success, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Info, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, message: message.into() }
    }
}

/// What a user-initiated mutation ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The store accepted the change and local state reflects it.
    Applied,
    /// Nothing needed to change (e.g. the entry was already saved).
    Unchanged,
    /// The store rejected the change; local state is untouched.
    Failed,
}
