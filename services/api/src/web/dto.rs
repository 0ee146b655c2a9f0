//! services/api/src/web/dto.rs
//!
//! JSON payloads of the REST API and their mapping from the core domain types.

use chrono::{DateTime, Utc};
use playlist_core::domain::{
    ArticleCard, AudioRendition, AudioVersion, ListenQueueEntry, MutationOutcome,
    ReadingListEntry,
};
use playlist_core::listen_queue::ListenQueueService;
use playlist_core::reading_list::ReadingListService;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct AddReadLaterRequest {
    pub article_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct MarkReadRequest {
    pub is_read: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct ReadingProgressRequest {
    /// Fraction read, between 0 and 1.
    pub progress: f32,
}

#[derive(Deserialize, ToSchema)]
pub struct AddListenLaterRequest {
    pub article_id: Uuid,
    pub version: AudioVersionDto,
}

#[derive(Deserialize, ToSchema)]
pub struct MarkPlayedRequest {
    pub is_played: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct ListenProgressRequest {
    pub seconds: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub queue_order: i32,
}

//=========================================================================================
// Response Payloads
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AudioVersionDto {
    Summary,
    Full,
}

impl From<AudioVersionDto> for AudioVersion {
    fn from(dto: AudioVersionDto) -> Self {
        match dto {
            AudioVersionDto::Summary => AudioVersion::Summary,
            AudioVersionDto::Full => AudioVersion::Full,
        }
    }
}

impl From<AudioVersion> for AudioVersionDto {
    fn from(version: AudioVersion) -> Self {
        match version {
            AudioVersion::Summary => AudioVersionDto::Summary,
            AudioVersion::Full => AudioVersionDto::Full,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeDto {
    Applied,
    Unchanged,
    Failed,
}

impl From<MutationOutcome> for OutcomeDto {
    fn from(outcome: MutationOutcome) -> Self {
        match outcome {
            MutationOutcome::Applied => OutcomeDto::Applied,
            MutationOutcome::Unchanged => OutcomeDto::Unchanged,
            MutationOutcome::Failed => OutcomeDto::Failed,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct CategoryDto {
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ArticleCardDto {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub category: Option<CategoryDto>,
}

impl From<&ArticleCard> for ArticleCardDto {
    fn from(card: &ArticleCard) -> Self {
        Self {
            id: card.id,
            title: card.title.clone(),
            slug: card.slug.clone(),
            excerpt: card.excerpt.clone(),
            cover_image: card.cover_image.clone(),
            category: card.category.as_ref().map(|c| CategoryDto {
                name: c.name.clone(),
                slug: c.slug.clone(),
                color: c.color.clone(),
            }),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct AudioRenditionDto {
    pub url: Option<String>,
    pub duration_seconds: Option<u32>,
}

impl From<&AudioRendition> for AudioRenditionDto {
    fn from(rendition: &AudioRendition) -> Self {
        Self {
            url: rendition.url.clone(),
            duration_seconds: rendition.duration_seconds,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ReadingListEntryDto {
    pub id: Uuid,
    pub article_id: Uuid,
    pub is_read: bool,
    pub reading_progress: f32,
    pub added_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub article: Option<ArticleCardDto>,
}

impl From<&ReadingListEntry> for ReadingListEntryDto {
    fn from(entry: &ReadingListEntry) -> Self {
        Self {
            id: entry.id,
            article_id: entry.article_id,
            is_read: entry.is_read,
            reading_progress: entry.reading_progress,
            added_at: entry.added_at,
            read_at: entry.read_at,
            article: entry.article.as_ref().map(ArticleCardDto::from),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ListenQueueEntryDto {
    pub id: Uuid,
    pub article_id: Uuid,
    pub audio_version: AudioVersionDto,
    pub queue_order: i32,
    pub is_played: bool,
    pub progress_seconds: u32,
    pub playback_speed: f32,
    pub added_at: DateTime<Utc>,
    pub played_at: Option<DateTime<Utc>>,
    pub article: Option<ArticleCardDto>,
    /// The rendition this entry plays.
    pub audio: Option<AudioRenditionDto>,
}

impl From<&ListenQueueEntry> for ListenQueueEntryDto {
    fn from(entry: &ListenQueueEntry) -> Self {
        Self {
            id: entry.id,
            article_id: entry.article_id,
            audio_version: entry.audio_version.into(),
            queue_order: entry.queue_order,
            is_played: entry.is_played,
            progress_seconds: entry.progress_seconds,
            playback_speed: entry.playback_speed,
            added_at: entry.added_at,
            played_at: entry.played_at,
            article: entry.article.as_ref().map(ArticleCardDto::from),
            audio: entry.rendition().map(AudioRenditionDto::from),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ReadingListResponse {
    pub entries: Vec<ReadingListEntryDto>,
    pub total_unread: usize,
}

impl From<&ReadingListService> for ReadingListResponse {
    fn from(service: &ReadingListService) -> Self {
        Self {
            entries: service.entries().iter().map(ReadingListEntryDto::from).collect(),
            total_unread: service.total_unread(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ListenQueueResponse {
    pub entries: Vec<ListenQueueEntryDto>,
    /// Remaining listening time across unplayed entries.
    pub total_duration_seconds: u64,
}

impl From<&ListenQueueService> for ListenQueueResponse {
    fn from(service: &ListenQueueService) -> Self {
        Self {
            entries: service.entries().iter().map(ListenQueueEntryDto::from).collect(),
            total_duration_seconds: service.total_duration(),
        }
    }
}

/// Result of a reading list mutation plus the list as it is afterwards.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ReadingListMutationResponse {
    pub outcome: OutcomeDto,
    pub list: ReadingListResponse,
}

/// Result of a queue mutation plus the queue as it is afterwards.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ListenQueueMutationResponse {
    pub outcome: OutcomeDto,
    pub list: ListenQueueResponse,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ContainsResponse {
    pub article_id: Uuid,
    pub in_list: bool,
}
