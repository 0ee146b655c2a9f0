//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the `ReadingListStore` and `ListenQueueStore` ports from the `core` crate.
//! It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use playlist_core::domain::{
    ArticleAudio, ArticleCard, AudioRendition, AudioVersion, CategoryTag, ListenQueueEntry,
    NewListenQueueEntry, ReadingListEntry,
};
use playlist_core::ports::{ListenQueueStore, PortError, PortResult, ReadingListStore};
use sqlx::postgres::PgQueryResult;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// SQLSTATE raised by Postgres on a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements both list store ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Translates driver errors into port errors.
fn map_db_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            PortError::UniqueViolation(db.message().to_string())
        }
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::PoolTimedOut => PortError::Timeout(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

/// Single-row writes that match nothing are reported as `NotFound`.
fn expect_row(result: PgQueryResult, table: &str, entry_id: Uuid) -> PortResult<()> {
    if result.rows_affected() == 0 {
        Err(PortError::NotFound(format!("{} entry {} not found", table, entry_id)))
    } else {
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ArticleCardColumns {
    article_title: Option<String>,
    article_slug: Option<String>,
    article_excerpt: Option<String>,
    article_cover_image: Option<String>,
    category_name: Option<String>,
    category_slug: Option<String>,
    category_color: Option<String>,
}
impl ArticleCardColumns {
    fn to_domain(self, article_id: Uuid) -> Option<ArticleCard> {
        let category = match (self.category_name, self.category_slug) {
            (Some(name), Some(slug)) => Some(CategoryTag {
                name,
                slug,
                color: self.category_color.unwrap_or_default(),
            }),
            _ => None,
        };
        Some(ArticleCard {
            id: article_id,
            title: self.article_title?,
            slug: self.article_slug?,
            excerpt: self.article_excerpt,
            cover_image: self.article_cover_image,
            category,
        })
    }
}

#[derive(FromRow)]
struct AudioColumns {
    audio_summary_url: Option<String>,
    audio_summary_duration: Option<i32>,
    audio_full_url: Option<String>,
    audio_full_duration: Option<i32>,
}
impl AudioColumns {
    fn to_domain(self) -> ArticleAudio {
        ArticleAudio {
            summary: rendition(self.audio_summary_url, self.audio_summary_duration),
            full: rendition(self.audio_full_url, self.audio_full_duration),
        }
    }
}

fn rendition(url: Option<String>, duration: Option<i32>) -> Option<AudioRendition> {
    if url.is_none() && duration.is_none() {
        return None;
    }
    Some(AudioRendition {
        url,
        duration_seconds: duration.and_then(|d| u32::try_from(d).ok()),
    })
}

#[derive(FromRow)]
struct ReadLaterRecord {
    id: Uuid,
    user_id: Uuid,
    article_id: Uuid,
    is_read: bool,
    reading_progress: f32,
    added_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}
impl ReadLaterRecord {
    fn to_domain(self, article: Option<ArticleCard>) -> ReadingListEntry {
        ReadingListEntry {
            id: self.id,
            user_id: self.user_id,
            article_id: self.article_id,
            is_read: self.is_read,
            reading_progress: self.reading_progress,
            added_at: self.added_at,
            read_at: self.read_at,
            article,
        }
    }
}

#[derive(FromRow)]
struct ReadLaterJoinedRecord {
    #[sqlx(flatten)]
    entry: ReadLaterRecord,
    #[sqlx(flatten)]
    card: ArticleCardColumns,
}

#[derive(FromRow)]
struct ListenLaterRecord {
    id: Uuid,
    user_id: Uuid,
    article_id: Uuid,
    audio_version: String,
    queue_order: i32,
    is_played: bool,
    progress_seconds: i32,
    playback_speed: f32,
    added_at: DateTime<Utc>,
    played_at: Option<DateTime<Utc>>,
}
impl ListenLaterRecord {
    fn to_domain(
        self,
        article: Option<ArticleCard>,
        audio: ArticleAudio,
    ) -> PortResult<ListenQueueEntry> {
        let audio_version = self
            .audio_version
            .parse::<AudioVersion>()
            .map_err(PortError::Unexpected)?;
        Ok(ListenQueueEntry {
            id: self.id,
            user_id: self.user_id,
            article_id: self.article_id,
            audio_version,
            queue_order: self.queue_order,
            is_played: self.is_played,
            progress_seconds: u32::try_from(self.progress_seconds).unwrap_or(0),
            playback_speed: self.playback_speed,
            added_at: self.added_at,
            played_at: self.played_at,
            article,
            audio,
        })
    }
}

#[derive(FromRow)]
struct ListenLaterJoinedRecord {
    #[sqlx(flatten)]
    entry: ListenLaterRecord,
    #[sqlx(flatten)]
    card: ArticleCardColumns,
    #[sqlx(flatten)]
    audio: AudioColumns,
}
impl ListenLaterJoinedRecord {
    fn to_domain(self) -> PortResult<ListenQueueEntry> {
        let article = self.card.to_domain(self.entry.article_id);
        self.entry.to_domain(article, self.audio.to_domain())
    }
}

//=========================================================================================
// SQL
//=========================================================================================

const READ_LATER_COLUMNS: &str =
    "r.id, r.user_id, r.article_id, r.is_read, r.reading_progress, r.added_at, r.read_at";

const LISTEN_LATER_COLUMNS: &str = "l.id, l.user_id, l.article_id, l.audio_version, \
     l.queue_order, l.is_played, l.progress_seconds, l.playback_speed, l.added_at, l.played_at";

const ARTICLE_CARD_COLUMNS: &str = "a.title AS article_title, a.slug AS article_slug, \
     a.excerpt AS article_excerpt, a.cover_image AS article_cover_image, \
     c.name AS category_name, c.slug AS category_slug, c.color AS category_color";

const AUDIO_COLUMNS: &str = "a.audio_summary_url, a.audio_summary_duration, \
     a.audio_full_url, a.audio_full_duration";

//=========================================================================================
// `ReadingListStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReadingListStore for DbAdapter {
    async fn list_reading_entries(&self, user_id: Uuid) -> PortResult<Vec<ReadingListEntry>> {
        let sql = format!(
            "SELECT {READ_LATER_COLUMNS}, {ARTICLE_CARD_COLUMNS} \
             FROM read_later r \
             LEFT JOIN articles a ON a.id = r.article_id \
             LEFT JOIN categories c ON c.id = a.category_id \
             WHERE r.user_id = $1 \
             ORDER BY r.added_at DESC"
        );
        let records = sqlx::query_as::<_, ReadLaterJoinedRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(records
            .into_iter()
            .map(|r| {
                let card = r.card.to_domain(r.entry.article_id);
                r.entry.to_domain(card)
            })
            .collect())
    }

    async fn insert_reading_entry(
        &self,
        user_id: Uuid,
        article_id: Uuid,
    ) -> PortResult<ReadingListEntry> {
        let record = sqlx::query_as::<_, ReadLaterRecord>(
            "INSERT INTO read_later (user_id, article_id) VALUES ($1, $2) \
             RETURNING id, user_id, article_id, is_read, reading_progress, added_at, read_at",
        )
        .bind(user_id)
        .bind(article_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(record.to_domain(None))
    }

    async fn set_read(&self, user_id: Uuid, entry_id: Uuid, is_read: bool) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE read_later \
             SET is_read = $1, read_at = CASE WHEN $1 THEN now() ELSE NULL END \
             WHERE id = $2 AND user_id = $3",
        )
        .bind(is_read)
        .bind(entry_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        expect_row(result, "read_later", entry_id)
    }

    async fn set_reading_progress(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        progress: f32,
        mark_read: bool,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE read_later \
             SET reading_progress = $1, \
                 is_read = is_read OR $2, \
                 read_at = CASE WHEN $2 AND NOT is_read THEN now() ELSE read_at END \
             WHERE id = $3 AND user_id = $4",
        )
        .bind(progress)
        .bind(mark_read)
        .bind(entry_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        expect_row(result, "read_later", entry_id)
    }

    async fn delete_reading_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM read_later WHERE id = $1 AND user_id = $2")
            .bind(entry_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        expect_row(result, "read_later", entry_id)
    }

    async fn delete_read_entries(&self, user_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM read_later WHERE user_id = $1 AND is_read = true")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected())
    }
}

//=========================================================================================
// `ListenQueueStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ListenQueueStore for DbAdapter {
    async fn list_queue_entries(&self, user_id: Uuid) -> PortResult<Vec<ListenQueueEntry>> {
        let sql = format!(
            "SELECT {LISTEN_LATER_COLUMNS}, {ARTICLE_CARD_COLUMNS}, {AUDIO_COLUMNS} \
             FROM listen_later l \
             LEFT JOIN articles a ON a.id = l.article_id \
             LEFT JOIN categories c ON c.id = a.category_id \
             WHERE l.user_id = $1 \
             ORDER BY l.queue_order ASC, l.added_at ASC"
        );
        let records = sqlx::query_as::<_, ListenLaterJoinedRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn insert_queue_entry(&self, entry: NewListenQueueEntry) -> PortResult<ListenQueueEntry> {
        let sql = format!(
            "WITH l AS ( \
                 INSERT INTO listen_later (user_id, article_id, audio_version, queue_order) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING * \
             ) \
             SELECT {LISTEN_LATER_COLUMNS}, {ARTICLE_CARD_COLUMNS}, {AUDIO_COLUMNS} \
             FROM l \
             LEFT JOIN articles a ON a.id = l.article_id \
             LEFT JOIN categories c ON c.id = a.category_id"
        );
        let record = sqlx::query_as::<_, ListenLaterJoinedRecord>(&sql)
            .bind(entry.user_id)
            .bind(entry.article_id)
            .bind(entry.audio_version.as_str())
            .bind(entry.queue_order)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;
        record.to_domain()
    }

    async fn set_played(&self, user_id: Uuid, entry_id: Uuid, is_played: bool) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE listen_later \
             SET is_played = $1, played_at = CASE WHEN $1 THEN now() ELSE NULL END \
             WHERE id = $2 AND user_id = $3",
        )
        .bind(is_played)
        .bind(entry_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        expect_row(result, "listen_later", entry_id)
    }

    async fn set_progress_seconds(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        seconds: u32,
    ) -> PortResult<()> {
        let seconds = i32::try_from(seconds).unwrap_or(i32::MAX);
        let result = sqlx::query(
            "UPDATE listen_later SET progress_seconds = $1 WHERE id = $2 AND user_id = $3",
        )
        .bind(seconds)
        .bind(entry_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        expect_row(result, "listen_later", entry_id)
    }

    async fn set_queue_order(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        queue_order: i32,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE listen_later SET queue_order = $1 WHERE id = $2 AND user_id = $3",
        )
        .bind(queue_order)
        .bind(entry_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        expect_row(result, "listen_later", entry_id)
    }

    async fn delete_queue_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM listen_later WHERE id = $1 AND user_id = $2")
            .bind(entry_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        expect_row(result, "listen_later", entry_id)
    }

    async fn delete_played_entries(&self, user_id: Uuid) -> PortResult<u64> {
        let result =
            sqlx::query("DELETE FROM listen_later WHERE user_id = $1 AND is_played = true")
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renditions_without_any_metadata_are_absent() {
        assert_eq!(rendition(None, None), None);
        let partial = rendition(None, Some(90)).expect("rendition");
        assert_eq!(partial.url, None);
        assert_eq!(partial.duration_seconds, Some(90));
        assert_eq!(rendition(Some("u".into()), Some(-1)).and_then(|r| r.duration_seconds), None);
    }

    #[test]
    fn article_card_requires_title_and_slug() {
        let id = Uuid::new_v4();
        let columns = ArticleCardColumns {
            article_title: Some("Budget vote".into()),
            article_slug: Some("budget-vote".into()),
            article_excerpt: None,
            article_cover_image: None,
            category_name: Some("Politics".into()),
            category_slug: Some("politics".into()),
            category_color: None,
        };
        let card = columns.to_domain(id).expect("card");
        assert_eq!(card.id, id);
        assert_eq!(card.category.map(|c| c.slug), Some("politics".to_string()));

        let missing = ArticleCardColumns {
            article_title: None,
            article_slug: None,
            article_excerpt: None,
            article_cover_image: None,
            category_name: None,
            category_slug: None,
            category_color: None,
        };
        assert!(missing.to_domain(id).is_none());
    }

    #[test]
    fn driver_errors_map_to_port_errors() {
        assert!(matches!(map_db_error(sqlx::Error::RowNotFound), PortError::NotFound(_)));
        assert!(matches!(map_db_error(sqlx::Error::PoolTimedOut), PortError::Timeout(_)));
        assert!(matches!(map_db_error(sqlx::Error::PoolClosed), PortError::Unexpected(_)));
    }
}
