//! services/api/src/adapters/resilient.rs
//!
//! Wraps any store implementation with a per-call timeout and exponential
//! backoff retry for transient failures. Only idempotent calls are retried;
//! inserts get a single attempt so a lost acknowledgement never turns into a
//! bogus "already saved".

use async_trait::async_trait;
use playlist_core::domain::{ListenQueueEntry, NewListenQueueEntry, ReadingListEntry};
use playlist_core::ports::{ListenQueueStore, PortError, PortResult, ReadingListStore};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Upper bound for a single store call
    pub timeout: Duration,
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Maximum delay (caps exponential growth)
    pub max_delay: Duration,
    /// Jitter factor (0.0-1.0) for randomizing delays
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.store_timeout,
            max_retries: config.store_max_retries,
            base_delay: config.store_retry_base,
            ..Self::default()
        }
    }
}

/// Store wrapper that adds timeouts and retries to an inner adapter.
pub struct ResilientStore<S> {
    inner: Arc<S>,
    config: RetryConfig,
}

impl<S> ResilientStore<S> {
    pub fn new(inner: Arc<S>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Exponential backoff with jitter for the given retry attempt (1-based).
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay.as_millis() as u64;
        let exponential = base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.config.max_delay.as_millis() as u64);

        let jitter_range = (capped as f64 * self.config.jitter_factor) as i64;
        let millis = if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        };
        Duration::from_millis(millis)
    }

    fn is_retryable(error: &PortError) -> bool {
        matches!(error, PortError::Timeout(_) | PortError::Unexpected(_))
    }

    async fn attempt<T, Fut>(&self, operation: &str, fut: Fut) -> PortResult<T>
    where
        Fut: Future<Output = PortResult<T>>,
    {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(PortError::Timeout(format!(
                "{} exceeded {:?}",
                operation, self.config.timeout
            ))),
        }
    }

    async fn once<T, Fut>(&self, operation: &str, fut: Fut) -> PortResult<T>
    where
        Fut: Future<Output = PortResult<T>>,
    {
        self.attempt(operation, fut).await
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, call: F) -> PortResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = PortResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match self.attempt(operation, call()).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            attempt = attempt + 1,
                            operation,
                            "Store call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if attempt < self.config.max_retries && Self::is_retryable(&e) => {
                    attempt += 1;
                    let delay = self.calculate_delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        operation,
                        "Store call failed, retrying..."
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<S: ReadingListStore + 'static> ReadingListStore for ResilientStore<S> {
    async fn list_reading_entries(&self, user_id: Uuid) -> PortResult<Vec<ReadingListEntry>> {
        self.with_retry("list_reading_entries", || self.inner.list_reading_entries(user_id))
            .await
    }

    async fn insert_reading_entry(
        &self,
        user_id: Uuid,
        article_id: Uuid,
    ) -> PortResult<ReadingListEntry> {
        self.once(
            "insert_reading_entry",
            self.inner.insert_reading_entry(user_id, article_id),
        )
        .await
    }

    async fn set_read(&self, user_id: Uuid, entry_id: Uuid, is_read: bool) -> PortResult<()> {
        self.with_retry("set_read", || self.inner.set_read(user_id, entry_id, is_read))
            .await
    }

    async fn set_reading_progress(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        progress: f32,
        mark_read: bool,
    ) -> PortResult<()> {
        // checkpoints are best-effort: one attempt
        self.once(
            "set_reading_progress",
            self.inner.set_reading_progress(user_id, entry_id, progress, mark_read),
        )
        .await
    }

    async fn delete_reading_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()> {
        self.with_retry("delete_reading_entry", || {
            self.inner.delete_reading_entry(user_id, entry_id)
        })
        .await
    }

    async fn delete_read_entries(&self, user_id: Uuid) -> PortResult<u64> {
        self.with_retry("delete_read_entries", || self.inner.delete_read_entries(user_id))
            .await
    }
}

#[async_trait]
impl<S: ListenQueueStore + 'static> ListenQueueStore for ResilientStore<S> {
    async fn list_queue_entries(&self, user_id: Uuid) -> PortResult<Vec<ListenQueueEntry>> {
        self.with_retry("list_queue_entries", || self.inner.list_queue_entries(user_id))
            .await
    }

    async fn insert_queue_entry(&self, entry: NewListenQueueEntry) -> PortResult<ListenQueueEntry> {
        self.once("insert_queue_entry", self.inner.insert_queue_entry(entry))
            .await
    }

    async fn set_played(&self, user_id: Uuid, entry_id: Uuid, is_played: bool) -> PortResult<()> {
        self.with_retry("set_played", || self.inner.set_played(user_id, entry_id, is_played))
            .await
    }

    async fn set_progress_seconds(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        seconds: u32,
    ) -> PortResult<()> {
        self.once(
            "set_progress_seconds",
            self.inner.set_progress_seconds(user_id, entry_id, seconds),
        )
        .await
    }

    async fn set_queue_order(
        &self,
        user_id: Uuid,
        entry_id: Uuid,
        queue_order: i32,
    ) -> PortResult<()> {
        self.with_retry("set_queue_order", || {
            self.inner.set_queue_order(user_id, entry_id, queue_order)
        })
        .await
    }

    async fn delete_queue_entry(&self, user_id: Uuid, entry_id: Uuid) -> PortResult<()> {
        self.with_retry("delete_queue_entry", || {
            self.inner.delete_queue_entry(user_id, entry_id)
        })
        .await
    }

    async fn delete_played_entries(&self, user_id: Uuid) -> PortResult<u64> {
        self.with_retry("delete_played_entries", || self.inner.delete_played_entries(user_id))
            .await
    }
}
