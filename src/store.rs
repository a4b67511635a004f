//! The storage contract the refresh pipeline depends on.
//!
//! The scheduler and the refresh workers only ever talk to storage through
//! [`FeedStore`], so the SQLite implementation in [`crate::db`] can be swapped
//! for anything that upholds the same guarantees.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{Feed, Post};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A post with the same (feed, link) pair is already stored.
    #[error("post already exists for this feed and link")]
    DuplicateKey,
    #[error("feed {0} not found")]
    FeedNotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateKey)
    }
}

/// A post ready to be inserted, produced by the item translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Up to `limit` feeds, never-fetched first, then oldest `last_fetched_at`.
    async fn select_due_feeds(&self, limit: u32) -> Result<Vec<Feed>, StoreError>;

    /// Sets `last_fetched_at` to now and returns the updated feed.
    async fn mark_fetched(&self, feed_id: i64) -> Result<Feed, StoreError>;

    /// Fails with [`StoreError::DuplicateKey`] when the (feed, link) pair exists.
    async fn insert_post(&self, post: &NewPost) -> Result<Post, StoreError>;
}
