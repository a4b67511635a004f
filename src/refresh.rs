use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::db::Feed;
use crate::fetcher::{FetchError, Fetcher};
use crate::parser::{self, ParseError, RssItem};
use crate::store::{FeedStore, NewPost, StoreError};

/// RFC 1123 with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
pub const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// [`PUB_DATE_FORMAT`] after the `"<Day>, "` prefix.
const PUB_DATE_BODY_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("item has no link to identify the post by")]
    MissingLink,
    #[error("invalid publish date {value:?}: {source}")]
    PubDate {
        value: String,
        source: chrono::ParseError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("could not mark feed as fetched: {0}")]
    Claim(#[source] StoreError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
}

/// Per-feed counters reported after a refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub seen: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Parses a `pubDate` in [`PUB_DATE_FORMAT`]. The weekday name must be a
/// valid abbreviation but is not checked against the date, since feeds
/// frequently get it wrong.
pub fn parse_pub_date(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let parsed = match value.split_once(", ") {
        Some((day, rest)) if WEEKDAYS.contains(&day) => {
            DateTime::parse_from_str(rest, PUB_DATE_BODY_FORMAT)
        }
        _ => DateTime::parse_from_str(value, PUB_DATE_FORMAT),
    };
    parsed.map(|dt| dt.with_timezone(&Utc))
}

/// Turns one parsed item into a post owned by `feed`.
pub fn translate_item(feed: &Feed, item: &RssItem) -> Result<NewPost, TranslateError> {
    if item.link.is_empty() {
        return Err(TranslateError::MissingLink);
    }

    let published_at = parse_pub_date(&item.pub_date).map_err(|source| TranslateError::PubDate {
        value: item.pub_date.clone(),
        source,
    })?;

    let description = if item.description.is_empty() {
        None
    } else {
        Some(item.description.clone())
    };

    Ok(NewPost {
        feed_id: feed.id,
        title: item.title.clone(),
        url: item.link.clone(),
        description,
        published_at,
    })
}

/// Moves a single feed through claim, fetch, parse and persist.
pub struct RefreshWorker {
    store: Arc<dyn FeedStore>,
    fetcher: Fetcher,
}

impl RefreshWorker {
    pub fn new(store: Arc<dyn FeedStore>, fetcher: Fetcher) -> Self {
        Self { store, fetcher }
    }

    /// Entry point for the scheduler. Every failure is logged here and
    /// never reaches the caller.
    pub async fn run(&self, feed: Feed) {
        match self.refresh(&feed).await {
            Ok(_) => {}
            Err(RefreshError::Fetch(e)) if e.is_timeout() => {
                warn!("Timed out fetching feed '{}' ({})", feed.name, feed.url);
            }
            Err(e) => error!("Failed to refresh feed '{}' ({}): {}", feed.name, feed.url, e),
        }
    }

    pub async fn refresh(&self, feed: &Feed) -> Result<RefreshSummary, RefreshError> {
        // Claim before any network I/O so the feed drops to the back of the
        // queue even if the fetch below hangs or fails.
        self.store
            .mark_fetched(feed.id)
            .await
            .map_err(RefreshError::Claim)?;

        info!("Fetching feed: {} ({})", feed.name, feed.url);
        let bytes = self.fetcher.fetch(&feed.url).await?;
        let parsed = parser::parse(&bytes)?;

        let mut summary = RefreshSummary {
            seen: parsed.items.len(),
            ..RefreshSummary::default()
        };

        for item in &parsed.items {
            let post = match translate_item(feed, item) {
                Ok(post) => post,
                Err(TranslateError::MissingLink) => {
                    warn!(
                        "Skipping item '{}' in feed '{}': no link, posts are deduplicated by link",
                        item.title, feed.name
                    );
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Skipping item '{}' in feed '{}': {}", item.title, feed.name, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            match self.store.insert_post(&post).await {
                Ok(_) => summary.inserted += 1,
                Err(e) if e.is_duplicate() => {
                    debug!("Post already stored: {}", post.url);
                    summary.duplicates += 1;
                }
                Err(e) => {
                    error!("Failed to store post {} for feed '{}': {}", post.url, feed.name, e);
                    summary.skipped += 1;
                }
            }
        }

        info!(
            feed_id = feed.id,
            seen = summary.seen,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            skipped = summary.skipped,
            "Feed '{}' collected, {} posts found",
            feed.name,
            summary.seen
        );
        Ok(summary)
    }
}
