use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::refresh::RefreshWorker;
use crate::store::{FeedStore, StoreError};

/// Drives periodic refreshes.
///
/// Each tick selects at most `concurrency` due feeds and refreshes them in
/// parallel. The tick does not complete until every worker in the batch has
/// finished, so batches never overlap. Stop requests are honoured only
/// between ticks: a batch that is already running is always awaited.
pub struct Scheduler {
    store: Arc<dyn FeedStore>,
    worker: Arc<RefreshWorker>,
    concurrency: u32,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn FeedStore>,
        worker: Arc<RefreshWorker>,
        concurrency: u32,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            worker,
            concurrency,
            interval,
        }
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting scheduler: {} feeds every {:?}",
            self.concurrency, self.interval
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Ok(dispatched) => info!("Refresh batch of {} feeds complete", dispatched),
                Err(e) => error!("Failed to select feeds, skipping tick: {}", e),
            }
        }

        info!("Scheduler stopped");
    }

    /// Runs one batch to completion and returns how many feeds it refreshed.
    pub async fn tick(&self) -> Result<usize, StoreError> {
        let feeds = self.store.select_due_feeds(self.concurrency).await?;

        let mut batch = JoinSet::new();
        for feed in feeds {
            let worker = self.worker.clone();
            batch.spawn(async move { worker.run(feed).await });
        }
        let dispatched = batch.len();

        while let Some(joined) = batch.join_next().await {
            if let Err(e) = joined {
                error!("Refresh task did not complete: {}", e);
            }
        }

        Ok(dispatched)
    }
}
