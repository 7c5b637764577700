//! Concurrent Collector
//!
//! Runs one task per work item and funnels every produced value into a
//! single channel. Each task owns one clone of the channel sender, so the
//! sender count is the completion barrier: the channel closes exactly when
//! the last task finishes, whether it produced a value, produced nothing,
//! failed, panicked or was cancelled. Consumers terminate by exhausting
//! the channel, never by counting expected results.
//!
//! Tasks live in a [`JoinSet`]; dropping a [`Collection`] aborts whatever
//! is still running.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Collector tuning
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Maximum items running at once; `None` is unbounded
    pub max_in_flight: Option<usize>,

    /// Result channel capacity
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: Some(16),
            channel_capacity: 64,
        }
    }
}

/// How one work item ended
#[derive(Debug)]
enum ItemOutcome<E> {
    Produced,
    Empty,
    Failed(E),
    Cancelled,
    /// Produced a value after the receiver was closed
    Discarded,
}

/// Accounting for one collection; every item lands in exactly one bucket
#[derive(Debug)]
pub struct CollectorReport<E> {
    pub total: usize,
    pub produced: usize,
    pub empty: usize,
    pub failed: Vec<E>,
    pub cancelled: usize,
    pub discarded: usize,
    pub panicked: usize,
}

impl<E> CollectorReport<E> {
    fn new(total: usize) -> Self {
        Self {
            total,
            produced: 0,
            empty: 0,
            failed: Vec::new(),
            cancelled: 0,
            discarded: 0,
            panicked: 0,
        }
    }

    /// Number of items whose completion was recorded.
    pub fn accounted(&self) -> usize {
        self.produced + self.empty + self.failed.len() + self.cancelled + self.discarded + self.panicked
    }

    /// True when every item ran to completion.
    pub fn is_complete(&self) -> bool {
        self.cancelled == 0 && self.discarded == 0 && self.panicked == 0
    }
}

/// Spawns work items and hands back their results
#[derive(Debug, Clone)]
pub struct Collector {
    permits: Option<Arc<Semaphore>>,
    channel_capacity: usize,
    cancel: CancellationToken,
}

impl Collector {
    pub fn new(config: CollectorConfig, cancel: CancellationToken) -> Self {
        Self {
            permits: config
                .max_in_flight
                .filter(|n| *n > 0)
                .map(|n| Arc::new(Semaphore::new(n))),
            channel_capacity: config.channel_capacity.max(1),
            cancel,
        }
    }

    /// Start one task per item.
    ///
    /// `work` yields `Ok(Some(value))` to contribute, `Ok(None)` to
    /// contribute nothing, or `Err` to report a failure. None of these
    /// affect sibling items.
    pub fn spawn<I, T, E, F, Fut>(&self, items: I, work: F) -> Collection<T, E>
    where
        I: IntoIterator,
        I::Item: Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        F: Fn(I::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let work = Arc::new(work);
        let mut tasks = JoinSet::new();

        for item in items {
            let tx = tx.clone();
            let work = Arc::clone(&work);
            let permits = self.permits.clone();
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                let _permit = match permits {
                    Some(semaphore) => tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return ItemOutcome::Cancelled,
                        permit = semaphore.acquire_owned() => match permit {
                            Ok(permit) => Some(permit),
                            Err(_) => return ItemOutcome::Cancelled,
                        },
                    },
                    None => None,
                };

                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return ItemOutcome::Cancelled,
                    result = (*work)(item) => result,
                };

                match result {
                    Ok(Some(value)) => tokio::select! {
                        biased;
                        _ = cancel.cancelled() => ItemOutcome::Cancelled,
                        sent = tx.send(value) => match sent {
                            Ok(()) => ItemOutcome::Produced,
                            Err(_) => ItemOutcome::Discarded,
                        },
                    },
                    Ok(None) => ItemOutcome::Empty,
                    Err(e) => ItemOutcome::Failed(e),
                }
            });
        }

        let total = tasks.len();
        debug!(items = total, "collection started");

        Collection {
            results: rx,
            tasks,
            total,
        }
    }
}

/// Results of one [`Collector::spawn`]
pub struct Collection<T, E> {
    results: mpsc::Receiver<T>,
    tasks: JoinSet<ItemOutcome<E>>,
    total: usize,
}

impl<T, E: 'static> Collection<T, E> {
    /// Next produced value; `None` once every item has completed.
    pub async fn recv(&mut self) -> Option<T> {
        self.results.recv().await
    }

    /// Number of items in this collection.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Wait for every item and account for how each one ended.
    ///
    /// Values not yet received are dropped; items still waiting to send are
    /// counted as discarded.
    pub async fn finish(mut self) -> CollectorReport<E> {
        self.results.close();
        let mut report = CollectorReport::new(self.total);

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(ItemOutcome::Produced) => report.produced += 1,
                Ok(ItemOutcome::Empty) => report.empty += 1,
                Ok(ItemOutcome::Failed(e)) => report.failed.push(e),
                Ok(ItemOutcome::Cancelled) => report.cancelled += 1,
                Ok(ItemOutcome::Discarded) => report.discarded += 1,
                Err(e) if e.is_panic() => {
                    error!(error = %e, "collection item panicked");
                    report.panicked += 1;
                }
                Err(_) => report.cancelled += 1,
            }
        }

        debug!(
            items = report.total,
            produced = report.produced,
            empty = report.empty,
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "collection finished"
        );
        report
    }
}
