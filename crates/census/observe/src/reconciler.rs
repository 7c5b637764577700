//! Reconciliation passes
//!
//! One pass fans every candidate out to the [`DeploymentBuilder`] through a
//! [`Collector`], merges the results in an [`Aggregator`] and reports the
//! snapshot together with every per-candidate failure. A pass always
//! completes; cancellation or the configured timeout only shortens it.

use crate::aggregator::{Aggregator, Contribution};
use crate::builder::DeploymentBuilder;
use crate::candidate::{Candidate, CandidateSource, SourceError};
use crate::client::{ImageMetadataClient, SchedulerClient};
use crate::collector::Collector;
use crate::config::ObserveConfig;
use crate::retry::RetryableError;
use async_trait::async_trait;
use census_types::{Collision, Snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn, Instrument};
use uuid::Uuid;

/// Unique identifier for a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PassId(Uuid);

impl PassId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass:{}", self.0)
    }
}

/// Outcome of one reconciliation pass
#[derive(Debug)]
pub struct PassReport {
    pub pass_id: PassId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Best-effort observed state
    pub snapshot: Snapshot,

    /// Contributions rejected as duplicates
    pub collisions: Vec<Collision>,

    /// Candidates that failed to build
    pub failures: Vec<RetryableError>,

    /// Number of candidates in the pass
    pub candidates: usize,

    /// Candidates abandoned because the pass was cancelled or timed out
    pub cancelled: usize,

    /// Candidates whose task panicked
    pub panicked: usize,
}

impl PassReport {
    /// Names of candidates to re-queue for a later pass.
    pub fn retry_queue(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter(|f| f.is_retryable())
            .map(RetryableError::name)
            .collect()
    }

    /// Candidates that did not run to completion.
    pub fn abandoned(&self) -> usize {
        self.cancelled + self.panicked
    }

    /// True when every candidate ran to completion.
    pub fn is_complete(&self) -> bool {
        self.abandoned() == 0
    }
}

/// Errors handing a snapshot to the state store
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Downstream consumer of finished snapshots
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn accept(&self, snapshot: Snapshot) -> Result<(), SinkError>;
}

/// Reconciliation errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Candidate source error: {0}")]
    Source(#[from] SourceError),

    #[error("Snapshot sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Pass {} incomplete: {} of {} candidates abandoned", .0.pass_id, .0.abandoned(), .0.candidates)]
    Incomplete(Box<PassReport>),
}

/// Builds observed state from a scheduler
#[derive(Clone)]
pub struct Reconciler {
    builder: DeploymentBuilder,
    config: ObserveConfig,
}

impl Reconciler {
    pub fn new(
        scheduler: Arc<dyn SchedulerClient>,
        images: Arc<dyn ImageMetadataClient>,
        config: ObserveConfig,
    ) -> Self {
        Self {
            builder: DeploymentBuilder::new(scheduler, images),
            config,
        }
    }

    pub fn config(&self) -> &ObserveConfig {
        &self.config
    }

    /// Run one pass over `candidates`.
    ///
    /// `cancel` is observed by every in-flight candidate; the configured
    /// pass timeout cancels the same way.
    #[instrument(skip_all, fields(pass_id = tracing::field::Empty))]
    pub async fn observe<I>(&self, candidates: I, cancel: CancellationToken) -> PassReport
    where
        I: IntoIterator<Item = Candidate>,
    {
        let pass_id = PassId::generate();
        tracing::Span::current().record("pass_id", tracing::field::display(&pass_id));
        let started_at = Utc::now();

        let token = cancel.child_token();
        let collector = Collector::new(self.config.collector_config(), token.clone());
        let builder = self.builder.clone();
        let span = tracing::Span::current();

        let mut collection = collector.spawn(candidates, move |candidate: Candidate| {
            let builder = builder.clone();
            let span = span.clone();
            async move {
                match builder.build(&candidate).await {
                    Ok(deployment) => Ok(Some(Contribution::from_deployment(
                        candidate.key.clone(),
                        &deployment,
                    ))),
                    Err(err) => {
                        warn!(
                            cluster = %candidate.cluster(),
                            flavor = %candidate.key.secondary(),
                            request_id = candidate.request_id().unwrap_or_default(),
                            retryable = err.is_retryable(),
                            error = %err,
                            "failed to build deployment"
                        );
                        Err(err)
                    }
                }
            }
            .instrument(span)
        });

        let mut aggregator = Aggregator::new();
        match self.config.pass_timeout() {
            Some(limit) => {
                if tokio::time::timeout(limit, aggregator.consume(&mut collection))
                    .await
                    .is_err()
                {
                    warn!(timeout_secs = limit.as_secs(), "reconciliation pass timed out");
                    token.cancel();
                    aggregator.consume(&mut collection).await;
                }
            }
            None => {
                aggregator.consume(&mut collection).await;
            }
        }

        let outcome = collection.finish().await;
        let aggregation = aggregator.finish();

        let report = PassReport {
            pass_id,
            started_at,
            finished_at: Utc::now(),
            snapshot: aggregation.snapshot,
            collisions: aggregation.collisions,
            failures: outcome.failed,
            candidates: outcome.total,
            cancelled: outcome.cancelled + outcome.discarded,
            panicked: outcome.panicked,
        };

        info!(
            candidates = report.candidates,
            built = outcome.produced,
            failed = report.failures.len(),
            retryable = report.retry_queue().len(),
            collisions = report.collisions.len(),
            cancelled = report.cancelled,
            "reconciliation pass finished"
        );
        report
    }

    /// Run one pass over the candidates of `source`.
    pub async fn observe_source(
        &self,
        source: &dyn CandidateSource,
        cancel: CancellationToken,
    ) -> Result<PassReport, SourceError> {
        let candidates = source.candidates().await?;
        Ok(self.observe(candidates, cancel).await)
    }

    /// Run one pass and hand the snapshot to `sink`.
    ///
    /// A pass that did not run every candidate to completion is not handed
    /// off; its report is returned in the error instead.
    pub async fn reconcile_into(
        &self,
        source: &dyn CandidateSource,
        sink: &dyn SnapshotSink,
        cancel: CancellationToken,
    ) -> Result<PassReport, ReconcileError> {
        let report = self.observe_source(source, cancel).await?;
        if !report.is_complete() {
            return Err(ReconcileError::Incomplete(Box::new(report)));
        }
        sink.accept(report.snapshot.clone()).await?;
        Ok(report)
    }
}
