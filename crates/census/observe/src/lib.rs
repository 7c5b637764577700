//! Census Observe - Observed-state construction for scheduler fleets
//!
//! Reconciles a scheduler's live view into canonical [`Deployment`]s and
//! groups them into a [`Snapshot`].
//!
//! ## Pipeline
//!
//! ```text
//! CandidateSource ─▶ Collector ─┬─▶ DeploymentBuilder ─┐
//!                               ├─▶ DeploymentBuilder ─┼─▶ channel ─▶ Aggregator ─▶ Snapshot
//!                               └─▶ DeploymentBuilder ─┘
//! ```
//!
//! - [`DeploymentBuilder`] runs the dependent scheduler / image-metadata
//!   calls for one candidate; failures are classified by [`classify`].
//! - [`Collector`] runs one task per candidate and closes its result
//!   channel once every task has finished.
//! - [`Aggregator`] is the only writer of the snapshot.
//!
//! ## Usage
//!
//! ```no_run
//! use census_observe::memory::{InMemoryImageMetadataClient, InMemorySchedulerClient};
//! use census_observe::{Candidate, ObserveConfig, Reconciler};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reconciler = Reconciler::new(
//!     Arc::new(InMemorySchedulerClient::new()),
//!     Arc::new(InMemoryImageMetadataClient::new()),
//!     ObserveConfig::load(None)?,
//! );
//!
//! let candidates = vec![Candidate::from_compound("cluster-a.canary", None)?];
//! let report = reconciler.observe(candidates, CancellationToken::new()).await;
//! for name in report.retry_queue() {
//!     println!("retry later: {}", name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`Deployment`]: census_types::Deployment
//! [`Snapshot`]: census_types::Snapshot

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod aggregator;
pub mod builder;
pub mod candidate;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod legacy;
pub mod memory;
pub mod reconciler;
pub mod retry;

// Re-exports
pub use aggregator::{Aggregation, Aggregator, Contribution};
pub use builder::{build_source_version, DeploymentBuilder, REQUIRED_LABELS};
pub use candidate::{Candidate, CandidateSource, SourceError, StaticCandidates};
pub use client::{ClientError, ImageMetadataClient, SchedulerClient};
pub use collector::{Collection, Collector, CollectorConfig, CollectorReport};
pub use config::ObserveConfig;
pub use error::{BuildError, Result};
pub use legacy::{LegacyConfigError, LegacyConfigReader, LegacyReport};
pub use reconciler::{PassId, PassReport, ReconcileError, Reconciler, SinkError, SnapshotSink};
pub use retry::{classify, RetryableError};
