//! In-memory collaborators for development and tests

use crate::client::{ClientError, DeployRecord, ImageMetadataClient, SchedulerClient, SchedulerDeploy};
use crate::reconciler::{SinkError, SnapshotSink};
use async_trait::async_trait;
use census_types::Snapshot;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type DeployKey = (String, String);

/// Scheduler backed by a map of `(request_id, deploy_id)` to deploy
#[derive(Default)]
pub struct InMemorySchedulerClient {
    deploys: DashMap<DeployKey, Result<DeployRecord, ClientError>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemorySchedulerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert_deploy(&self, request_id: &str, deploy: SchedulerDeploy) {
        self.deploys.insert(
            (request_id.to_string(), deploy.id.clone()),
            Ok(DeployRecord {
                deploy: Some(deploy),
            }),
        );
    }

    /// Answer a deploy lookup with a raw record, which may hold no deploy.
    pub fn insert_record(&self, request_id: &str, deploy_id: &str, record: DeployRecord) {
        self.deploys
            .insert((request_id.to_string(), deploy_id.to_string()), Ok(record));
    }

    /// Answer a deploy lookup with an error.
    pub fn fail_deploy(&self, request_id: &str, deploy_id: &str, err: ClientError) {
        self.deploys
            .insert((request_id.to_string(), deploy_id.to_string()), Err(err));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchedulerClient for InMemorySchedulerClient {
    async fn get_deploy(
        &self,
        request_id: &str,
        deploy_id: &str,
    ) -> Result<DeployRecord, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let result = self
            .deploys
            .get(&(request_id.to_string(), deploy_id.to_string()))
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| Err(ClientError::NotFound(format!("{}/{}", request_id, deploy_id))));
        result
    }
}

/// Counts one running call; released when the call ends or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(in_flight: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Image-metadata service backed by a map of image to labels
#[derive(Default)]
pub struct InMemoryImageMetadataClient {
    labels: DashMap<String, Result<HashMap<String, String>, ClientError>>,
    calls: DashMap<String, usize>,
}

impl InMemoryImageMetadataClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_labels(&self, image: &str, labels: HashMap<String, String>) {
        self.labels.insert(image.to_string(), Ok(labels));
    }

    pub fn fail_image(&self, image: &str, err: ClientError) {
        self.labels.insert(image.to_string(), Err(err));
    }

    /// Number of lookups made for `image`.
    pub fn calls_for(&self, image: &str) -> usize {
        self.calls.get(image).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl ImageMetadataClient for InMemoryImageMetadataClient {
    async fn labels_for_image(&self, image: &str) -> Result<HashMap<String, String>, ClientError> {
        *self.calls.entry(image.to_string()).or_insert(0) += 1;
        self.labels
            .get(image)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| Err(ClientError::NotFound(image.to_string())))
    }
}

/// Sink that keeps every snapshot handed to it
#[derive(Default)]
pub struct InMemorySnapshotSink {
    snapshots: Mutex<Vec<Snapshot>>,
}

impl InMemorySnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently accepted snapshot.
    pub fn latest(&self) -> Option<Snapshot> {
        self.snapshots
            .lock()
            .ok()
            .and_then(|snapshots| snapshots.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotSink for InMemorySnapshotSink {
    async fn accept(&self, snapshot: Snapshot) -> Result<(), SinkError> {
        self.snapshots
            .lock()
            .map_err(|_| SinkError::Storage("sink lock poisoned".into()))?
            .push(snapshot);
        Ok(())
    }
}
