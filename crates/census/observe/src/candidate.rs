//! Reconciliation candidates

use crate::client::{RequestParent, SchedulerRequest};
use async_trait::async_trait;
use census_types::{GroupingKey, TypesError};
use thiserror::Error;

/// One deployment occurrence to build
///
/// Scoped to a single reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Where the deployment belongs in the snapshot
    pub key: GroupingKey,

    /// Parent scheduler request and deploy state
    pub parent: Option<RequestParent>,
}

impl Candidate {
    pub fn new(key: GroupingKey, parent: Option<RequestParent>) -> Self {
        Self { key, parent }
    }

    /// Build a candidate from a compound `{cluster}.{flavor}` name.
    pub fn from_compound(name: &str, parent: Option<RequestParent>) -> Result<Self, TypesError> {
        Ok(Self::new(GroupingKey::parse(name)?, parent))
    }

    /// Cluster identifier of the candidate.
    pub fn cluster(&self) -> &str {
        self.key.primary()
    }

    pub fn request(&self) -> Option<&SchedulerRequest> {
        self.parent.as_ref()?.request.as_ref()
    }

    /// Upstream request id, when known.
    pub fn request_id(&self) -> Option<&str> {
        self.request().map(|r| r.id.as_str())
    }

    /// True once cluster, parent request and request id are all known.
    pub fn identity_known(&self) -> bool {
        !self.cluster().is_empty() && self.request_id().is_some_and(|id| !id.is_empty())
    }

    /// Stable `{cluster}:{request_id}` name for logs and dedup.
    pub fn name(&self) -> String {
        format!("{}:{}", self.cluster(), self.request_id().unwrap_or_default())
    }
}

/// Errors from a candidate source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Candidate listing failed: {0}")]
    Listing(String),

    #[error("Invalid candidate: {0}")]
    Invalid(#[from] TypesError),
}

/// Enumerates the candidates of one reconciliation pass
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn candidates(&self) -> Result<Vec<Candidate>, SourceError>;
}

/// A fixed list of candidates
#[derive(Debug, Clone, Default)]
pub struct StaticCandidates {
    candidates: Vec<Candidate>,
}

impl StaticCandidates {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl CandidateSource for StaticCandidates {
    async fn candidates(&self) -> Result<Vec<Candidate>, SourceError> {
        Ok(self.candidates.clone())
    }
}
