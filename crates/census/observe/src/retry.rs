//! Retry classification
//!
//! A failure is retryable once the candidate's upstream identity is fully
//! known (cluster, parent request and request id) and the cause is not
//! structural. Everything else is dropped for this pass.
//!
//! Structural causes (unsupported or missing container info, missing
//! labels, an unparsable version, an unrecognized kind) are fatal even
//! when the identity is fully known.

use crate::candidate::Candidate;
use crate::error::BuildError;
use thiserror::Error;

/// A build failure annotated with candidate identity and retryability
#[derive(Debug, Error)]
#[error("{cause}: {name}")]
pub struct RetryableError {
    #[source]
    cause: BuildError,
    retryable: bool,
    name: String,
}

impl RetryableError {
    pub fn cause(&self) -> &BuildError {
        &self.cause
    }

    pub fn into_cause(self) -> BuildError {
        self.cause
    }

    /// Whether the candidate should be re-queued for a later pass.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Stable `{cluster}:{request_id}` identity.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a build failure with the candidate's identity.
pub fn classify(candidate: &Candidate, cause: BuildError) -> RetryableError {
    let retryable = candidate.identity_known() && !cause.is_structural();
    RetryableError {
        retryable,
        name: candidate.name(),
        cause,
    }
}
