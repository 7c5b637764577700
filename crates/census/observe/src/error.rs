//! Observed-state error types

use crate::client::{ClientError, ContainerType};
use thiserror::Error;

/// Failures of the individual deployment build steps
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Scheduler response didn't include a deploy state: {0}")]
    MissingDeployState(&'static str),

    #[error("Scheduler response didn't include the parent request")]
    MissingRequest,

    #[error("Scheduler error: {0}")]
    Scheduler(#[source] ClientError),

    #[error("Scheduler deploy history for {deploy_id} included no deploy")]
    MissingDeploy { deploy_id: String },

    #[error("Deploy didn't include container info")]
    MissingContainerInfo,

    #[error("Unsupported container type: {0:?}")]
    UnsupportedContainerType(ContainerType),

    #[error("Image metadata error: {0}")]
    ImageMetadata(#[source] ClientError),

    #[error("Missing labels on image for {names:?}")]
    MissingLabels { names: Vec<String> },

    #[error("Invalid version {version:?}: {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("Unrecognized request type returned by scheduler: {0:?}")]
    UnrecognizedKind(String),
}

impl BuildError {
    /// True for failures no later pass could fix.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            BuildError::MissingContainerInfo
                | BuildError::UnsupportedContainerType(_)
                | BuildError::MissingLabels { .. }
                | BuildError::InvalidVersion { .. }
                | BuildError::UnrecognizedKind(_)
        )
    }
}

/// Result type for build steps
pub type Result<T> = std::result::Result<T, BuildError>;
