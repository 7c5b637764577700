//! Remote collaborators: the scheduler and the image-metadata service
//!
//! Only the shapes this crate consumes are modelled. Transports live
//! behind the traits; implementations must tolerate concurrent calls from
//! many reconciliation units at once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors returned by remote collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream returned status {status}: {message}")]
    Status { status: u16, message: String },
}

/// A scheduler request, the parent of its deploys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerRequest {
    pub id: String,

    /// Wire workload type, e.g. `SERVICE`
    pub request_type: String,

    #[serde(default)]
    pub instances: u32,

    #[serde(default)]
    pub owners: Vec<String>,
}

/// Pointer to one historical deploy of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployMarker {
    pub request_id: String,
    pub deploy_id: String,
}

impl DeployMarker {
    pub fn new(request_id: impl Into<String>, deploy_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deploy_id: deploy_id.into(),
        }
    }
}

/// Deploy markers of a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDeployState {
    #[serde(default)]
    pub pending_deploy: Option<DeployMarker>,

    #[serde(default)]
    pub active_deploy: Option<DeployMarker>,
}

/// A request together with its deploy state, as listed by the scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParent {
    #[serde(default)]
    pub request: Option<SchedulerRequest>,

    #[serde(default)]
    pub request_deploy_state: Option<RequestDeployState>,
}

/// Containerization technology of a deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContainerType {
    Docker,
    Mesos,
}

/// Docker image of a deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerInfo {
    pub image: String,
}

/// Container description of a deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    #[serde(rename = "type")]
    pub container_type: ContainerType,

    #[serde(default)]
    pub docker: Option<DockerInfo>,
}

impl ContainerInfo {
    pub fn docker(image: impl Into<String>) -> Self {
        Self {
            container_type: ContainerType::Docker,
            docker: Some(DockerInfo {
                image: image.into(),
            }),
        }
    }
}

/// Scheduler-native resource fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerResources {
    pub cpus: f64,
    pub memory_mb: f64,
    pub num_ports: u32,
}

/// One deploy of a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerDeploy {
    pub id: String,

    #[serde(default)]
    pub container_info: Option<ContainerInfo>,

    #[serde(default)]
    pub env: Option<HashMap<String, String>>,

    #[serde(default)]
    pub resources: SchedulerResources,
}

/// Deploy history entry returned for a marker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployRecord {
    #[serde(default)]
    pub deploy: Option<SchedulerDeploy>,
}

/// Read access to the scheduler
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Fetch the deploy record for a marker
    async fn get_deploy(&self, request_id: &str, deploy_id: &str)
        -> Result<DeployRecord, ClientError>;
}

/// Read access to container image metadata
#[async_trait]
pub trait ImageMetadataClient: Send + Sync {
    /// Labels attached to an image
    async fn labels_for_image(&self, image: &str) -> Result<HashMap<String, String>, ClientError>;
}
