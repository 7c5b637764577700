//! Deployment types
//!
//! A Deployment is a completely configured deployment of one version of a
//! piece of software in a single cluster.

use crate::{ManifestKind, OwnerSet, Resources, SourceVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Environment variables
pub type Env = BTreeMap<String, String>;

/// Per-deployment configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Canonical resource requirements
    pub resources: Resources,

    /// Environment variables
    #[serde(default)]
    pub env: Env,

    /// Desired instance count
    pub num_instances: u32,
}

impl fmt::Display for DeployConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} env:{}",
            self.num_instances,
            self.resources,
            self.env.len()
        )
    }
}

/// Notes about where a deployment was observed
///
/// Annotations never participate in deployment equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Upstream scheduler request id
    pub request_id: String,
}

/// A deployment as observed on a scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Cluster this deployment runs in
    pub cluster: String,

    /// Exact version of the deployed software
    pub source_version: SourceVersion,

    /// Resources, env and instance count
    pub config: DeployConfig,

    /// Owners of the deployment
    pub owners: OwnerSet,

    /// Kind of workload
    pub kind: ManifestKind,

    /// Upstream correlation data
    #[serde(default)]
    pub annotation: Annotation,
}

impl PartialEq for Deployment {
    fn eq(&self, other: &Self) -> bool {
        self.cluster == other.cluster
            && self.source_version == other.source_version
            && self.kind == other.kind
            && self.owners == other.owners
            && self.config == other.config
    }
}

impl Eq for Deployment {}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} {}", self.source_version, self.cluster, self.config)
    }
}

/// The per-cluster part of a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySpec {
    pub config: DeployConfig,

    /// Version deployed, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<semver::Version>,

    /// Workload kind, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ManifestKind>,
}

impl From<&Deployment> for DeploySpec {
    fn from(deployment: &Deployment) -> Self {
        Self {
            config: deployment.config.clone(),
            version: Some(deployment.source_version.version.clone()),
            kind: Some(deployment.kind),
        }
    }
}
