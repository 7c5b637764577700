//! Workload kinds

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of workload a deployment runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestKind {
    /// Long-running, load balanced
    Service,
    /// Long-running, not load balanced
    Worker,
    /// Started on request
    OnDemand,
    /// Run on a schedule
    Scheduled,
    /// Run exactly once
    Once,
}

impl ManifestKind {
    /// All kinds, in wire order.
    pub const ALL: [ManifestKind; 5] = [
        ManifestKind::Service,
        ManifestKind::Worker,
        ManifestKind::OnDemand,
        ManifestKind::Scheduled,
        ManifestKind::Once,
    ];

    /// Translate a scheduler request type into a kind.
    pub fn from_wire(value: &str) -> Result<Self> {
        match value {
            "SERVICE" => Ok(ManifestKind::Service),
            "WORKER" => Ok(ManifestKind::Worker),
            "ON_DEMAND" => Ok(ManifestKind::OnDemand),
            "SCHEDULED" => Ok(ManifestKind::Scheduled),
            "RUN_ONCE" => Ok(ManifestKind::Once),
            other => Err(TypesError::UnrecognizedKind(other.to_string())),
        }
    }

    /// The scheduler request type for this kind.
    pub fn as_wire(&self) -> &'static str {
        match self {
            ManifestKind::Service => "SERVICE",
            ManifestKind::Worker => "WORKER",
            ManifestKind::OnDemand => "ON_DEMAND",
            ManifestKind::Scheduled => "SCHEDULED",
            ManifestKind::Once => "RUN_ONCE",
        }
    }
}

impl FromStr for ManifestKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_wire(s)
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}
