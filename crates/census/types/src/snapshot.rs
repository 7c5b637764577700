//! Snapshots of observed state
//!
//! A [`Snapshot`] maps flavor to a [`Manifest`]: the union of owners seen
//! for that flavor and one [`DeploySpec`] per cluster. Inserting into an
//! already-populated `(flavor, cluster)` slot is reported as a
//! [`Collision`] and leaves the snapshot unchanged.

use crate::{DeploySpec, GroupingKey, OwnerSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Deployments of one flavor, keyed by cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Union of the owners of every contributing deployment
    pub owners: OwnerSet,

    /// Cluster to spec
    pub deployments: BTreeMap<String, DeploySpec>,
}

/// Grouped result of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Manifest>);

/// Two contributions resolved to the same grouping key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collision {
    /// The contested slot
    pub key: GroupingKey,

    /// The spec that was rejected
    pub rejected: DeploySpec,

    /// Owners of the rejected contribution
    pub rejected_owners: OwnerSet,
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duplicate deployment for cluster {:?} in flavor {:?}",
            self.key.primary(),
            self.key.secondary()
        )
    }
}

impl std::error::Error for Collision {}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a spec at `key`, merging `owners` into the flavor's manifest.
    ///
    /// Fails without touching the snapshot if the slot is already populated.
    pub fn insert(
        &mut self,
        key: GroupingKey,
        spec: DeploySpec,
        owners: OwnerSet,
    ) -> Result<(), Collision> {
        let occupied = self
            .0
            .get(key.secondary())
            .is_some_and(|m| m.deployments.contains_key(key.primary()));
        if occupied {
            return Err(Collision {
                key,
                rejected: spec,
                rejected_owners: owners,
            });
        }

        let manifest = self.0.entry(key.secondary().to_string()).or_default();
        manifest.owners.union_with(&owners);
        manifest.deployments.insert(key.cluster, spec);
        Ok(())
    }

    /// Manifest for a flavor (`""` for the default flavor).
    pub fn manifest(&self, flavor: &str) -> Option<&Manifest> {
        self.0.get(flavor)
    }

    /// Spec at a grouping slot.
    pub fn deployment(&self, flavor: &str, cluster: &str) -> Option<&DeploySpec> {
        self.0.get(flavor)?.deployments.get(cluster)
    }

    pub fn flavors(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Manifest)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of flavors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of deployment specs across all flavors.
    pub fn deployment_count(&self) -> usize {
        self.0.values().map(|m| m.deployments.len()).sum()
    }
}
