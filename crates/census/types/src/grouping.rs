//! Grouping keys
//!
//! Deployments are bucketed by `(flavor, cluster)`. The compound wire form
//! is `{cluster}` or `{cluster}.{flavor}`; it is parsed once, when a
//! candidate is constructed, and carried structurally from then on.

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `(secondary, primary)` pair identifying one snapshot slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupingKey {
    /// Primary component
    pub cluster: String,

    /// Secondary component; `None` is the default flavor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
}

impl GroupingKey {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            flavor: None,
        }
    }

    /// Attach a flavor. An empty flavor is the default flavor.
    pub fn with_flavor(mut self, flavor: impl Into<String>) -> Self {
        let flavor = flavor.into();
        self.flavor = if flavor.is_empty() { None } else { Some(flavor) };
        self
    }

    /// Parse a compound `{cluster}.{flavor}` name, splitting on the first `.`.
    pub fn parse(compound: &str) -> Result<Self> {
        let (cluster, flavor) = match compound.split_once('.') {
            Some((cluster, flavor)) => (cluster, flavor),
            None => (compound, ""),
        };
        if cluster.is_empty() {
            return Err(TypesError::EmptyCluster(compound.to_string()));
        }
        Ok(Self::new(cluster).with_flavor(flavor))
    }

    /// Primary component.
    pub fn primary(&self) -> &str {
        &self.cluster
    }

    /// Secondary component, empty for the default flavor.
    pub fn secondary(&self) -> &str {
        self.flavor.as_deref().unwrap_or("")
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.flavor {
            Some(flavor) => write!(f, "{}.{}", self.cluster, flavor),
            None => f.write_str(&self.cluster),
        }
    }
}
