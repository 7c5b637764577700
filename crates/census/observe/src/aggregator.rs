//! Aggregator
//!
//! The single writer of a [`Snapshot`]. Contributions arrive by value over
//! a [`Collection`]'s channel and are merged one at a time; no other code
//! holds a reference to the snapshot while a pass is running.

use crate::collector::Collection;
use census_types::{Collision, DeploySpec, Deployment, GroupingKey, OwnerSet, Snapshot};
use tracing::error;

/// One candidate's share of a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub key: GroupingKey,
    pub spec: DeploySpec,
    pub owners: OwnerSet,
}

impl Contribution {
    pub fn new(key: GroupingKey, spec: DeploySpec, owners: OwnerSet) -> Self {
        Self { key, spec, owners }
    }

    /// Contribution of a built deployment at `key`.
    pub fn from_deployment(key: GroupingKey, deployment: &Deployment) -> Self {
        Self::new(key, DeploySpec::from(deployment), deployment.owners.clone())
    }
}

/// Output of an aggregation
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub snapshot: Snapshot,

    /// Contributions rejected because their slot was already taken
    pub collisions: Vec<Collision>,
}

/// Merges contributions into a snapshot
#[derive(Debug, Default)]
pub struct Aggregator {
    snapshot: Snapshot,
    collisions: Vec<Collision>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one contribution. Returns false if it collided.
    pub fn merge(&mut self, contribution: Contribution) -> bool {
        let Contribution { key, spec, owners } = contribution;
        match self.snapshot.insert(key, spec, owners) {
            Ok(()) => true,
            Err(collision) => {
                error!(
                    cluster = %collision.key.primary(),
                    flavor = %collision.key.secondary(),
                    "{}", collision
                );
                self.collisions.push(collision);
                false
            }
        }
    }

    /// Merge every contribution of a collection until its channel closes.
    ///
    /// Returns the number of contributions received.
    pub async fn consume<E: 'static>(&mut self, collection: &mut Collection<Contribution, E>) -> usize {
        let mut received = 0;
        while let Some(contribution) = collection.recv().await {
            received += 1;
            self.merge(contribution);
        }
        received
    }

    pub fn finish(self) -> Aggregation {
        Aggregation {
            snapshot: self.snapshot,
            collisions: self.collisions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Collector, CollectorConfig};
    use census_types::{DeployConfig, Resources};
    use tokio_util::sync::CancellationToken;

    fn contribution(name: &str, owner: &str, instances: u32) -> Contribution {
        Contribution::new(
            GroupingKey::parse(name).unwrap(),
            DeploySpec {
                config: DeployConfig {
                    resources: Resources::from_native(1.0, 64.0, 0),
                    num_instances: instances,
                    ..Default::default()
                },
                ..Default::default()
            },
            [owner].into_iter().collect(),
        )
    }

    #[test]
    fn test_flavors_do_not_mix() {
        let mut aggregator = Aggregator::new();
        assert!(aggregator.merge(contribution("cluster-a", "alice", 1)));
        assert!(aggregator.merge(contribution("cluster-a.canary", "bob", 1)));

        let Aggregation {
            snapshot,
            collisions,
        } = aggregator.finish();
        assert!(collisions.is_empty());
        assert_eq!(snapshot.flavors().collect::<Vec<_>>(), vec!["", "canary"]);

        let plain = snapshot.manifest("").unwrap();
        assert_eq!(plain.owners.to_vec(), vec!["alice".to_string()]);
        assert_eq!(plain.deployments.len(), 1);

        let canary = snapshot.manifest("canary").unwrap();
        assert_eq!(canary.owners.to_vec(), vec!["bob".to_string()]);
        assert!(canary.deployments.contains_key("cluster-a"));
    }

    #[test]
    fn test_owners_union_within_flavor() {
        let mut aggregator = Aggregator::new();
        aggregator.merge(contribution("east", "alice", 1));
        aggregator.merge(contribution("west", "bob", 1));

        let snapshot = aggregator.finish().snapshot;
        let manifest = snapshot.manifest("").unwrap();
        assert!(manifest.owners.contains("alice") && manifest.owners.contains("bob"));
        assert_eq!(manifest.deployments.len(), 2);
    }

    #[test]
    fn test_collision_is_reported_not_overwritten() {
        let mut aggregator = Aggregator::new();
        assert!(aggregator.merge(contribution("east.blue", "alice", 1)));
        assert!(!aggregator.merge(contribution("east.blue", "mallory", 7)));

        let aggregation = aggregator.finish();
        assert_eq!(aggregation.collisions.len(), 1);
        assert_eq!(aggregation.collisions[0].rejected.config.num_instances, 7);
        assert_eq!(
            aggregation
                .snapshot
                .deployment("blue", "east")
                .unwrap()
                .config
                .num_instances,
            1
        );
    }

    #[tokio::test]
    async fn test_consume_drains_collection() {
        let collector = Collector::new(CollectorConfig::default(), CancellationToken::new());
        let mut collection = collector.spawn(
            vec!["east", "west.canary", "east.blue", "broken", "east.blue"],
            |name: &'static str| async move {
                match name {
                    "broken" => Err(format!("{} failed", name)),
                    _ => Ok(Some(contribution(name, "ops", 1))),
                }
            },
        );

        let mut aggregator = Aggregator::new();
        assert_eq!(aggregator.consume(&mut collection).await, 4);
        let report = collection.finish().await;
        assert_eq!(report.failed, vec!["broken failed".to_string()]);

        let aggregation = aggregator.finish();
        assert_eq!(aggregation.snapshot.deployment_count(), 3);
        assert_eq!(aggregation.collisions.len(), 1);
    }
}
