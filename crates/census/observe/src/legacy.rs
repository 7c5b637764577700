//! Legacy file-based deploy config ingestion
//!
//! Reads `{root}/config/{cluster}[.{flavor}]/` directories, each holding a
//! `singularity.json` (resources and env) and optionally a
//! `singularity-request.json` (instances and owners). Entries are read
//! concurrently through the same [`Collector`] / [`Aggregator`] pipeline as
//! scheduler candidates. Both files are parsed strictly: unknown fields,
//! unknown resource names and missing resources are all rejected.

use crate::aggregator::{Aggregation, Aggregator, Contribution};
use crate::collector::{Collector, CollectorConfig};
use crate::config::ObserveConfig;
use census_types::{DeployConfig, DeploySpec, GroupingKey, OwnerSet, Resources, TypesError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Resources and env of one legacy deploy config
pub const DEPLOY_CONFIG_FILE: &str = "singularity.json";

/// Instances and owners of one legacy deploy config
pub const REQUEST_CONFIG_FILE: &str = "singularity-request.json";

/// Errors reading one legacy deploy config
#[derive(Debug, Error)]
pub enum LegacyConfigError {
    #[error("Error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: TypesError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeployConfigJson {
    #[serde(default)]
    resources: HashMap<String, f64>,

    #[serde(default)]
    env: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RequestConfigJson {
    #[serde(default)]
    instances: u32,

    #[serde(default)]
    owners: Vec<String>,
}

/// Result of reading a legacy config tree
#[derive(Debug, Default)]
pub struct LegacyReport {
    pub aggregation: Aggregation,

    /// Entries that failed to parse
    pub failures: Vec<LegacyConfigError>,

    /// Entries that held no deploy config
    pub skipped: usize,
}

/// Reads legacy deploy config trees
#[derive(Debug, Clone)]
pub struct LegacyConfigReader {
    collector: CollectorConfig,
    config_dir: String,
}

impl LegacyConfigReader {
    pub fn new(config: &ObserveConfig) -> Self {
        Self {
            collector: config.collector_config(),
            config_dir: config.legacy_config_dir.clone(),
        }
    }

    /// Read every deploy config under `root`.
    ///
    /// A missing or unreadable config directory yields an empty report.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub async fn read(&self, root: &Path, cancel: CancellationToken) -> LegacyReport {
        let config_dir = root.join(&self.config_dir);
        let entries = match list_dir(&config_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "no legacy config directory");
                return LegacyReport::default();
            }
        };

        let collector = Collector::new(self.collector.clone(), cancel);
        let mut collection = collector.spawn(entries, |path: PathBuf| async move {
            parse_single_config(&path).await
        });

        let mut aggregator = Aggregator::new();
        aggregator.consume(&mut collection).await;
        let outcome = collection.finish().await;

        for failure in &outcome.failed {
            warn!(error = %failure, "skipping legacy deploy config");
        }
        info!(
            entries = outcome.total,
            read = outcome.produced,
            failed = outcome.failed.len(),
            "legacy config read"
        );

        LegacyReport {
            aggregation: aggregator.finish(),
            failures: outcome.failed,
            skipped: outcome.empty,
        }
    }
}

async fn list_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(entry.path());
    }
    Ok(entries)
}

/// Parse one `{cluster}[.{flavor}]` directory.
///
/// Non-directories and directories without a deploy config contribute
/// nothing.
async fn parse_single_config(dir: &Path) -> Result<Option<Contribution>, LegacyConfigError> {
    let is_dir = tokio::fs::metadata(dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Ok(None);
    }

    let deploy_path = dir.join(DEPLOY_CONFIG_FILE);
    let Some(raw) = read_optional(&deploy_path).await? else {
        debug!(dir = %dir.display(), "no {} present", DEPLOY_CONFIG_FILE);
        return Ok(None);
    };
    let deploy: DeployConfigJson = parse_json(&deploy_path, &raw)?;
    let resources = Resources::from_native_map(&deploy.resources).map_err(|source| {
        LegacyConfigError::Invalid {
            path: deploy_path.clone(),
            source,
        }
    })?;

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let key = GroupingKey::parse(&name).map_err(|source| LegacyConfigError::Invalid {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut config = DeployConfig {
        resources,
        env: deploy.env.unwrap_or_default().into_iter().collect(),
        num_instances: 0,
    };
    let mut owners = OwnerSet::new();

    let request_path = dir.join(REQUEST_CONFIG_FILE);
    match read_optional(&request_path).await {
        Ok(Some(raw)) => {
            let request: RequestConfigJson = parse_json(&request_path, &raw)?;
            config.num_instances = request.instances;
            owners.extend(request.owners);
        }
        Ok(None) => debug!(dir = %dir.display(), "no {} present", REQUEST_CONFIG_FILE),
        // Unreadable request data leaves the entry without instances or owners
        Err(e) => warn!(error = %e, "ignoring unreadable {}", REQUEST_CONFIG_FILE),
    }

    let spec = DeploySpec {
        config,
        ..Default::default()
    };
    Ok(Some(Contribution::new(key, spec, owners)))
}

async fn read_optional(path: &Path) -> Result<Option<String>, LegacyConfigError> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LegacyConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(path: &Path, raw: &str) -> Result<T, LegacyConfigError> {
    serde_json::from_str(raw).map_err(|source| LegacyConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DEPLOY: &str = r#"{"resources": {"cpus": 0.5, "memoryMb": 256, "numPorts": 1}, "env": {"MODE": "prod"}}"#;

    fn write_entry(root: &Path, name: &str, deploy: Option<&str>, request: Option<&str>) {
        let dir = root.join("config").join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some(deploy) = deploy {
            fs::write(dir.join(DEPLOY_CONFIG_FILE), deploy).unwrap();
        }
        if let Some(request) = request {
            fs::write(dir.join(REQUEST_CONFIG_FILE), request).unwrap();
        }
    }

    fn reader() -> LegacyConfigReader {
        LegacyConfigReader::new(&ObserveConfig::default())
    }

    #[tokio::test]
    async fn test_reads_flavored_configs() {
        let root = tempfile::tempdir().unwrap();
        write_entry(
            root.path(),
            "cluster-a",
            Some(DEPLOY),
            Some(r#"{"instances": 2, "owners": ["alice"]}"#),
        );
        write_entry(
            root.path(),
            "cluster-a.canary",
            Some(DEPLOY),
            Some(r#"{"instances": 1, "owners": ["bob"]}"#),
        );
        fs::write(root.path().join("config").join("README"), "not a config").unwrap();
        write_entry(root.path(), "scratch", None, None);

        let report = reader().read(root.path(), CancellationToken::new()).await;
        assert!(report.failures.is_empty());
        assert_eq!(report.skipped, 2);

        let snapshot = &report.aggregation.snapshot;
        assert_eq!(snapshot.len(), 2);
        let plain = snapshot.manifest("").unwrap();
        assert_eq!(plain.owners.to_vec(), vec!["alice".to_string()]);
        let spec = &plain.deployments["cluster-a"];
        assert_eq!(spec.config.num_instances, 2);
        assert_eq!(spec.config.resources.get("memory"), Some("256"));
        assert_eq!(spec.config.env.get("MODE").map(String::as_str), Some("prod"));

        let canary = snapshot.manifest("canary").unwrap();
        assert_eq!(canary.owners.to_vec(), vec!["bob".to_string()]);
        assert_eq!(canary.deployments["cluster-a"].config.num_instances, 1);
    }

    #[tokio::test]
    async fn test_request_file_optional() {
        let root = tempfile::tempdir().unwrap();
        write_entry(root.path(), "east", Some(DEPLOY), None);

        let report = reader().read(root.path(), CancellationToken::new()).await;
        let manifest = report.aggregation.snapshot.manifest("").unwrap().clone();
        assert!(manifest.owners.is_empty());
        assert_eq!(manifest.deployments["east"].config.num_instances, 0);
    }

    #[tokio::test]
    async fn test_strict_parsing_rejects_entries() {
        let root = tempfile::tempdir().unwrap();
        write_entry(
            root.path(),
            "unknown-resource",
            Some(r#"{"resources": {"cpus": 1, "memoryMb": 1, "numPorts": 1, "disk": 5}}"#),
            None,
        );
        write_entry(
            root.path(),
            "missing-resource",
            Some(r#"{"resources": {"cpus": 1}}"#),
            None,
        );
        write_entry(
            root.path(),
            "unknown-field",
            Some(r#"{"resources": {"cpus": 1, "memoryMb": 1, "numPorts": 1}, "daemon": true}"#),
            None,
        );
        write_entry(
            root.path(),
            "bad-request",
            Some(DEPLOY),
            Some(r#"{"instances": 1, "loadBalanced": true}"#),
        );
        write_entry(root.path(), "good", Some(DEPLOY), None);

        let report = reader().read(root.path(), CancellationToken::new()).await;
        assert_eq!(report.failures.len(), 4);
        assert_eq!(report.aggregation.snapshot.deployment_count(), 1);
        assert!(report.aggregation.snapshot.deployment("", "good").is_some());
    }

    #[tokio::test]
    async fn test_unreadable_request_file_keeps_entry() {
        let root = tempfile::tempdir().unwrap();
        write_entry(root.path(), "east", Some(DEPLOY), None);
        // A directory where the request file should be fails to read
        fs::create_dir(root.path().join("config").join("east").join(REQUEST_CONFIG_FILE)).unwrap();

        let report = reader().read(root.path(), CancellationToken::new()).await;
        assert!(report.failures.is_empty());
        let spec = report.aggregation.snapshot.deployment("", "east").unwrap();
        assert_eq!(spec.config.num_instances, 0);
        assert!(report.aggregation.snapshot.manifest("").unwrap().owners.is_empty());
    }

    #[tokio::test]
    async fn test_missing_config_dir_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let report = reader().read(root.path(), CancellationToken::new()).await;
        assert!(report.aggregation.snapshot.is_empty());
        assert!(report.failures.is_empty());
    }
}
