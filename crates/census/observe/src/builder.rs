//! Deployment Builder
//!
//! Turns one [`Candidate`] into a canonical [`Deployment`] by walking an
//! ordered, fail-fast sequence of steps:
//!
//! 1. Select the deploy marker (pending wins over active)
//! 2. Fetch the deploy record from the scheduler
//! 3. Validate the container technology
//! 4. Recover the source version from image labels
//! 5. Unpack env, resources, instance count and owners
//! 6. Classify the workload kind
//!
//! Every failure is passed through [`classify`] before it is returned.

use crate::candidate::Candidate;
use crate::client::{
    ContainerType, DeployMarker, ImageMetadataClient, RequestParent, SchedulerClient,
    SchedulerDeploy, SchedulerRequest,
};
use crate::error::{BuildError, Result};
use crate::retry::{classify, RetryableError};
use census_types::{
    Annotation, DeployConfig, Deployment, Env, ManifestKind, OwnerSet, Resources, SourceVersion,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Image label carrying the repository URL
pub const LABEL_REPO_URL: &str = "com.opentable.sous.repo_url";
/// Image label carrying the semantic version
pub const LABEL_VERSION: &str = "com.opentable.sous.version";
/// Image label carrying the VCS revision
pub const LABEL_REVISION: &str = "com.opentable.sous.revision";
/// Image label carrying the source-tree offset
pub const LABEL_REPO_OFFSET: &str = "com.opentable.sous.repo_offset";

/// Labels every deployable image must carry, in reporting order.
pub const REQUIRED_LABELS: [&str; 4] =
    [LABEL_REPO_URL, LABEL_VERSION, LABEL_REVISION, LABEL_REPO_OFFSET];

/// Builds deployments against shared scheduler and image-metadata clients
#[derive(Clone)]
pub struct DeploymentBuilder {
    scheduler: Arc<dyn SchedulerClient>,
    images: Arc<dyn ImageMetadataClient>,
}

impl DeploymentBuilder {
    pub fn new(scheduler: Arc<dyn SchedulerClient>, images: Arc<dyn ImageMetadataClient>) -> Self {
        Self { scheduler, images }
    }

    /// Build the deployment a candidate describes.
    #[instrument(
        skip_all,
        fields(cluster = %candidate.cluster(), request_id = candidate.request_id().unwrap_or_default())
    )]
    pub async fn build(&self, candidate: &Candidate) -> std::result::Result<Deployment, RetryableError> {
        self.complete_construction(candidate)
            .await
            .map_err(|cause| classify(candidate, cause))
    }

    async fn complete_construction(&self, candidate: &Candidate) -> Result<Deployment> {
        let parent = candidate
            .parent
            .as_ref()
            .ok_or(BuildError::MissingDeployState("no parent request"))?;

        let marker = select_marker(parent)?;
        let deploy = self.retrieve_deploy(marker).await?;
        let image = docker_image(&deploy)?;

        let labels = self
            .images
            .labels_for_image(image)
            .await
            .map_err(BuildError::ImageMetadata)?;
        let source_version = build_source_version(&labels)?;

        let request = candidate.request().ok_or(BuildError::MissingRequest)?;
        let (config, owners) = unpack_deploy_config(&deploy, request);
        let kind = determine_kind(request)?;

        debug!(deploy_id = %marker.deploy_id, version = %source_version.version, "deployment built");

        Ok(Deployment {
            cluster: candidate.cluster().to_string(),
            source_version,
            config,
            owners,
            kind,
            annotation: Annotation {
                request_id: request.id.clone(),
            },
        })
    }

    async fn retrieve_deploy(&self, marker: &DeployMarker) -> Result<SchedulerDeploy> {
        let record = self
            .scheduler
            .get_deploy(&marker.request_id, &marker.deploy_id)
            .await
            .map_err(BuildError::Scheduler)?;

        record.deploy.ok_or_else(|| BuildError::MissingDeploy {
            deploy_id: marker.deploy_id.clone(),
        })
    }
}

/// Pick the deploy to observe; a pending deploy is the most current intent.
fn select_marker(parent: &RequestParent) -> Result<&DeployMarker> {
    let state = parent
        .request_deploy_state
        .as_ref()
        .ok_or(BuildError::MissingDeployState("no deploy state"))?;

    state
        .pending_deploy
        .as_ref()
        .or(state.active_deploy.as_ref())
        .ok_or(BuildError::MissingDeployState("no deploy markers"))
}

fn docker_image(deploy: &SchedulerDeploy) -> Result<&str> {
    let info = deploy
        .container_info
        .as_ref()
        .ok_or(BuildError::MissingContainerInfo)?;
    if info.container_type != ContainerType::Docker {
        return Err(BuildError::UnsupportedContainerType(
            info.container_type.clone(),
        ));
    }
    let docker = info.docker.as_ref().ok_or(BuildError::MissingContainerInfo)?;
    Ok(&docker.image)
}

/// Recover a source version from image labels.
///
/// All four required labels are checked before failing, and every absent
/// one is named in the error.
pub fn build_source_version(labels: &HashMap<String, String>) -> Result<SourceVersion> {
    let missing: Vec<String> = REQUIRED_LABELS
        .iter()
        .filter(|name| !labels.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(BuildError::MissingLabels { names: missing });
    }

    let label = |name: &str| labels.get(name).map(String::as_str).unwrap_or_default();
    let version = label(LABEL_VERSION);

    SourceVersion::parse(
        label(LABEL_REPO_URL),
        version,
        label(LABEL_REVISION),
        label(LABEL_REPO_OFFSET),
    )
    .map_err(|source| BuildError::InvalidVersion {
        version: version.to_string(),
        source,
    })
}

fn unpack_deploy_config(deploy: &SchedulerDeploy, request: &SchedulerRequest) -> (DeployConfig, OwnerSet) {
    let env: Env = deploy
        .env
        .as_ref()
        .map(|env| env.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    let rez = &deploy.resources;
    let config = DeployConfig {
        resources: Resources::from_native(rez.cpus, rez.memory_mb, rez.num_ports),
        env,
        num_instances: request.instances,
    };

    (config, request.owners.iter().cloned().collect())
}

fn determine_kind(request: &SchedulerRequest) -> Result<ManifestKind> {
    ManifestKind::from_wire(&request.request_type)
        .map_err(|_| BuildError::UnrecognizedKind(request.request_type.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        ClientError, ContainerInfo, DeployRecord, RequestDeployState, SchedulerResources,
    };
    use crate::memory::{InMemoryImageMetadataClient, InMemorySchedulerClient};

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn full_labels(version: &str) -> HashMap<String, String> {
        labels(&[
            (LABEL_REPO_URL, "github.com/acme/web"),
            (LABEL_VERSION, version),
            (LABEL_REVISION, "cafe01"),
            (LABEL_REPO_OFFSET, "svc"),
        ])
    }

    fn deploy(id: &str, image: &str) -> SchedulerDeploy {
        SchedulerDeploy {
            id: id.into(),
            container_info: Some(ContainerInfo::docker(image)),
            env: Some(HashMap::from([("MODE".to_string(), "prod".to_string())])),
            resources: SchedulerResources {
                cpus: 2.0,
                memory_mb: 512.0,
                num_ports: 1,
            },
        }
    }

    fn candidate(
        request_id: &str,
        request_type: &str,
        pending: Option<&str>,
        active: Option<&str>,
    ) -> Candidate {
        let parent = RequestParent {
            request: Some(SchedulerRequest {
                id: request_id.into(),
                request_type: request_type.into(),
                instances: 3,
                owners: vec!["alice@acme".into(), "bob@acme".into()],
            }),
            request_deploy_state: Some(RequestDeployState {
                pending_deploy: pending.map(|d| DeployMarker::new(request_id, d)),
                active_deploy: active.map(|d| DeployMarker::new(request_id, d)),
            }),
        };
        Candidate::from_compound("east.canary", Some(parent)).unwrap()
    }

    struct Fixture {
        scheduler: Arc<InMemorySchedulerClient>,
        images: Arc<InMemoryImageMetadataClient>,
        builder: DeploymentBuilder,
    }

    fn fixture() -> Fixture {
        let scheduler = Arc::new(InMemorySchedulerClient::new());
        let images = Arc::new(InMemoryImageMetadataClient::new());
        scheduler.insert_deploy("web", deploy("d1", "reg/web:1"));
        scheduler.insert_deploy("web", deploy("d2", "reg/web:2"));
        images.insert_labels("reg/web:1", full_labels("1.0.0"));
        images.insert_labels("reg/web:2", full_labels("2.0.0"));
        let builder = DeploymentBuilder::new(scheduler.clone(), images.clone());
        Fixture {
            scheduler,
            images,
            builder,
        }
    }

    #[tokio::test]
    async fn test_build_complete_deployment() {
        let f = fixture();
        let dep = f
            .builder
            .build(&candidate("web", "SERVICE", None, Some("d1")))
            .await
            .unwrap();

        assert_eq!(dep.cluster, "east");
        assert_eq!(dep.kind, ManifestKind::Service);
        assert_eq!(dep.source_version.version.to_string(), "1.0.0+cafe01");
        assert_eq!(dep.source_version.offset, "svc");
        assert_eq!(dep.config.num_instances, 3);
        assert_eq!(dep.config.env.get("MODE").map(String::as_str), Some("prod"));
        assert_eq!(dep.config.resources, Resources::from_native(2.0, 512.0, 1));
        assert!(dep.config.resources.has_canonical_keys());
        assert_eq!(dep.owners.len(), 2);
        assert_eq!(dep.annotation.request_id, "web");
    }

    #[tokio::test]
    async fn test_pending_marker_takes_precedence() {
        let f = fixture();
        let dep = f
            .builder
            .build(&candidate("web", "SERVICE", Some("d2"), Some("d1")))
            .await
            .unwrap();

        assert_eq!(dep.source_version.version.major, 2);
        assert_eq!(f.images.calls_for("reg/web:2"), 1);
        assert_eq!(f.images.calls_for("reg/web:1"), 0);
    }

    #[tokio::test]
    async fn test_missing_markers() {
        let f = fixture();
        let err = f
            .builder
            .build(&candidate("web", "SERVICE", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), BuildError::MissingDeployState(_)));
        assert_eq!(f.scheduler.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_env_defaults_to_empty() {
        let f = fixture();
        let mut d = deploy("d3", "reg/web:1");
        d.env = None;
        f.scheduler.insert_deploy("web", d);

        let dep = f
            .builder
            .build(&candidate("web", "WORKER", Some("d3"), None))
            .await
            .unwrap();
        assert!(dep.config.env.is_empty());
        assert_eq!(dep.kind, ManifestKind::Worker);
    }

    #[tokio::test]
    async fn test_unsupported_container_is_fatal() {
        let f = fixture();
        let mut d = deploy("d3", "reg/web:1");
        d.container_info = Some(ContainerInfo {
            container_type: ContainerType::Mesos,
            docker: None,
        });
        f.scheduler.insert_deploy("web", d);

        let err = f
            .builder
            .build(&candidate("web", "SERVICE", Some("d3"), None))
            .await
            .unwrap_err();
        assert!(matches!(
            err.cause(),
            BuildError::UnsupportedContainerType(ContainerType::Mesos)
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_container_info() {
        let f = fixture();
        let mut d = deploy("d3", "reg/web:1");
        d.container_info = None;
        f.scheduler.insert_deploy("web", d);

        let err = f
            .builder
            .build(&candidate("web", "SERVICE", Some("d3"), None))
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), BuildError::MissingContainerInfo));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_scheduler_failure_is_retryable() {
        let f = fixture();
        f.scheduler
            .fail_deploy("web", "d1", ClientError::Transport("timeout".into()));

        let err = f
            .builder
            .build(&candidate("web", "SERVICE", None, Some("d1")))
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), BuildError::Scheduler(_)));
        assert!(err.is_retryable());
        assert_eq!(err.name(), "east:web");
    }

    #[tokio::test]
    async fn test_unknown_deploy_is_retryable() {
        let f = fixture();
        let err = f
            .builder
            .build(&candidate("web", "SERVICE", Some("d9"), None))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_record_without_deploy_is_retryable() {
        let f = fixture();
        f.scheduler
            .insert_record("web", "d4", DeployRecord { deploy: None });

        let err = f
            .builder
            .build(&candidate("web", "SERVICE", Some("d4"), None))
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), BuildError::MissingDeploy { deploy_id } if deploy_id == "d4"));
        assert!(err.is_retryable());
        assert_eq!(err.name(), "east:web");
    }

    #[tokio::test]
    async fn test_image_metadata_failure_is_retryable() {
        let f = fixture();
        f.images
            .fail_image("reg/web:1", ClientError::Status { status: 503, message: "busy".into() });

        let err = f
            .builder
            .build(&candidate("web", "SERVICE", None, Some("d1")))
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), BuildError::ImageMetadata(ClientError::Status { status: 503, .. })));
        assert!(err.is_retryable());
        assert_eq!(err.name(), "east:web");
        assert_eq!(f.images.calls_for("reg/web:1"), 1);
    }

    #[tokio::test]
    async fn test_failure_without_request_id_is_fatal() {
        let f = fixture();
        f.scheduler
            .fail_deploy("web", "d1", ClientError::Transport("timeout".into()));

        let mut c = candidate("web", "SERVICE", None, Some("d1"));
        if let Some(request) = c.parent.as_mut().and_then(|p| p.request.as_mut()) {
            request.id.clear();
        }
        let err = f.builder.build(&c).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unrecognized_kind() {
        let f = fixture();
        let err = f
            .builder
            .build(&candidate("web", "DAEMON", None, Some("d1")))
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), BuildError::UnrecognizedKind(t) if t == "DAEMON"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_labels_all_reported() {
        let err = build_source_version(&labels(&[(LABEL_REPO_URL, "x")])).unwrap_err();
        match err {
            BuildError::MissingLabels { names } => assert_eq!(
                names,
                vec![
                    LABEL_VERSION.to_string(),
                    LABEL_REVISION.to_string(),
                    LABEL_REPO_OFFSET.to_string()
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }

        let err = build_source_version(&HashMap::new()).unwrap_err();
        assert!(matches!(err, BuildError::MissingLabels { names } if names.len() == 4));
    }

    #[test]
    fn test_bad_version_is_fatal() {
        let err = build_source_version(&full_labels("v-latest")).unwrap_err();
        assert!(matches!(err, BuildError::InvalidVersion { ref version, .. } if version == "v-latest"));
        assert!(err.is_structural());
    }

    #[test]
    fn test_revision_with_path_characters_accepted() {
        let mut labels = full_labels("1.2.3");
        labels.insert(LABEL_REVISION.to_string(), "release/abc_123".to_string());

        let sv = build_source_version(&labels).unwrap();
        assert_eq!(sv.version.major, 1);
        assert_eq!(sv.revision(), "release/abc_123");
        assert_eq!(sv.version.to_string(), "1.2.3+release-abc-123");
    }
}
