//! Census Types - Core types for observed deployment state
//!
//! Census turns a scheduler's live view of a fleet into canonical,
//! versioned deployment records and groups them into a [`Snapshot`].
//!
//! ## Key Concepts
//!
//! - **Deployment**: One version of one piece of software running in one cluster
//! - **Resources**: Canonical `cpus` / `memory` / `ports` requirements
//! - **OwnerSet**: Unordered, duplicate-free owners of a deployment
//! - **GroupingKey**: `(flavor, cluster)` pair used to bucket deployments
//! - **Snapshot**: The grouped result of one reconciliation pass

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod deployment;
pub mod error;
pub mod grouping;
pub mod kind;
pub mod owners;
pub mod resources;
pub mod snapshot;
pub mod version;

// Re-export main types
pub use deployment::{Annotation, DeployConfig, DeploySpec, Deployment, Env};
pub use error::{Result, TypesError};
pub use grouping::GroupingKey;
pub use kind::ManifestKind;
pub use owners::OwnerSet;
pub use resources::{format_decimal, Resources, CANONICAL_RESOURCES};
pub use snapshot::{Collision, Manifest, Snapshot};
pub use version::SourceVersion;
