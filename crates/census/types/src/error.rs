//! Validation errors for census types

use thiserror::Error;

/// Errors raised while constructing or validating census types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypesError {
    #[error("Unrecognized workload kind: {0:?}")]
    UnrecognizedKind(String),

    #[error("Invalid resource name {0:?}")]
    InvalidResourceName(String),

    #[error("Missing resource(s): {}", .0.join(", "))]
    MissingResources(Vec<String>),

    #[error("Invalid value for resource {name}: {value}")]
    InvalidResourceValue { name: String, value: f64 },

    #[error("Grouping key {0:?} has an empty cluster component")]
    EmptyCluster(String),
}

/// Result type for census type validation
pub type Result<T> = std::result::Result<T, TypesError>;
