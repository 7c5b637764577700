//! Source versions recovered from image metadata

use semver::{BuildMetadata, Version};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The precise version of the software a deployment runs
///
/// The VCS revision is kept verbatim and also carried as the semantic
/// version's build metadata, with characters semver does not allow there
/// replaced by `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceVersion {
    /// Repository URL
    pub repo_url: String,

    /// Semantic version, with the revision as build metadata
    pub version: Version,

    /// VCS revision as labelled
    #[serde(default)]
    pub revision: String,

    /// Offset of the source tree within the repository
    pub offset: String,
}

impl SourceVersion {
    /// Parse a version string and attach `revision` as build metadata.
    ///
    /// Any build metadata already present in `version` is replaced. Only
    /// the version string can fail to parse; a parse failure yields no
    /// value at all.
    pub fn parse(
        repo_url: impl Into<String>,
        version: &str,
        revision: &str,
        offset: impl Into<String>,
    ) -> Result<Self, semver::Error> {
        let mut parsed = Version::parse(version.trim())?;
        parsed.build = build_metadata(revision);

        Ok(Self {
            repo_url: repo_url.into(),
            version: parsed,
            revision: revision.to_string(),
            offset: offset.into(),
        })
    }

    /// The VCS revision.
    pub fn revision(&self) -> &str {
        &self.revision
    }
}

/// Fold an arbitrary revision into valid build identifiers.
fn build_metadata(revision: &str) -> BuildMetadata {
    let cleaned: String = revision
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect();
    let identifiers: Vec<&str> = cleaned.split('.').filter(|s| !s.is_empty()).collect();
    if identifiers.is_empty() {
        return BuildMetadata::EMPTY;
    }
    BuildMetadata::new(&identifiers.join(".")).unwrap_or(BuildMetadata::EMPTY)
}

impl fmt::Display for SourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.repo_url, self.version, self.offset)
    }
}
