//! Owner sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unordered, duplicate-free set of owner identifiers
///
/// Kept ordered internally so serialized snapshots are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerSet(BTreeSet<String>);

impl OwnerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an owner. Returns false if already present.
    pub fn add(&mut self, owner: impl Into<String>) -> bool {
        self.0.insert(owner.into())
    }

    pub fn remove(&mut self, owner: &str) -> bool {
        self.0.remove(owner)
    }

    pub fn contains(&self, owner: &str) -> bool {
        self.0.contains(owner)
    }

    /// Add every owner of `other` to this set.
    pub fn union_with(&mut self, other: &OwnerSet) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Owners as a sorted list.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for OwnerSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for OwnerSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}
