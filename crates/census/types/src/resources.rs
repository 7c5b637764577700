//! Canonical resource requirements
//!
//! Scheduler-native resource fields (`cpus`, `memoryMb`, `numPorts`) are
//! translated into the canonical names `cpus`, `memory` and `ports`, with
//! values kept as minimal decimal strings so no precision is lost between
//! the scheduler and the stored manifest.

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Canonical resource names.
pub const CANONICAL_RESOURCES: [&str; 3] = ["cpus", "memory", "ports"];

/// Scheduler-native name to canonical name.
const NATIVE_TO_CANONICAL: [(&str, &str); 3] =
    [("cpus", "cpus"), ("memoryMb", "memory"), ("numPorts", "ports")];

/// Format a number as the shortest decimal string that round-trips.
///
/// Never uses exponent notation or a fixed number of fractional digits:
/// `2.0` becomes `"2"`, `0.25` stays `"0.25"`.
pub fn format_decimal(value: f64) -> String {
    // f64's Display is the shortest round-trip representation without
    // an exponent.
    let s = value.to_string();
    if s == "-0" {
        "0".to_string()
    } else {
        s
    }
}

/// Mapping from canonical resource name to decimal string value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resources(BTreeMap<String, String>);

impl Resources {
    /// Build canonical resources from scheduler-native values.
    pub fn from_native(cpus: f64, memory_mb: f64, num_ports: u32) -> Self {
        let mut map = BTreeMap::new();
        map.insert("cpus".to_string(), format_decimal(cpus));
        map.insert("memory".to_string(), format_decimal(memory_mb));
        map.insert("ports".to_string(), num_ports.to_string());
        Self(map)
    }

    /// Build canonical resources from a scheduler-native name/value map,
    /// rejecting any name outside the known set and requiring all of them.
    ///
    /// Every missing name is reported in a single error, sorted.
    pub fn from_native_map(native: &HashMap<String, f64>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (name, value) in native {
            let canonical = canonical_name(name)
                .ok_or_else(|| TypesError::InvalidResourceName(name.clone()))?;
            if !value.is_finite() || *value < 0.0 {
                return Err(TypesError::InvalidResourceValue {
                    name: name.clone(),
                    value: *value,
                });
            }
            map.insert(canonical.to_string(), format_decimal(*value));
        }

        let mut missing: Vec<String> = NATIVE_TO_CANONICAL
            .iter()
            .filter(|(native_name, _)| !native.contains_key(*native_name))
            .map(|(native_name, _)| native_name.to_string())
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(TypesError::MissingResources(missing));
        }

        Ok(Self(map))
    }

    /// Value for a canonical resource name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// True when exactly the canonical names are present.
    pub fn has_canonical_keys(&self) -> bool {
        let keys: BTreeSet<&str> = self.0.keys().map(String::as_str).collect();
        let canonical: BTreeSet<&str> = CANONICAL_RESOURCES.into_iter().collect();
        keys == canonical
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(" "))
    }
}

fn canonical_name(native: &str) -> Option<&'static str> {
    NATIVE_TO_CANONICAL
        .iter()
        .find(|(n, _)| *n == native)
        .map(|(_, c)| *c)
}
