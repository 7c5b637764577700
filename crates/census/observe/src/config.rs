//! Configuration for observed-state reconciliation

use crate::collector::CollectorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reconciliation pass configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserveConfig {
    /// Maximum candidates built at once; 0 means unbounded
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Result channel capacity
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Whole-pass timeout in seconds
    #[serde(default = "default_pass_timeout")]
    pub pass_timeout_secs: Option<u64>,

    /// Directory holding legacy deploy configs, relative to a source root
    #[serde(default = "default_legacy_config_dir")]
    pub legacy_config_dir: String,
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            channel_capacity: default_channel_capacity(),
            pass_timeout_secs: default_pass_timeout(),
            legacy_config_dir: default_legacy_config_dir(),
        }
    }
}

// Default value helpers
fn default_max_in_flight() -> usize {
    16
}

fn default_channel_capacity() -> usize {
    64
}

fn default_pass_timeout() -> Option<u64> {
    Some(300)
}

fn default_legacy_config_dir() -> String {
    "config".to_string()
}

impl ObserveConfig {
    /// Load configuration from defaults, an optional file and `CENSUS_*`
    /// environment variables, in that order of precedence.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&ObserveConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(config::Environment::with_prefix("CENSUS").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            max_in_flight: (self.max_in_flight > 0).then_some(self.max_in_flight),
            channel_capacity: self.channel_capacity,
        }
    }

    pub fn pass_timeout(&self) -> Option<Duration> {
        self.pass_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ObserveConfig::default();
        assert_eq!(config.max_in_flight, 16);
        assert_eq!(config.pass_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.collector_config().max_in_flight, Some(16));
    }

    #[test]
    fn test_zero_is_unbounded() {
        let config = ObserveConfig {
            max_in_flight: 0,
            ..Default::default()
        };
        assert_eq!(config.collector_config().max_in_flight, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_in_flight = 4\nlegacy_config_dir = \"deploy\"").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = ObserveConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.legacy_config_dir, "deploy");
        assert_eq!(config.channel_capacity, 64);
    }

    #[test]
    fn test_load_without_file() {
        let config = ObserveConfig::load(None).unwrap();
        assert_eq!(config.channel_capacity, 64);
    }
}
