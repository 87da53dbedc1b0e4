//! Retention sweeper configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the background retention sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Enable/disable the background loop.
    /// `sweep_once` can still be called directly when disabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Files whose last modification is older than this are deleted.
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    30 * 60 // 30 minutes
}

fn default_retention() -> u64 {
    30 * 60 // 30 minutes
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            retention_secs: default_retention(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SweeperConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval_secs, 1800);
        assert_eq!(config.retention_secs, 1800);
    }

    #[test]
    fn test_partial_toml() {
        let config: SweeperConfig = toml::from_str("retention_secs = 60").unwrap();
        assert!(config.enabled);
        assert_eq!(config.interval_secs, 1800);
        assert_eq!(config.retention_secs, 60);
    }
}
