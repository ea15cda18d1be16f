use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Tunables for `breaker::Breaker`. See SPEC_FULL.md §4.1 for the
/// rationale behind each default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    pub max_errors_before_open: u32,
    pub cooldown_secs: u64,
    pub overprovisioning_factor: usize,
    pub cleanup_interval_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_errors_before_open: 7,
            cooldown_secs: 60,
            overprovisioning_factor: 2,
            cleanup_interval_secs: 3600,
        }
    }
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.overprovisioning_factor == 0 {
            return Err(ConfigError::Validation(
                "breaker.overprovisioning_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Thresholds for `liveness::LivenessMonitor`. See SPEC_FULL.md §3/§4.2.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LivenessThresholds {
    pub heartbeat_interval_secs: u64,
    pub timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub unresponsive_disconnect_secs: u64,
    pub idle_disconnect_secs: u64,
}

impl Default for LivenessThresholds {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 10,
            timeout_secs: 30,
            idle_timeout_secs: 120,
            unresponsive_disconnect_secs: 60,
            idle_disconnect_secs: 300,
        }
    }
}

impl LivenessThresholds {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn unresponsive_disconnect(&self) -> Duration {
        Duration::from_secs(self.unresponsive_disconnect_secs)
    }

    pub fn idle_disconnect(&self) -> Duration {
        Duration::from_secs(self.idle_disconnect_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_secs == 0 || self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "liveness.heartbeat_interval_secs and timeout_secs must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for a host application embedding both
/// subsystems. Loaded the same way the rest of the host's configuration
/// is loaded: TOML on disk, with `Default` covering every field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    pub breaker: BreakerConfig,
    pub liveness: LivenessThresholds,
}

impl RuntimeConfig {
    /// Load configuration from a TOML file, falling back to field-level
    /// defaults for anything the file omits.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: RuntimeConfig = toml::from_str(&contents)?;
        config.breaker.validate()?;
        config.liveness.validate()?;
        Ok(config)
    }

    /// Apply the one environment override this crate recognizes: the
    /// `RUST_LOG`-style tracing filter is read directly by
    /// `logging::init_logging`, so this is a no-op placeholder kept for
    /// symmetry with the host's config-loading convention, where every
    /// config type exposes an `from_env_overrides` hook even if unused.
    pub fn from_env_overrides(self) -> Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_spec_constants() {
        let config = RuntimeConfig::default();
        assert_eq!(config.breaker.max_errors_before_open, 7);
        assert_eq!(config.breaker.cooldown_secs, 60);
        assert_eq!(config.breaker.overprovisioning_factor, 2);
        assert_eq!(config.breaker.cleanup_interval_secs, 3600);
    }

    #[test]
    fn load_overlays_partial_toml_onto_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[breaker]\nmax_errors_before_open = 3\n").unwrap();

        let config = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(config.breaker.max_errors_before_open, 3);
        assert_eq!(config.breaker.cooldown_secs, 60);
        assert_eq!(config.liveness, LivenessThresholds::default());
    }

    #[test]
    fn rejects_zero_overprovisioning_factor() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[breaker]\noverprovisioning_factor = 0\n").unwrap();

        let err = RuntimeConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
