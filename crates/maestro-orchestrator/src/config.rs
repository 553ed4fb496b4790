use maestro_core::{MaestroError, MaestroResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine configuration. Every field has a default, so an empty TOML table
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Concurrent dispatches allowed within one task.
    #[serde(default = "default_max_parallel_degree")]
    pub max_parallel_degree: usize,
    /// EMA weight given to each new quality observation.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Exploration probability of the allocator.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
    /// Retries per subtask after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fail the task on the first failed subtask instead of merging a
    /// degraded result.
    #[serde(default = "default_require_all")]
    pub require_all: bool,
    #[serde(default = "default_negotiation_timeout_ms")]
    pub negotiation_timeout_ms: u64,
    #[serde(default = "default_subtask_timeout_ms")]
    pub subtask_timeout_ms: u64,
    #[serde(default = "default_retry_backoff_base_ms")]
    pub retry_backoff_base_ms: u64,
    /// Seed for the allocator's random source. `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_parallel_degree() -> usize {
    4
}

fn default_alpha() -> f64 {
    0.1
}

fn default_epsilon() -> f64 {
    0.1
}

fn default_max_revisions() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    2
}

fn default_require_all() -> bool {
    true
}

fn default_negotiation_timeout_ms() -> u64 {
    2_000
}

fn default_subtask_timeout_ms() -> u64 {
    60_000
}

fn default_retry_backoff_base_ms() -> u64 {
    500
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel_degree: default_max_parallel_degree(),
            alpha: default_alpha(),
            epsilon: default_epsilon(),
            max_revisions: default_max_revisions(),
            max_retries: default_max_retries(),
            require_all: default_require_all(),
            negotiation_timeout_ms: default_negotiation_timeout_ms(),
            subtask_timeout_ms: default_subtask_timeout_ms(),
            retry_backoff_base_ms: default_retry_backoff_base_ms(),
            seed: None,
        }
    }
}

impl OrchestratorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> MaestroResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| MaestroError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> MaestroResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_toml_str(&data)
    }

    pub fn validate(&self) -> MaestroResult<()> {
        if self.max_parallel_degree == 0 {
            return Err(MaestroError::Config(
                "max_parallel_degree must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(MaestroError::Config(format!(
                "alpha must be within [0, 1], got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(MaestroError::Config(format!(
                "epsilon must be within [0, 1], got {}",
                self.epsilon
            )));
        }
        Ok(())
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }

    pub fn subtask_timeout(&self) -> Duration {
        Duration::from_millis(self.subtask_timeout_ms)
    }

    /// Attempts per dispatch: the first try plus `max_retries`.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt` (1-based): `base · 2^(attempt−1)`.
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        Duration::from_millis(self.retry_backoff_base_ms.saturating_mul(factor))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = OrchestratorConfig::from_toml_str("").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
        assert_eq!(config.max_parallel_degree, 4);
        assert!(config.require_all);
        assert_eq!(config.subtask_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_toml() {
        let config = OrchestratorConfig::from_toml_str(
            "epsilon = 0.0\nmax_retries = 5\nseed = 7\nrequire_all = false\n",
        )
        .unwrap();
        assert_eq!(config.epsilon, 0.0);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.seed, Some(7));
        assert!(!config.require_all);
        assert_eq!(config.alpha, 0.1);
    }

    #[test]
    fn test_validation() {
        assert!(OrchestratorConfig::from_toml_str("alpha = 1.5").is_err());
        assert!(OrchestratorConfig::from_toml_str("epsilon = -0.1").is_err());
        assert!(OrchestratorConfig::from_toml_str("max_parallel_degree = 0").is_err());
        assert!(matches!(
            OrchestratorConfig::from_toml_str("max_retries = \"two\""),
            Err(MaestroError::Config(_))
        ));
    }

    #[test]
    fn test_retry_backoff_doubles() {
        let config = OrchestratorConfig {
            retry_backoff_base_ms: 100,
            ..Default::default()
        };
        assert_eq!(config.retry_backoff(1), Duration::from_millis(100));
        assert_eq!(config.retry_backoff(2), Duration::from_millis(200));
        assert_eq!(config.retry_backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_max_attempts_saturates() {
        let mut config = OrchestratorConfig::default();
        assert_eq!(config.max_attempts(), 3);
        config.max_retries = u32::MAX;
        assert_eq!(config.max_attempts(), u32::MAX);
    }
}
