//! Crate configuration.
//!
//! Configuration is loaded from a TOML file with environment variable
//! overrides (prefix `CORDON_`). Every field has a default so an empty
//! file, or no file at all, yields a working configuration.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Tenant registry ceilings and eviction policy.
    #[serde(default)]
    pub limits: TenancyLimits,
    /// Compensation retry policy for transaction rollback.
    #[serde(default)]
    pub compensation: CompensationConfig,
}

/// Registry ceilings and eviction policy.
#[derive(Debug, Clone, Deserialize)]
pub struct TenancyLimits {
    /// Ceiling on simultaneously bound identities across all contexts.
    #[serde(default = "default_max_active_tenants")]
    pub max_active_tenants: usize,
    /// Ceiling on total registry rows.
    #[serde(default = "default_max_registry_size")]
    pub max_registry_size: usize,
    /// Eviction age threshold in hours. Zero evicts every entry without a
    /// live binding on every sweep.
    #[serde(default = "default_inactive_tenant_ttl_hours")]
    pub inactive_tenant_ttl_hours: u64,
    /// Minimum spacing between opportunistic sweeps, in minutes.
    #[serde(default = "default_cleanup_interval_minutes")]
    pub cleanup_interval_minutes: u64,
    /// Disables all capacity checks when false.
    #[serde(default = "default_enforce_tenant_limits")]
    pub enforce_tenant_limits: bool,
}

fn default_max_active_tenants() -> usize {
    1000
}

fn default_max_registry_size() -> usize {
    5000
}

fn default_inactive_tenant_ttl_hours() -> u64 {
    24
}

fn default_cleanup_interval_minutes() -> u64 {
    60
}

fn default_enforce_tenant_limits() -> bool {
    true
}

impl Default for TenancyLimits {
    fn default() -> Self {
        Self {
            max_active_tenants: default_max_active_tenants(),
            max_registry_size: default_max_registry_size(),
            inactive_tenant_ttl_hours: default_inactive_tenant_ttl_hours(),
            cleanup_interval_minutes: default_cleanup_interval_minutes(),
            enforce_tenant_limits: default_enforce_tenant_limits(),
        }
    }
}

/// Retry policy for compensating actions during rollback.
///
/// Bounded so a backend outage during rollback cannot turn into a retry
/// storm. The curve is tunable, not contractual.
#[derive(Debug, Clone, Deserialize)]
pub struct CompensationConfig {
    /// Maximum attempts per compensating action, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial delay before the first retry (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between retries (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    2000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for CompensationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, apply environment overrides,
    /// and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        override_from_env(
            "CORDON_MAX_ACTIVE_TENANTS",
            "limits.max_active_tenants",
            &mut self.limits.max_active_tenants,
        )?;
        override_from_env(
            "CORDON_MAX_REGISTRY_SIZE",
            "limits.max_registry_size",
            &mut self.limits.max_registry_size,
        )?;
        override_from_env(
            "CORDON_INACTIVE_TENANT_TTL_HOURS",
            "limits.inactive_tenant_ttl_hours",
            &mut self.limits.inactive_tenant_ttl_hours,
        )?;
        override_from_env(
            "CORDON_CLEANUP_INTERVAL_MINUTES",
            "limits.cleanup_interval_minutes",
            &mut self.limits.cleanup_interval_minutes,
        )?;
        override_from_env(
            "CORDON_ENFORCE_TENANT_LIMITS",
            "limits.enforce_tenant_limits",
            &mut self.limits.enforce_tenant_limits,
        )?;
        override_from_env(
            "CORDON_COMPENSATION_MAX_ATTEMPTS",
            "compensation.max_attempts",
            &mut self.compensation.max_attempts,
        )?;
        override_from_env(
            "CORDON_COMPENSATION_INITIAL_DELAY_MS",
            "compensation.initial_delay_ms",
            &mut self.compensation.initial_delay_ms,
        )?;
        override_from_env(
            "CORDON_COMPENSATION_MAX_DELAY_MS",
            "compensation.max_delay_ms",
            &mut self.compensation.max_delay_ms,
        )?;
        Ok(())
    }

    /// Reject configurations that cannot work at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.enforce_tenant_limits {
            if self.limits.max_active_tenants == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "limits.max_active_tenants",
                    reason: "must be nonzero while limits are enforced".into(),
                });
            }
            if self.limits.max_registry_size == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "limits.max_registry_size",
                    reason: "must be nonzero while limits are enforced".into(),
                });
            }
            if self.limits.max_registry_size < self.limits.max_active_tenants {
                return Err(ConfigError::InvalidValue {
                    field: "limits.max_registry_size",
                    reason: "must be at least limits.max_active_tenants".into(),
                });
            }
        }
        if self.compensation.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "compensation.max_attempts",
                reason: "must be at least 1".into(),
            });
        }
        if self.compensation.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "compensation.backoff_multiplier",
                reason: "must be >= 1.0".into(),
            });
        }
        if self.compensation.initial_delay_ms > self.compensation.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "compensation.initial_delay_ms",
                reason: "must not exceed compensation.max_delay_ms".into(),
            });
        }
        Ok(())
    }
}

fn override_from_env<T: std::str::FromStr>(
    var: &str,
    field: &'static str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Ok(raw) = std::env::var(var) {
        *target = raw.parse().map_err(|_| ConfigError::InvalidValue {
            field,
            reason: format!("could not parse {raw:?} from ${var}"),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.limits.max_active_tenants, 1000);
        assert_eq!(config.limits.max_registry_size, 5000);
        assert_eq!(config.limits.inactive_tenant_ttl_hours, 24);
        assert_eq!(config.limits.cleanup_interval_minutes, 60);
        assert!(config.limits.enforce_tenant_limits);
        assert_eq!(config.compensation.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [limits]
            max_active_tenants = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.limits.max_active_tenants, 3);
        assert_eq!(config.limits.max_registry_size, 5000);
        assert_eq!(config.compensation.max_attempts, 3);
    }

    #[test]
    fn zero_active_ceiling_rejected_when_enforced() {
        let mut config = Config::default();
        config.limits.max_active_tenants = 0;
        assert!(config.validate().is_err());

        config.limits.enforce_tenant_limits = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn backoff_multiplier_below_one_rejected() {
        let mut config = Config::default();
        config.compensation.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }
}
