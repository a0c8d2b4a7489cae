//! Provider session options.
//!
//! The host hands these over when opening a session; every field can also be
//! picked up from `PM_*` environment variables for out-of-band defaults.

use serde::{Deserialize, Serialize};
use std::env;

use provirt_core::error::{Error, Result};

/// Parse an environment variable as a typed value with a default fallback
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Options the host supplies when opening a provider session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API endpoint, e.g. `https://host.fqdn:8006/api2/json`.
    pub api_url: String,
    pub username: String,
    pub password: String,
    /// Skip TLS certificate verification.
    pub tls_insecure: bool,
    /// Allow clone operations to overlap.
    pub parallel_clone: bool,
    /// Allow disk resize operations to overlap.
    pub parallel_resize: bool,
    /// Cap on concurrently admitted hypervisor operations.
    pub parallel_resources: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            username: String::new(),
            password: String::new(),
            tls_insecure: false,
            parallel_clone: false,
            parallel_resize: false,
            parallel_resources: 4,
        }
    }
}

impl ProviderConfig {
    /// Build a configuration from `PM_*` environment variables, falling
    /// back to the defaults above for anything unset.
    pub fn from_env() -> Self {
        Self {
            api_url: env::var("PM_API_URL").unwrap_or_default(),
            username: env::var("PM_USER").unwrap_or_default(),
            password: env::var("PM_PASSWORD").unwrap_or_default(),
            tls_insecure: env_var_or_default("PM_TLS_INSECURE", false),
            parallel_clone: env_var_or_default("PM_PARALLEL_CLONES", false),
            parallel_resize: env_var_or_default("PM_PARALLEL_RESIZES", false),
            parallel_resources: env_var_or_default("PM_PARALLEL_RESOURCES", 4),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            return Err(Error::InvalidConfiguration {
                message: "api_url must be set".to_string(),
            });
        }
        if self.username.is_empty() || self.password.is_empty() {
            return Err(Error::InvalidConfiguration {
                message: "username and password must be set".to_string(),
            });
        }
        if self.parallel_resources == 0 {
            return Err(Error::InvalidConfiguration {
                message: "parallel_resources must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProviderConfig {
        ProviderConfig {
            api_url: "https://pve.example:8006/api2/json".to_string(),
            username: "root@pam".to_string(),
            password: "secret".to_string(),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn defaults_match_the_declared_options_table() {
        let config = ProviderConfig::default();
        assert_eq!(config.parallel_resources, 4);
        assert!(!config.tls_insecure);
        assert!(!config.parallel_clone);
        assert!(!config.parallel_resize);
    }

    #[test]
    fn validate_accepts_a_complete_configuration() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_credentials_and_zero_limit() {
        let mut config = valid();
        config.password = String::new();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.api_url = String::new();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.parallel_resources = 0;
        assert!(config.validate().is_err());
    }
}
