//! Deployment configuration
//!
//! All wait budgets are explicit and configurable: no polling loop in
//! the reclaimer or provisioner runs without a bound from this config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;
use crate::{Error, Result};

/// Serving variant for an endpoint configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantSpec {
    /// Variant name
    pub variant_name: String,
    /// Instance type serving the model
    pub instance_type: String,
    /// Number of instances to start with
    pub initial_instance_count: u32,
    /// Initial traffic weight for the variant
    pub initial_variant_weight: f64,
}

impl Default for VariantSpec {
    fn default() -> Self {
        Self {
            variant_name: "primary".to_string(),
            instance_type: "ml.t2.medium".to_string(),
            initial_instance_count: 1,
            initial_variant_weight: 1.0,
        }
    }
}

/// Configuration for the deployment controller.
///
/// Loadable from YAML by delivery adapters; every field except
/// `endpoint_name` has a sensible default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Fixed logical endpoint name, derived from pipeline identity
    pub endpoint_name: String,
    /// Budget for endpoint deletion to converge, in milliseconds
    pub reclaim_timeout_ms: u64,
    /// Budget for a new endpoint to reach InService, in milliseconds
    pub provision_timeout_ms: u64,
    /// Interval between status polls, in milliseconds
    pub poll_interval_ms: u64,
    /// Retry behavior for transient platform errors
    pub retry: RetryConfig,
    /// Serving variant for new endpoint configurations
    pub variant: VariantSpec,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            endpoint_name: String::new(),
            reclaim_timeout_ms: crate::DEFAULT_RECLAIM_TIMEOUT_MS,
            provision_timeout_ms: crate::DEFAULT_PROVISION_TIMEOUT_MS,
            poll_interval_ms: crate::DEFAULT_POLL_INTERVAL_MS,
            retry: RetryConfig::default(),
            variant: VariantSpec::default(),
        }
    }
}

impl DeployConfig {
    /// Create a config for the given endpoint name with default budgets
    pub fn for_endpoint(endpoint_name: impl Into<String>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint_name.trim().is_empty() {
            return Err(Error::validation("endpoint_name must not be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::validation("poll_interval_ms must be positive"));
        }
        Ok(())
    }

    /// Reclaim budget as a [`Duration`]
    pub fn reclaim_timeout(&self) -> Duration {
        Duration::from_millis(self.reclaim_timeout_ms)
    }

    /// Provision budget as a [`Duration`]
    pub fn provision_timeout(&self) -> Duration {
        Duration::from_millis(self.provision_timeout_ms)
    }

    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
