//! Error types for the Capstan deployment controller

use std::time::Duration;

use thiserror::Error;

/// Main error type for deployment operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Transient service or network error while talking to the endpoint
    /// platform. Safe to retry with backoff.
    #[error("transient service error: {0}")]
    TransientQuery(String),

    /// Authorization failure. Never retried; terminal for the run.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Model registry lookup failure. Terminal for the run.
    #[error("model registry error: {0}")]
    Registry(String),

    /// Endpoint deletion did not converge within the configured budget.
    #[error("endpoint '{endpoint_name}' did not finish deleting within {waited:?}")]
    ReclaimTimeout {
        /// Name of the endpoint being reclaimed
        endpoint_name: String,
        /// How long the reclaimer waited before giving up
        waited: Duration,
    },

    /// Endpoint creation did not reach InService within the configured budget.
    #[error("endpoint '{endpoint_name}' did not reach InService within {waited:?}")]
    ProvisionTimeout {
        /// Name of the endpoint being provisioned
        endpoint_name: String,
        /// How long the provisioner waited before giving up
        waited: Duration,
    },

    /// The platform reported the endpoint creation as failed.
    #[error("endpoint '{endpoint_name}' failed to provision: {reason}")]
    ProvisionFailed {
        /// Name of the endpoint that failed
        endpoint_name: String,
        /// Failure reason reported by the platform
        reason: String,
    },

    /// An approval event was structurally invalid (missing or empty fields).
    /// Discarded with a warning; no deployment is attempted.
    #[error("malformed approval event: {0}")]
    MalformedEvent(String),

    /// Invalid deployment configuration
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a transient query error with the given message
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientQuery(msg.into())
    }

    /// Create a permission error with the given message
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    /// Create a registry error with the given message
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a malformed-event error with the given message
    pub fn malformed_event(msg: impl Into<String>) -> Self {
        Self::MalformedEvent(msg.into())
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error is safe to retry with backoff.
    ///
    /// Only transient query errors are retryable; everything else is
    /// terminal for the current deployment attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientQuery(_))
    }
}
