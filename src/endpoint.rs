//! Endpoint state types and external collaborator traits
//!
//! The deployment controller never talks to the managed-endpoint platform
//! directly; all calls go through the [`EndpointService`] trait so the
//! platform client can be swapped for a mock or an in-memory simulator in
//! tests. Model package lookups go through [`ModelRegistry`] the same way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::config::VariantSpec;
use crate::event::ModelArtifactRef;
use crate::Result;

/// Observed lifecycle status of the named endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointStatus {
    /// No endpoint with the logical name exists. This is the expected
    /// state before first deployment and after a completed reclaim, not
    /// an error.
    None,
    /// The platform is creating the endpoint
    Creating,
    /// The endpoint is serving traffic
    InService,
    /// The platform is updating the endpoint
    Updating,
    /// The platform is deleting the endpoint
    Deleting,
    /// The platform reported the endpoint as failed
    Failed,
}

/// Point-in-time snapshot of the live endpoint resource.
///
/// A plain value returned by each inspection and threaded through the
/// controller; there is no shared in-process mutable singleton. Mutation
/// of the underlying resource is serialized through the controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Fixed logical endpoint name
    pub endpoint_name: String,
    /// Name of the endpoint configuration currently backing the endpoint,
    /// if one exists
    pub endpoint_config_name: Option<String>,
    /// Observed status
    pub status: EndpointStatus,
}

impl EndpointDescriptor {
    /// Descriptor for an endpoint that does not exist
    pub fn absent(endpoint_name: impl Into<String>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            endpoint_config_name: None,
            status: EndpointStatus::None,
        }
    }

    /// Whether the endpoint is absent from the platform
    pub fn is_absent(&self) -> bool {
        self.status == EndpointStatus::None
    }
}

/// Raw observation returned by [`EndpointService::describe_endpoint`]
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointObservation {
    /// Endpoint configuration backing the endpoint
    pub endpoint_config_name: String,
    /// Current platform status
    pub status: EndpointStatus,
    /// Platform failure reason, populated when status is `Failed`
    pub failure_reason: Option<String>,
}

/// Specification for a new endpoint configuration.
///
/// Endpoint configurations are immutable platform objects: they are
/// created once with a unique name per deployment attempt, referenced by
/// the endpoint, and deleted only as part of reclaiming stale resources.
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointConfigSpec {
    /// Unique configuration name for this attempt
    pub config_name: String,
    /// Model artifact the configuration points at
    pub artifact: ModelArtifactRef,
    /// Serving variant (instance type, count, weight)
    pub variant: VariantSpec,
}

/// Abstract managed-endpoint platform operations.
///
/// The exact wire protocol is owned by the platform; this trait is the
/// full surface the controller needs. There is intentionally no
/// `update_endpoint`: the controller always reclaims the existing
/// endpoint before provisioning, so creation is the only mutation path.
///
/// Error contract: implementations return
/// [`Error::TransientQuery`](crate::Error::TransientQuery) for
/// network/service failures (retryable) and
/// [`Error::Permission`](crate::Error::Permission) for authorization
/// failures (never retried).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EndpointService: Send + Sync {
    /// Create a new immutable endpoint configuration
    async fn create_config(&self, spec: &EndpointConfigSpec) -> Result<()>;

    /// Delete an endpoint configuration.
    ///
    /// Deleting a configuration that no longer exists is not an error;
    /// the platform may lag behind an earlier delete.
    async fn delete_config(&self, config_name: &str) -> Result<()>;

    /// Create an endpoint backed by the named configuration
    async fn create_endpoint(&self, endpoint_name: &str, config_name: &str) -> Result<()>;

    /// Begin deleting an endpoint
    async fn delete_endpoint(&self, endpoint_name: &str) -> Result<()>;

    /// Query current endpoint state.
    ///
    /// Returns `Ok(None)` when no endpoint with the name exists.
    async fn describe_endpoint(&self, endpoint_name: &str) -> Result<Option<EndpointObservation>>;
}

/// Model registry lookups.
///
/// The registry is an external catalog of versioned, approvable model
/// packages; only the lookup surface the controller needs is specified
/// here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Resolve a model package identifier to its deployable artifact
    async fn resolve(&self, model_package_arn: &str) -> Result<ModelArtifactRef>;

    /// Newest approved package in a group, if any.
    ///
    /// Used by delivery adapters when a notification names a package
    /// group but the deployment should pin to the latest approved
    /// version in it.
    async fn latest_approved(&self, group_name: &str) -> Result<Option<String>>;
}
