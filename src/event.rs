//! Approval events and model artifact references
//!
//! An [`ApprovalEvent`] is the inbound trigger for the deployment
//! controller: the model registry emits one whenever a model package
//! version's approval status changes. Only `Approved` events start a
//! deployment; everything else is discarded without side effects.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Approval status of a model package version
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    /// The model version was approved for deployment
    Approved,
    /// The model version was rejected
    Rejected,
    /// The model version is awaiting manual review
    PendingManualApproval,
}

/// Notification that a model package version's approval status changed.
///
/// Immutable and consumed once. Delivery is at-least-once, so the
/// controller must converge to the same terminal endpoint state when the
/// same event is replayed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    /// Model package group the version belongs to
    pub model_package_group_name: String,
    /// Unique identifier of the approved model package version
    pub model_package_arn: String,
    /// New approval status
    pub approval_status: ApprovalStatus,
}

impl ApprovalEvent {
    /// Validate that the event carries the fields a deployment needs.
    ///
    /// Structurally invalid events are discarded by the controller with a
    /// logged warning; they never produce an outcome report.
    pub fn validate(&self) -> Result<()> {
        if self.model_package_arn.trim().is_empty() {
            return Err(Error::malformed_event("model_package_arn is empty"));
        }
        if self.model_package_group_name.trim().is_empty() {
            return Err(Error::malformed_event("model_package_group_name is empty"));
        }
        Ok(())
    }
}

/// Resolved reference to a trained model artifact.
///
/// Produced by the model registry from a package identifier; read-only
/// input to endpoint configuration creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifactRef {
    /// Model package this artifact was resolved from
    pub model_package_arn: String,
    /// Container image serving the model
    pub container_image_uri: String,
    /// Location of the trained model data
    pub model_data_uri: String,
}
