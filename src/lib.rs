//! Capstan - deployment controller for promoting approved ML models
//!
//! Capstan reacts to model-registry approval events by transitioning a
//! named inference endpoint to a new state backed by the latest approved
//! model version. The transition is reclaim-then-provision: the existing
//! endpoint and its immutable configuration are deleted and awaited, then
//! a fresh configuration and endpoint are created and polled into
//! service. Runs for the same endpoint name never overlap.
//!
//! # Architecture
//!
//! - Approval events enter through [`controller::Controller::handle`],
//!   callable by any delivery adapter (queue poller, webhook handler,
//!   test harness).
//! - All platform access goes through the [`endpoint::EndpointService`]
//!   and [`endpoint::ModelRegistry`] traits; production wires real
//!   clients, tests wire mocks or the in-memory [`simulator`].
//! - Every wait is bounded by an explicit timeout from
//!   [`config::DeployConfig`]; expiry is a terminal error, never a hang.
//!
//! # Modules
//!
//! - [`event`] - Approval events and model artifact references
//! - [`endpoint`] - Endpoint state types and platform traits
//! - [`inspector`] - Endpoint status queries
//! - [`reclaimer`] - Deletion of stale endpoints and configurations
//! - [`provisioner`] - Endpoint configuration and creation
//! - [`controller`] - The deployment state machine and outcome reports
//! - [`retry`] - Backoff-with-jitter retries for transient errors
//! - [`config`] - Deployment budgets and serving variant settings
//! - [`simulator`] - In-memory platform for tests and rehearsal runs
//! - [`error`] - Error taxonomy

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod inspector;
pub mod provisioner;
pub mod reclaimer;
pub mod retry;
pub mod simulator;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// Centralized so config defaults and test fixtures stay consistent.

/// Default budget for endpoint deletion to converge (10 minutes)
pub const DEFAULT_RECLAIM_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Default budget for a new endpoint to reach InService (20 minutes;
/// managed platforms routinely take 10-15 minutes to start an endpoint)
pub const DEFAULT_PROVISION_TIMEOUT_MS: u64 = 20 * 60 * 1000;

/// Default interval between endpoint status polls (15 seconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 15 * 1000;
