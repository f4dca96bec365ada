//! Deployment controller
//!
//! The controller composes the inspector, reclaimer, and provisioner
//! into a single idempotent transition: approval event in, outcome
//! report out. Its state machine is
//! `Idle -> Reclaiming -> Provisioning -> Done` on success, with any
//! stage error short-circuiting to `Failed`.
//!
//! Runs for the same endpoint name are strictly serialized: a second
//! event arriving while one is in flight waits until the first reaches a
//! terminal state, and queued events are processed in arrival order.
//! Events for distinct endpoint names are independent and may run
//! concurrently.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::DeployConfig;
use crate::endpoint::{EndpointDescriptor, EndpointService, ModelRegistry};
use crate::event::{ApprovalEvent, ApprovalStatus};
use crate::provisioner::provision;
use crate::reclaimer::reclaim;
use crate::Result;

/// Stage of an in-flight deployment run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeployState {
    /// No run in flight
    Idle,
    /// Clearing the existing endpoint and its configuration
    Reclaiming,
    /// Creating the new endpoint and waiting for it to come in service
    Provisioning,
    /// Run finished with the endpoint in service
    Done,
    /// Run finished with a terminal error
    Failed,
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "Idle",
            Self::Reclaiming => "Reclaiming",
            Self::Provisioning => "Provisioning",
            Self::Done => "Done",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Terminal result of a processed approval event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    /// The endpoint is in service behind the new model version
    Success,
    /// The run hit a terminal error; see `reason`
    Failure,
}

/// Deployment outcome report, emitted once per processed event.
///
/// The controller is the only component that produces these; stage
/// errors bubble up to it rather than being reported directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Logical endpoint the run targeted
    pub endpoint_name: String,
    /// Terminal result
    pub outcome: OutcomeKind,
    /// Failure reason, present only for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Wall-clock duration of the run, in milliseconds
    pub duration_ms: u64,
}

impl Outcome {
    fn success(endpoint_name: String, duration: Duration) -> Self {
        Self {
            endpoint_name,
            outcome: OutcomeKind::Success,
            reason: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    fn failure(endpoint_name: String, reason: String, duration: Duration) -> Self {
        Self {
            endpoint_name,
            outcome: OutcomeKind::Failure,
            reason: Some(reason),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Whether the run succeeded
    pub fn is_success(&self) -> bool {
        self.outcome == OutcomeKind::Success
    }
}

/// Deployment controller for a fixed logical endpoint.
///
/// The public operation is [`handle`](Controller::handle), callable by
/// any event-delivery adapter (queue poller, webhook handler, test
/// harness). Processing the same event twice converges to the same
/// terminal endpoint state: reclaiming is a no-op when the endpoint is
/// already absent, and provisioning is deterministic for a given
/// artifact.
pub struct Controller {
    service: Arc<dyn EndpointService>,
    registry: Arc<dyn ModelRegistry>,
    config: DeployConfig,
    /// Per-endpoint-name run locks. The tokio mutex is fair, so queued
    /// events acquire it in arrival order.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Controller {
    /// Create a controller over the given platform and registry clients
    pub fn new(
        service: Arc<dyn EndpointService>,
        registry: Arc<dyn ModelRegistry>,
        config: DeployConfig,
    ) -> Self {
        Self {
            service,
            registry,
            config,
            locks: DashMap::new(),
        }
    }

    /// The configuration this controller runs with
    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Process one approval event to a terminal state.
    ///
    /// Returns `None` for events that are discarded without a deployment
    /// attempt (non-approved status or malformed fields); those produce
    /// no outcome report. Otherwise returns the outcome of the run,
    /// success or failure. Terminal failures are not retried here; retry
    /// is an explicit external re-delivery of the event.
    pub async fn handle(&self, event: ApprovalEvent) -> Option<Outcome> {
        if let Err(e) = event.validate() {
            warn!(error = %e, "discarding malformed approval event");
            return None;
        }

        if event.approval_status != ApprovalStatus::Approved {
            info!(
                status = ?event.approval_status,
                model_package = %event.model_package_arn,
                "ignoring non-approved event"
            );
            return None;
        }

        let endpoint_name = self.config.endpoint_name.clone();
        let lock = self
            .locks
            .entry(endpoint_name.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        // Single-endpoint mutual exclusion: the run below executes to
        // completion before the next queued event for this name starts.
        let _guard = lock.lock().await;

        let started = Instant::now();
        match self.run(&event).await {
            Ok(descriptor) => {
                info!(
                    endpoint = %endpoint_name,
                    config = ?descriptor.endpoint_config_name,
                    state = %DeployState::Done,
                    duration_ms = started.elapsed().as_millis(),
                    "deployment complete"
                );
                Some(Outcome::success(endpoint_name, started.elapsed()))
            }
            Err(e) => {
                error!(
                    endpoint = %endpoint_name,
                    error = %e,
                    state = %DeployState::Failed,
                    duration_ms = started.elapsed().as_millis(),
                    "deployment failed"
                );
                Some(Outcome::failure(endpoint_name, e.to_string(), started.elapsed()))
            }
        }
    }

    /// Execute one deployment run: resolve, reclaim, provision.
    #[instrument(
        skip(self, event),
        fields(
            endpoint = %self.config.endpoint_name,
            model_package = %event.model_package_arn,
        )
    )]
    async fn run(&self, event: &ApprovalEvent) -> Result<EndpointDescriptor> {
        let endpoint_name = &self.config.endpoint_name;

        // Resolve first so a registry failure fails fast before any
        // endpoint state is touched.
        let artifact = self.registry.resolve(&event.model_package_arn).await?;
        debug!(
            image = %artifact.container_image_uri,
            model_data = %artifact.model_data_uri,
            "resolved model artifact"
        );

        info!(state = %DeployState::Reclaiming, "clearing existing endpoint state");
        reclaim(self.service.as_ref(), endpoint_name, &self.config).await?;

        info!(state = %DeployState::Provisioning, "installing new endpoint state");
        provision(self.service.as_ref(), endpoint_name, &artifact, &self.config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{
        EndpointObservation, EndpointStatus, MockEndpointService, MockModelRegistry,
    };
    use crate::event::ModelArtifactRef;
    use crate::Error;

    fn fast_config() -> DeployConfig {
        let mut config = DeployConfig::for_endpoint("iris-endpoint");
        config.poll_interval_ms = 1;
        config.reclaim_timeout_ms = 200;
        config.provision_timeout_ms = 200;
        config.retry.initial_delay_ms = 1;
        config.retry.max_delay_ms = 5;
        config
    }

    fn approved_event(arn: &str) -> ApprovalEvent {
        ApprovalEvent {
            model_package_group_name: "iris-models".to_string(),
            model_package_arn: arn.to_string(),
            approval_status: ApprovalStatus::Approved,
        }
    }

    fn artifact_for(arn: &str) -> ModelArtifactRef {
        ModelArtifactRef {
            model_package_arn: arn.to_string(),
            container_image_uri: "registry.example.com/xgboost-serving:1.7".to_string(),
            model_data_uri: format!("s3://artifacts/{arn}/model.tar.gz"),
        }
    }

    fn resolving_registry() -> MockModelRegistry {
        let mut registry = MockModelRegistry::new();
        registry
            .expect_resolve()
            .returning(|arn| Ok(artifact_for(arn)));
        registry
    }

    fn controller(service: MockEndpointService, registry: MockModelRegistry) -> Controller {
        Controller::new(Arc::new(service), Arc::new(registry), fast_config())
    }

    /// A rejected event is acknowledged without side effects: the mocks
    /// carry no expectations, so any platform or registry call panics.
    #[tokio::test]
    async fn rejected_event_is_discarded_without_side_effects() {
        let ctrl = controller(MockEndpointService::new(), MockModelRegistry::new());

        let mut event = approved_event("arn:mp:iris-models/3");
        event.approval_status = ApprovalStatus::Rejected;

        assert_eq!(ctrl.handle(event).await, None);
    }

    #[tokio::test]
    async fn pending_approval_event_is_discarded() {
        let ctrl = controller(MockEndpointService::new(), MockModelRegistry::new());

        let mut event = approved_event("arn:mp:iris-models/3");
        event.approval_status = ApprovalStatus::PendingManualApproval;

        assert_eq!(ctrl.handle(event).await, None);
    }

    #[tokio::test]
    async fn malformed_event_is_discarded_without_outcome() {
        let ctrl = controller(MockEndpointService::new(), MockModelRegistry::new());

        let event = approved_event("");
        assert_eq!(ctrl.handle(event).await, None);
    }

    /// First deployment: no endpoint exists, so reclaim is a no-op and
    /// provisioning creates config and endpoint exactly once.
    #[tokio::test]
    async fn first_deployment_provisions_without_reclaiming() {
        let mut service = MockEndpointService::new();
        let mut describes = 0u32;
        service.expect_describe_endpoint().returning(move |_| {
            describes += 1;
            match describes {
                // Reclaim inspection: nothing there
                1 => Ok(None),
                // Provision polling: in service
                _ => Ok(Some(EndpointObservation {
                    endpoint_config_name: "iris-endpoint-cfg-a".to_string(),
                    status: EndpointStatus::InService,
                    failure_reason: None,
                })),
            }
        });
        service.expect_create_config().times(1).returning(|_| Ok(()));
        service
            .expect_create_endpoint()
            .times(1)
            .returning(|_, _| Ok(()));
        // No delete expectations: reclaim must be a no-op.

        let ctrl = controller(service, resolving_registry());
        let outcome = ctrl
            .handle(approved_event("arn:mp:iris-models/3"))
            .await
            .expect("approved event yields an outcome");

        assert!(outcome.is_success());
        assert_eq!(outcome.endpoint_name, "iris-endpoint");
        assert_eq!(outcome.reason, None);
    }

    /// Permission failures surface immediately as a failed outcome; no
    /// resources are created or deleted.
    #[tokio::test]
    async fn permission_error_fails_run_without_mutation() {
        let mut service = MockEndpointService::new();
        service
            .expect_describe_endpoint()
            .times(1)
            .returning(|_| Err(Error::permission("not authorized")));

        let ctrl = controller(service, resolving_registry());
        let outcome = ctrl
            .handle(approved_event("arn:mp:iris-models/3"))
            .await
            .unwrap();

        assert_eq!(outcome.outcome, OutcomeKind::Failure);
        assert!(outcome.reason.unwrap().contains("permission denied"));
    }

    #[tokio::test]
    async fn registry_failure_fails_run_before_touching_endpoint_state() {
        let mut registry = MockModelRegistry::new();
        registry
            .expect_resolve()
            .returning(|_| Err(Error::registry("model package not found")));
        // Endpoint service mock has no expectations: the run must fail
        // before any platform call.
        let ctrl = controller(MockEndpointService::new(), registry);

        let outcome = ctrl
            .handle(approved_event("arn:mp:iris-models/404"))
            .await
            .unwrap();
        assert_eq!(outcome.outcome, OutcomeKind::Failure);
        assert!(outcome.reason.unwrap().contains("model registry"));
    }

    #[tokio::test]
    async fn provision_failure_reason_reaches_outcome_report() {
        let mut service = MockEndpointService::new();
        let mut describes = 0u32;
        service.expect_describe_endpoint().returning(move |_| {
            describes += 1;
            match describes {
                1 => Ok(None),
                _ => Ok(Some(EndpointObservation {
                    endpoint_config_name: "iris-endpoint-cfg-a".to_string(),
                    status: EndpointStatus::Failed,
                    failure_reason: Some("InsufficientInstanceCapacity".to_string()),
                })),
            }
        });
        service.expect_create_config().returning(|_| Ok(()));
        service.expect_create_endpoint().returning(|_, _| Ok(()));

        let ctrl = controller(service, resolving_registry());
        let outcome = ctrl
            .handle(approved_event("arn:mp:iris-models/3"))
            .await
            .unwrap();

        assert_eq!(outcome.outcome, OutcomeKind::Failure);
        assert!(outcome
            .reason
            .unwrap()
            .contains("InsufficientInstanceCapacity"));
    }

    #[test]
    fn outcome_report_serializes_for_observability_consumers() {
        let outcome = Outcome::failure(
            "iris-endpoint".to_string(),
            "endpoint 'iris-endpoint' did not reach InService within 200ms".to_string(),
            Duration::from_millis(204),
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["endpoint_name"], "iris-endpoint");
        assert_eq!(json["outcome"], "FAILURE");
        assert_eq!(json["duration_ms"], 204);

        let success = Outcome::success("iris-endpoint".to_string(), Duration::from_millis(12));
        let json = serde_json::to_value(&success).unwrap();
        assert_eq!(json["outcome"], "SUCCESS");
        // reason is omitted entirely on success
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn deploy_states_render_for_logging() {
        assert_eq!(DeployState::Idle.to_string(), "Idle");
        assert_eq!(DeployState::Reclaiming.to_string(), "Reclaiming");
        assert_eq!(DeployState::Provisioning.to_string(), "Provisioning");
        assert_eq!(DeployState::Done.to_string(), "Done");
        assert_eq!(DeployState::Failed.to_string(), "Failed");
    }
}
