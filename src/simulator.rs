//! In-memory endpoint platform simulator
//!
//! Implements [`EndpointService`] and [`ModelRegistry`] against a local
//! state table instead of a real managed-endpoint platform. Used by the
//! integration tests and by the binary's rehearsal mode to exercise the
//! full deployment flow without cloud credentials.
//!
//! Endpoint convergence is poll-driven rather than timer-driven: each
//! `describe_endpoint` call advances the simulated lifecycle by one
//! step, which keeps tests deterministic regardless of poll intervals.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::endpoint::{
    EndpointConfigSpec, EndpointObservation, EndpointService, EndpointStatus, ModelRegistry,
};
use crate::event::ModelArtifactRef;
use crate::{Error, Result};

/// A mutating platform call recorded by the simulator.
///
/// Describe calls are not recorded; tests assert on the mutation
/// sequence, where ordering and overlap actually matter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimCall {
    /// `create_config` with the given configuration name
    CreateConfig(String),
    /// `create_endpoint`
    CreateEndpoint {
        /// Endpoint being created
        endpoint_name: String,
        /// Configuration backing it
        config_name: String,
    },
    /// `delete_endpoint` with the given endpoint name
    DeleteEndpoint(String),
    /// `delete_config` with the given configuration name
    DeleteConfig(String),
}

#[derive(Clone, Debug)]
struct SimEndpoint {
    config_name: String,
    status: EndpointStatus,
    /// Describe calls remaining before the current transition completes.
    /// `u32::MAX` means the transition never completes.
    polls_remaining: u32,
    fail_reason: Option<String>,
}

#[derive(Default)]
struct SimState {
    endpoints: HashMap<String, SimEndpoint>,
    configs: HashMap<String, EndpointConfigSpec>,
    calls: Vec<SimCall>,
    fail_next_create: Option<String>,
    create_polls: u32,
    delete_polls: u32,
}

/// Simulated managed-endpoint platform.
///
/// By default a created endpoint reaches `InService` after one
/// intermediate `Creating` observation, and a deleted endpoint
/// disappears after one `Deleting` observation.
pub struct SimulatedEndpointService {
    state: Mutex<SimState>,
}

impl Default for SimulatedEndpointService {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEndpointService {
    /// Fresh simulator with no endpoints or configurations
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                create_polls: 1,
                delete_polls: 1,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // Mutex poisoning only happens if a panic occurred mid-call;
        // tests are already failing at that point.
        self.state.lock().unwrap()
    }

    /// Make the next created endpoint converge to `Failed` with the
    /// given platform failure reason.
    pub fn fail_next_create(&self, reason: impl Into<String>) {
        self.lock().fail_next_create = Some(reason.into());
    }

    /// Make created endpoints stay in `Creating` forever
    pub fn never_finish_create(&self) {
        self.lock().create_polls = u32::MAX;
    }

    /// Make deleted endpoints stay in `Deleting` forever
    pub fn never_finish_delete(&self) {
        self.lock().delete_polls = u32::MAX;
    }

    /// All mutating calls issued so far, in order
    pub fn calls(&self) -> Vec<SimCall> {
        self.lock().calls.clone()
    }

    /// Number of endpoints currently present (any status)
    pub fn endpoint_count(&self) -> usize {
        self.lock().endpoints.len()
    }

    /// Current status and backing configuration of an endpoint
    pub fn endpoint(&self, endpoint_name: &str) -> Option<(EndpointStatus, EndpointConfigSpec)> {
        let state = self.lock();
        let endpoint = state.endpoints.get(endpoint_name)?;
        let config = state.configs.get(&endpoint.config_name)?.clone();
        Some((endpoint.status, config))
    }

    /// Names of the configurations currently present
    pub fn config_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().configs.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl EndpointService for SimulatedEndpointService {
    async fn create_config(&self, spec: &EndpointConfigSpec) -> Result<()> {
        let mut state = self.lock();
        if state.configs.contains_key(&spec.config_name) {
            return Err(Error::transient(format!(
                "endpoint config '{}' already exists",
                spec.config_name
            )));
        }
        state
            .calls
            .push(SimCall::CreateConfig(spec.config_name.clone()));
        state.configs.insert(spec.config_name.clone(), spec.clone());
        Ok(())
    }

    async fn delete_config(&self, config_name: &str) -> Result<()> {
        let mut state = self.lock();
        state
            .calls
            .push(SimCall::DeleteConfig(config_name.to_string()));
        // Deleting a missing config is tolerated, matching the platform
        // contract on the trait.
        state.configs.remove(config_name);
        Ok(())
    }

    async fn create_endpoint(&self, endpoint_name: &str, config_name: &str) -> Result<()> {
        let mut state = self.lock();
        if state.endpoints.contains_key(endpoint_name) {
            return Err(Error::transient(format!(
                "endpoint '{endpoint_name}' already exists"
            )));
        }
        if !state.configs.contains_key(config_name) {
            return Err(Error::transient(format!(
                "endpoint config '{config_name}' does not exist"
            )));
        }
        state.calls.push(SimCall::CreateEndpoint {
            endpoint_name: endpoint_name.to_string(),
            config_name: config_name.to_string(),
        });
        let fail_reason = state.fail_next_create.take();
        let polls_remaining = state.create_polls;
        state.endpoints.insert(
            endpoint_name.to_string(),
            SimEndpoint {
                config_name: config_name.to_string(),
                status: EndpointStatus::Creating,
                polls_remaining,
                fail_reason,
            },
        );
        Ok(())
    }

    async fn delete_endpoint(&self, endpoint_name: &str) -> Result<()> {
        let mut state = self.lock();
        state
            .calls
            .push(SimCall::DeleteEndpoint(endpoint_name.to_string()));
        let delete_polls = state.delete_polls;
        match state.endpoints.get_mut(endpoint_name) {
            Some(endpoint) => {
                endpoint.status = EndpointStatus::Deleting;
                endpoint.polls_remaining = delete_polls;
                Ok(())
            }
            None => Err(Error::transient(format!(
                "endpoint '{endpoint_name}' does not exist"
            ))),
        }
    }

    async fn describe_endpoint(&self, endpoint_name: &str) -> Result<Option<EndpointObservation>> {
        let mut state = self.lock();
        let mut deletion_complete = false;

        let observation = match state.endpoints.get_mut(endpoint_name) {
            None => None,
            Some(endpoint) => {
                match endpoint.status {
                    EndpointStatus::Creating if endpoint.polls_remaining == 0 => {
                        endpoint.status = match endpoint.fail_reason {
                            Some(_) => EndpointStatus::Failed,
                            None => EndpointStatus::InService,
                        };
                    }
                    EndpointStatus::Deleting if endpoint.polls_remaining == 0 => {
                        deletion_complete = true;
                    }
                    EndpointStatus::Creating | EndpointStatus::Deleting
                        if endpoint.polls_remaining != u32::MAX =>
                    {
                        endpoint.polls_remaining -= 1;
                    }
                    _ => {}
                }

                if deletion_complete {
                    None
                } else {
                    Some(EndpointObservation {
                        endpoint_config_name: endpoint.config_name.clone(),
                        status: endpoint.status,
                        failure_reason: endpoint.fail_reason.clone(),
                    })
                }
            }
        };

        if deletion_complete {
            state.endpoints.remove(endpoint_name);
        }
        Ok(observation)
    }
}

struct RegisteredPackage {
    group_name: String,
    arn: String,
    artifact: ModelArtifactRef,
}

/// In-memory model registry.
///
/// Strict by default: resolving an unregistered package fails. The
/// permissive variant derives a plausible artifact from the package
/// identifier instead, which is what the rehearsal binary uses so any
/// event can be fed through the flow.
pub struct InMemoryRegistry {
    packages: Mutex<Vec<RegisteredPackage>>,
    permissive: bool,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    /// Strict registry: only registered packages resolve
    pub fn new() -> Self {
        Self {
            packages: Mutex::new(Vec::new()),
            permissive: false,
        }
    }

    /// Permissive registry: unknown packages resolve to a derived artifact
    pub fn permissive() -> Self {
        Self {
            packages: Mutex::new(Vec::new()),
            permissive: true,
        }
    }

    /// Register an approved package version. Later registrations in the
    /// same group are considered newer.
    pub fn register(
        &self,
        group_name: impl Into<String>,
        arn: impl Into<String>,
        artifact: ModelArtifactRef,
    ) {
        self.packages.lock().unwrap().push(RegisteredPackage {
            group_name: group_name.into(),
            arn: arn.into(),
            artifact,
        });
    }
}

#[async_trait]
impl ModelRegistry for InMemoryRegistry {
    async fn resolve(&self, model_package_arn: &str) -> Result<ModelArtifactRef> {
        let packages = self.packages.lock().unwrap();
        if let Some(package) = packages.iter().find(|p| p.arn == model_package_arn) {
            return Ok(package.artifact.clone());
        }
        drop(packages);

        if self.permissive {
            Ok(ModelArtifactRef {
                model_package_arn: model_package_arn.to_string(),
                container_image_uri: "registry.example.com/inference-serving:latest".to_string(),
                model_data_uri: format!("s3://model-artifacts/{model_package_arn}/model.tar.gz"),
            })
        } else {
            Err(Error::registry(format!(
                "model package '{model_package_arn}' not found"
            )))
        }
    }

    async fn latest_approved(&self, group_name: &str) -> Result<Option<String>> {
        let packages = self.packages.lock().unwrap();
        Ok(packages
            .iter()
            .rev()
            .find(|p| p.group_name == group_name)
            .map(|p| p.arn.clone()))
    }
}
