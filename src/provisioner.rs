//! Endpoint provisioner
//!
//! Creates a uniquely named endpoint configuration pointing at the
//! resolved model artifact, creates the endpoint from it, and polls until
//! the endpoint is in service. There is deliberately no update path: the
//! controller always reclaims before provisioning, so the provisioner
//! only ever observes an absent endpoint and creation is the single code
//! path.

use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::DeployConfig;
use crate::endpoint::{
    EndpointConfigSpec, EndpointDescriptor, EndpointService, EndpointStatus,
};
use crate::event::ModelArtifactRef;
use crate::retry::retry_transient;
use crate::{Error, Result};

/// Generate a configuration name unique to this deployment attempt.
///
/// Configurations are immutable and deletion of old ones may lag, so a
/// reclaimed name must never be reused. The epoch timestamp keeps names
/// human-sortable; the random suffix disambiguates attempts within the
/// same second.
fn unique_config_name(endpoint_name: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-cfg-{}-{}", endpoint_name, timestamp, &suffix[..8])
}

/// Create a new endpoint backed by `artifact` and wait for it to come in
/// service.
///
/// Fails with [`Error::ProvisionFailed`] if the platform reports the
/// endpoint as failed (the platform's failure reason is attached), or
/// with [`Error::ProvisionTimeout`] if the endpoint does not reach
/// `InService` within `config.provision_timeout()`.
pub async fn provision(
    service: &dyn EndpointService,
    endpoint_name: &str,
    artifact: &ModelArtifactRef,
    config: &DeployConfig,
) -> Result<EndpointDescriptor> {
    let config_name = unique_config_name(endpoint_name);
    let spec = EndpointConfigSpec {
        config_name: config_name.clone(),
        artifact: artifact.clone(),
        variant: config.variant.clone(),
    };

    info!(
        endpoint = %endpoint_name,
        config = %config_name,
        model_package = %artifact.model_package_arn,
        "creating endpoint configuration"
    );
    retry_transient(&config.retry, "create_config", || {
        service.create_config(&spec)
    })
    .await?;

    info!(endpoint = %endpoint_name, config = %config_name, "creating endpoint");
    retry_transient(&config.retry, "create_endpoint", || {
        service.create_endpoint(endpoint_name, &config_name)
    })
    .await?;

    let started = Instant::now();
    loop {
        let observation = retry_transient(&config.retry, "describe_endpoint", || {
            service.describe_endpoint(endpoint_name)
        })
        .await?;

        match observation {
            Some(obs) if obs.status == EndpointStatus::InService => {
                info!(
                    endpoint = %endpoint_name,
                    config = %config_name,
                    waited_ms = started.elapsed().as_millis(),
                    "endpoint in service"
                );
                return Ok(EndpointDescriptor {
                    endpoint_name: endpoint_name.to_string(),
                    endpoint_config_name: Some(obs.endpoint_config_name),
                    status: obs.status,
                });
            }
            Some(obs) if obs.status == EndpointStatus::Failed => {
                return Err(Error::ProvisionFailed {
                    endpoint_name: endpoint_name.to_string(),
                    reason: obs
                        .failure_reason
                        .unwrap_or_else(|| "no failure reason reported".to_string()),
                });
            }
            Some(obs) => {
                debug!(endpoint = %endpoint_name, status = ?obs.status, "endpoint not ready yet");
            }
            // The platform may briefly not list a just-created endpoint.
            None => {
                debug!(endpoint = %endpoint_name, "endpoint not visible yet");
            }
        }

        if started.elapsed() >= config.provision_timeout() {
            return Err(Error::ProvisionTimeout {
                endpoint_name: endpoint_name.to_string(),
                waited: started.elapsed(),
            });
        }
        tokio::time::sleep(config.poll_interval()).await;
    }
}
