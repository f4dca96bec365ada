//! Stale resource reclaimer
//!
//! Endpoint configurations are immutable platform objects, so a new
//! deployment cannot reuse the previous one. Before provisioning, the
//! controller reclaims the existing endpoint: delete it, wait for the
//! deletion to converge, then delete the orphaned configuration.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DeployConfig;
use crate::endpoint::{EndpointService, EndpointStatus};
use crate::inspector::inspect;
use crate::retry::retry_transient;
use crate::{Error, Result};

/// Delete the existing endpoint and its configuration, waiting for the
/// deletion to converge.
///
/// A no-op when no endpoint with the name exists. An endpoint already in
/// `Deleting` is awaited without issuing another delete, so a create is
/// never pending behind an unfinished deletion. Fails with
/// [`Error::ReclaimTimeout`] if deletion does not converge within
/// `config.reclaim_timeout()`.
pub async fn reclaim(
    service: &dyn EndpointService,
    endpoint_name: &str,
    config: &DeployConfig,
) -> Result<()> {
    let current = inspect(service, endpoint_name, &config.retry).await?;

    if current.is_absent() {
        debug!(endpoint = %endpoint_name, "no existing endpoint, nothing to reclaim");
        return Ok(());
    }

    let stale_config = current.endpoint_config_name.clone();

    if current.status != EndpointStatus::Deleting {
        info!(
            endpoint = %endpoint_name,
            status = ?current.status,
            "deleting existing endpoint"
        );
        retry_transient(&config.retry, "delete_endpoint", || {
            service.delete_endpoint(endpoint_name)
        })
        .await?;
    } else {
        debug!(endpoint = %endpoint_name, "endpoint already deleting, awaiting convergence");
    }

    let started = Instant::now();
    loop {
        let observed = inspect(service, endpoint_name, &config.retry).await?;
        if observed.is_absent() {
            break;
        }
        if started.elapsed() >= config.reclaim_timeout() {
            return Err(Error::ReclaimTimeout {
                endpoint_name: endpoint_name.to_string(),
                waited: started.elapsed(),
            });
        }
        tokio::time::sleep(config.poll_interval()).await;
    }

    info!(endpoint = %endpoint_name, "endpoint deleted");

    // The orphaned configuration is best-effort: the endpoint is already
    // gone, and a leaked config does not block the next deployment.
    if let Some(config_name) = stale_config {
        match retry_transient(&config.retry, "delete_config", || {
            service.delete_config(&config_name)
        })
        .await
        {
            Ok(()) => debug!(config = %config_name, "stale endpoint config deleted"),
            Err(e) => warn!(
                config = %config_name,
                error = %e,
                "failed to delete stale endpoint config"
            ),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{EndpointObservation, MockEndpointService};

    fn fast_config() -> DeployConfig {
        let mut config = DeployConfig::for_endpoint("iris-endpoint");
        config.poll_interval_ms = 1;
        config.reclaim_timeout_ms = 200;
        config.retry.initial_delay_ms = 1;
        config.retry.max_delay_ms = 5;
        config
    }

    fn in_service(config_name: &str) -> EndpointObservation {
        EndpointObservation {
            endpoint_config_name: config_name.to_string(),
            status: EndpointStatus::InService,
            failure_reason: None,
        }
    }

    #[tokio::test]
    async fn reclaim_is_noop_when_endpoint_absent() {
        let mut service = MockEndpointService::new();
        service
            .expect_describe_endpoint()
            .times(1)
            .returning(|_| Ok(None));
        // No delete expectations: any delete call fails the test.

        reclaim(&service, "iris-endpoint", &fast_config())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reclaim_deletes_endpoint_then_config() {
        let mut service = MockEndpointService::new();
        let mut describes = 0u32;
        service.expect_describe_endpoint().returning(move |_| {
            describes += 1;
            match describes {
                1 => Ok(Some(in_service("iris-endpoint-cfg-old"))),
                _ => Ok(None),
            }
        });
        service
            .expect_delete_endpoint()
            .times(1)
            .returning(|_| Ok(()));
        service
            .expect_delete_config()
            .withf(|name| name == "iris-endpoint-cfg-old")
            .times(1)
            .returning(|_| Ok(()));

        reclaim(&service, "iris-endpoint", &fast_config())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reclaim_awaits_endpoint_already_deleting_without_second_delete() {
        let mut service = MockEndpointService::new();
        let mut describes = 0u32;
        service.expect_describe_endpoint().returning(move |_| {
            describes += 1;
            if describes <= 2 {
                Ok(Some(EndpointObservation {
                    endpoint_config_name: "iris-endpoint-cfg-old".to_string(),
                    status: EndpointStatus::Deleting,
                    failure_reason: None,
                }))
            } else {
                Ok(None)
            }
        });
        // delete_endpoint must not be called for an endpoint already deleting
        service.expect_delete_config().returning(|_| Ok(()));

        reclaim(&service, "iris-endpoint", &fast_config())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reclaim_times_out_when_deletion_never_converges() {
        let mut service = MockEndpointService::new();
        service.expect_describe_endpoint().returning(|_| {
            Ok(Some(EndpointObservation {
                endpoint_config_name: "iris-endpoint-cfg-old".to_string(),
                status: EndpointStatus::Deleting,
                failure_reason: None,
            }))
        });

        let err = reclaim(&service, "iris-endpoint", &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReclaimTimeout { .. }));
    }

    #[tokio::test]
    async fn reclaim_succeeds_even_if_config_delete_fails() {
        let mut service = MockEndpointService::new();
        let mut describes = 0u32;
        service.expect_describe_endpoint().returning(move |_| {
            describes += 1;
            match describes {
                1 => Ok(Some(in_service("iris-endpoint-cfg-old"))),
                _ => Ok(None),
            }
        });
        service.expect_delete_endpoint().returning(|_| Ok(()));
        service
            .expect_delete_config()
            .returning(|_| Err(Error::permission("no DeleteEndpointConfig")));

        // The endpoint itself is gone; a leaked config is logged, not fatal.
        reclaim(&service, "iris-endpoint", &fast_config())
            .await
            .unwrap();
    }
}
