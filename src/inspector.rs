//! Endpoint state inspector
//!
//! Translates the platform's describe call into an [`EndpointDescriptor`]
//! value. A missing endpoint maps to [`EndpointStatus::None`] rather than
//! an error, since that is the expected state before first deployment.

use tracing::debug;

use crate::endpoint::{EndpointDescriptor, EndpointService, EndpointStatus};
use crate::retry::{retry_transient, RetryConfig};
use crate::Result;

/// Query the current status of the named endpoint.
///
/// Transient query errors are retried with backoff per `retry`;
/// permission errors surface immediately.
pub async fn inspect(
    service: &dyn EndpointService,
    endpoint_name: &str,
    retry: &RetryConfig,
) -> Result<EndpointDescriptor> {
    let observation = retry_transient(retry, "describe_endpoint", || {
        service.describe_endpoint(endpoint_name)
    })
    .await?;

    let descriptor = match observation {
        None => EndpointDescriptor::absent(endpoint_name),
        Some(obs) => EndpointDescriptor {
            endpoint_name: endpoint_name.to_string(),
            endpoint_config_name: Some(obs.endpoint_config_name),
            status: obs.status,
        },
    };

    debug!(
        endpoint = %endpoint_name,
        status = ?descriptor.status,
        "inspected endpoint"
    );
    Ok(descriptor)
}
