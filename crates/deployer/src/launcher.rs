//! Instance launching.

use std::sync::Arc;

use hzdeploy_cloud::{
    CloudProviderError, ComputeProvider, Instance, LaunchRequest, Reservation, ServiceError,
};
use tracing::info;

use crate::backoff::{self, BackoffConfig};
use crate::config::PlacementConfig;
use crate::error::{DeployError, Result};

/// Launches instances with a fixed placement and waits for them to be
/// addressable.
#[derive(Clone)]
pub struct InstanceLauncher {
    compute: Arc<dyn ComputeProvider>,
    placement: PlacementConfig,
    backoff: BackoffConfig,
}

impl InstanceLauncher {
    /// Create a launcher.
    pub fn new(
        compute: Arc<dyn ComputeProvider>,
        placement: PlacementConfig,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            compute,
            placement,
            backoff,
        }
    }

    fn request(&self, count: u32, instance_type: &str, image_id: &str) -> LaunchRequest {
        LaunchRequest {
            image_id: image_id.to_string(),
            instance_type: instance_type.to_string(),
            count,
            key_pair: self.placement.key_pair.clone(),
            security_groups: self.placement.security_groups.clone(),
            zone: self.placement.zone.clone(),
        }
    }

    /// Submit a launch request for `count` instances without waiting on them.
    ///
    /// # Errors
    /// Returns [`DeployError::InvalidRequest`] for `count == 0`, and
    /// [`DeployError::ProvisioningFailure`] if the provider rejects the
    /// request or returns no instances. Launch failures are never retried.
    pub async fn submit(
        &self,
        count: u32,
        instance_type: &str,
        image_id: &str,
    ) -> Result<Reservation> {
        if count == 0 {
            return Err(DeployError::InvalidRequest(
                "cannot launch zero instances".to_string(),
            ));
        }

        info!(
            count,
            image_id,
            instance_type,
            key_pair = %self.placement.key_pair,
            security_groups = ?self.placement.security_groups,
            "Launching instances"
        );

        let reservation = self
            .compute
            .create_instances(&self.request(count, instance_type, image_id))
            .await
            .map_err(|source| DeployError::ProvisioningFailure {
                operation: "launch",
                source,
            })?;

        if reservation.instance_ids.is_empty() {
            return Err(DeployError::ProvisioningFailure {
                operation: "launch",
                source: CloudProviderError::Service(ServiceError {
                    status: 200,
                    code: "EmptyReservation".to_string(),
                    message: "launch request returned no instances".to_string(),
                    request_id: Some(reservation.request_id),
                }),
            });
        }

        info!(
            request_id = %reservation.request_id,
            instances = ?reservation.instance_ids,
            "Launch request accepted"
        );
        Ok(reservation)
    }

    /// Wait until `instance_id` has a private address.
    ///
    /// An id the provider does not know yet is treated as not ready.
    ///
    /// # Errors
    /// Returns [`DeployError::ProvisioningTimeout`] if the poll bounds run out,
    /// or [`DeployError::ProvisioningFailure`] if a describe call fails.
    pub async fn wait_addressable(&self, instance_id: &str) -> Result<Instance> {
        let resource = format!("instance {instance_id}");
        backoff::poll_until(
            &self.backoff,
            &resource,
            || async move {
                match self.compute.describe_instance(instance_id).await {
                    Ok(instance) => Ok(Some(instance)),
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(source) => Err(DeployError::ProvisioningFailure {
                        operation: "describe",
                        source,
                    }),
                }
            },
            Instance::is_addressable,
        )
        .await
    }

    /// Launch `count` instances and return the first one once it is
    /// addressable. The other `count - 1` instances are created but not
    /// tracked.
    ///
    /// # Errors
    /// See [`submit`](Self::submit) and [`wait_addressable`](Self::wait_addressable).
    pub async fn launch(&self, count: u32, instance_type: &str, image_id: &str) -> Result<Instance> {
        let reservation = self.submit(count, instance_type, image_id).await?;
        let first = &reservation.instance_ids[0];

        let instance = self.wait_addressable(first).await?;
        info!(
            instance_id = %instance.id,
            public_address = instance.public_address.as_deref().unwrap_or("-"),
            "Instance addressable"
        );
        Ok(instance)
    }
}
