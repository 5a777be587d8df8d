//! Cluster orchestration.
//!
//! The deploy sequence is strictly ordered: the package is published, the
//! master is launched and waited on, its private address is baked into the
//! membership document, the document is published, and only then are the
//! workers launched. Workers find the master by reading that document, so
//! nothing about them needs to be tracked beyond their ids.
//!
//! Teardown and reboot are independent entry points. Cluster membership is
//! never remembered between runs; it is rediscovered by listing the
//! provider's running instances.

use std::sync::Arc;

use hzdeploy_cloud::{ComputeProvider, Instance, InstanceState, ObjectStore};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::launcher::InstanceLauncher;
use crate::publisher::{ArtifactPublisher, APPLICATION_ZIP, TEXT_PLAIN};

/// Where the orchestrator is in a deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployPhase {
    /// Not running a deploy.
    Idle,
    /// Uploading the deployable package.
    PublishingPackage,
    /// Launching the master and waiting for its address.
    LaunchingMaster,
    /// Rendering the membership document.
    GeneratingConfig,
    /// Uploading the membership document.
    PublishingConfig,
    /// Launching the workers.
    LaunchingWorkers,
}

impl DeployPhase {
    /// Get human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::PublishingPackage => "Publishing package",
            Self::LaunchingMaster => "Launching master",
            Self::GeneratingConfig => "Generating membership config",
            Self::PublishingConfig => "Publishing membership config",
            Self::LaunchingWorkers => "Launching workers",
        }
    }
}

impl std::fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Outcome of a successful launch-and-configure sequence.
#[derive(Debug, Clone, Serialize)]
pub struct Deployment {
    /// The master, as resolved when its address appeared.
    pub master: Instance,
    /// The membership document that was published.
    pub config: String,
    /// Ids of the worker instances, if any were requested.
    pub worker_ids: Vec<String>,
    /// Provider request id of the worker launch.
    pub worker_request_id: Option<String>,
}

/// Sequences package publication, master launch, config publication and
/// worker launch; tears the cluster down or reboots it.
pub struct Orchestrator {
    config: DeployConfig,
    compute: Arc<dyn ComputeProvider>,
    launcher: InstanceLauncher,
    publisher: ArtifactPublisher,
    phase: DeployPhase,
}

impl Orchestrator {
    /// Build an orchestrator around injected provider clients.
    pub fn new(
        config: DeployConfig,
        compute: Arc<dyn ComputeProvider>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let launcher = InstanceLauncher::new(
            Arc::clone(&compute),
            config.placement.clone(),
            config.poll.clone(),
        );
        let publisher = ArtifactPublisher::new(store, config.artifacts.bucket.clone());

        Self {
            config,
            compute,
            launcher,
            publisher,
            phase: DeployPhase::Idle,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> DeployPhase {
        self.phase
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Artifact publisher in use.
    #[must_use]
    pub fn publisher(&self) -> &ArtifactPublisher {
        &self.publisher
    }

    fn enter(&mut self, phase: DeployPhase) {
        info!(from = %self.phase, to = %phase, "Deploy phase");
        self.phase = phase;
    }

    /// Publish the deployable package from its local path.
    ///
    /// # Errors
    /// Returns [`DeployError::Io`] if the package cannot be read, or
    /// [`DeployError::PublishFailure`] if storage rejects it.
    pub async fn restore_package(&mut self) -> Result<()> {
        self.enter(DeployPhase::PublishingPackage);
        let result = self.publish_package().await;
        self.enter(DeployPhase::Idle);
        result
    }

    async fn publish_package(&self) -> Result<()> {
        let artifacts = &self.config.artifacts;
        info!(bucket = %artifacts.bucket, key = %artifacts.package_key, "Storing package");
        self.publisher
            .publish_file(&artifacts.package_key, &artifacts.package_path, APPLICATION_ZIP)
            .await
    }

    /// Launch the master, publish a membership document naming it, then
    /// launch `count - 1` workers.
    ///
    /// Any failure aborts the remaining steps.
    ///
    /// # Errors
    /// Returns [`DeployError::InvalidRequest`] for `count == 0`; otherwise the
    /// first launch, poll or publish failure.
    pub async fn launch_and_store_config(
        &mut self,
        count: u32,
        instance_type: &str,
        image_id: &str,
    ) -> Result<Deployment> {
        if count == 0 {
            return Err(DeployError::InvalidRequest(
                "a cluster needs at least one instance".to_string(),
            ));
        }

        let result = self.run_launch_sequence(count, instance_type, image_id).await;
        if let Err(e) = &result {
            warn!(phase = %self.phase, error = %e, "Deploy aborted");
        }
        self.enter(DeployPhase::Idle);
        result
    }

    async fn run_launch_sequence(
        &mut self,
        count: u32,
        instance_type: &str,
        image_id: &str,
    ) -> Result<Deployment> {
        self.enter(DeployPhase::LaunchingMaster);
        let master = self.launcher.launch(1, instance_type, image_id).await?;
        let master_address = master.private_address().ok_or_else(|| {
            DeployError::InvalidRequest(format!("master {} has no private address", master.id))
        })?;

        self.enter(DeployPhase::GeneratingConfig);
        let config = self.config.membership.render(master_address);

        self.enter(DeployPhase::PublishingConfig);
        info!(master_address, "Storing membership config");
        self.publisher
            .publish(
                &self.config.artifacts.config_key,
                config.clone().into_bytes(),
                TEXT_PLAIN,
            )
            .await?;

        let (worker_ids, worker_request_id) = if count > 1 {
            self.enter(DeployPhase::LaunchingWorkers);
            let reservation = self
                .launcher
                .submit(count - 1, instance_type, image_id)
                .await?;
            (reservation.instance_ids, Some(reservation.request_id))
        } else {
            (Vec::new(), None)
        };

        info!(
            master = %master.id,
            workers = worker_ids.len(),
            "Cluster launched"
        );

        Ok(Deployment {
            master,
            config,
            worker_ids,
            worker_request_id,
        })
    }

    /// Publish the package, then launch and configure the cluster.
    ///
    /// # Errors
    /// See [`restore_package`](Self::restore_package) and
    /// [`launch_and_store_config`](Self::launch_and_store_config).
    pub async fn deploy(
        &mut self,
        count: u32,
        instance_type: &str,
        image_id: &str,
    ) -> Result<Deployment> {
        self.restore_package().await?;
        self.launch_and_store_config(count, instance_type, image_id)
            .await
    }

    /// List every instance the provider reports as running.
    ///
    /// # Errors
    /// Returns [`DeployError::ProvisioningFailure`] if the listing fails.
    pub async fn running_instances(&self) -> Result<Vec<Instance>> {
        self.compute
            .list_instances(Some(InstanceState::Running))
            .await
            .map_err(|source| DeployError::ProvisioningFailure {
                operation: "list",
                source,
            })
    }

    async fn running_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .running_instances()
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect())
    }

    /// Terminate every running instance. Returns the terminated ids.
    ///
    /// With nothing running no termination request is sent.
    ///
    /// # Errors
    /// Returns [`DeployError::ProvisioningFailure`] if listing or termination
    /// fails.
    pub async fn terminate(&mut self) -> Result<Vec<String>> {
        let ids = self.running_ids().await?;
        if ids.is_empty() {
            info!("No running instances to terminate");
            return Ok(ids);
        }

        info!(instances = ?ids, "Terminating running instances");
        self.compute
            .terminate_instances(&ids)
            .await
            .map_err(|source| DeployError::ProvisioningFailure {
                operation: "terminate",
                source,
            })?;
        Ok(ids)
    }

    /// Reboot every running instance. Returns the rebooted ids.
    ///
    /// With nothing running no reboot request is sent.
    ///
    /// # Errors
    /// Returns [`DeployError::ProvisioningFailure`] if listing or reboot fails.
    pub async fn reboot(&mut self) -> Result<Vec<String>> {
        let ids = self.running_ids().await?;
        if ids.is_empty() {
            info!("No running instances to reboot");
            return Ok(ids);
        }

        info!(instances = ?ids, "Rebooting running instances");
        self.compute
            .reboot_instances(&ids)
            .await
            .map_err(|source| DeployError::ProvisioningFailure {
                operation: "reboot",
                source,
            })?;
        Ok(ids)
    }
}
