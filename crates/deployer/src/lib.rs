//! Hazelcast cluster deployment on EC2.
//!
//! Brings up a master instance, publishes a membership document naming the
//! master's private address to S3, then launches the workers that read it.
//! Also tears down and reboots whatever is running.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hzdeploy::{DeployConfig, Orchestrator};
//! use hzdeploy_cloud::aws::{Aws, Credentials};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DeployConfig::default();
//!     let aws = Arc::new(Aws::new(Credentials::new("AKID", "SECRET"), &config.region)?);
//!     let mut orchestrator = Orchestrator::new(config, aws.clone(), aws);
//!
//!     let deployment = orchestrator.deploy(3, "m1.small", "ami-799f7010").await?;
//!     println!("master at {:?}", deployment.master.private_address());
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backoff;
pub mod config;
pub mod error;
pub mod launcher;
pub mod membership;
pub mod orchestrator;
pub mod publisher;

pub use backoff::{poll_until, BackoffConfig};
pub use config::{Arch, DeployConfig};
pub use error::{DeployError, Result};
pub use launcher::InstanceLauncher;
pub use membership::{render_config, MembershipConfig};
pub use orchestrator::{DeployPhase, Deployment, Orchestrator};
pub use publisher::ArtifactPublisher;
