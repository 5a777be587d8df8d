//! Cloud provider integrations for hzdeploy.
//!
//! This crate defines the narrow provider seam the deployer needs and an
//! AWS implementation of it:
//!
//! - **Compute** - EC2 instances (run, describe, list, terminate, reboot)
//! - **Object storage** - S3 objects (put, get, delete)
//!
//! The deployer only ever talks to [`ComputeProvider`] and [`ObjectStore`],
//! so tests can swap in an in-memory fake and the binary can construct the
//! [`aws::Aws`] client once and inject it.

pub mod providers;

pub use providers::{
    aws, ComputeProvider, CloudProviderError, Instance, InstanceState, LaunchRequest,
    ObjectStore, Reservation, ServiceError,
};
