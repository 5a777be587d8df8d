//! Cloud provider abstractions.
//!
//! This module defines the common traits and types for cloud providers.

pub mod aws;
mod traits;

pub use traits::{
    CloudProviderError, ComputeProvider, Instance, InstanceState, LaunchRequest, ObjectStore,
    Reservation, ServiceError,
};

// Re-export provider clients
pub use aws::Aws;
