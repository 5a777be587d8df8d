//! AWS (Amazon Web Services) cloud provider.
//!
//! Implements [`ComputeProvider`](super::ComputeProvider) and
//! [`ObjectStore`](super::ObjectStore) for AWS.
//!
//! ## Services
//!
//! - **EC2** (Elastic Compute Cloud) - Query API, XML responses
//! - **S3** (Simple Storage Service) - REST API
//!
//! Every request is signed with AWS Signature Version 4.

mod client;
mod credentials;
mod models;
mod signing;

pub use client::Aws;
pub use credentials::Credentials;
pub use models::*;
pub use signing::{sign, SigningParams};
