//! AWS API response models.
//!
//! EC2's Query API and S3 both answer in XML. These types mirror just the
//! elements the deployer reads; everything else in a response is ignored.

use serde::Deserialize;

// ============================================================================
// EC2 types
// ============================================================================

/// EC2 wraps every list in `<xxxSet><item>…</item></xxxSet>`.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemSet<T> {
    /// Entries of the set.
    #[serde(rename = "item", default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Default for ItemSet<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

/// Instance state.
#[derive(Debug, Clone, Deserialize)]
pub struct Ec2InstanceState {
    /// Numeric state code.
    pub code: u16,
    /// State name (e.g. `pending`, `running`).
    pub name: String,
}

/// Placement of an instance.
#[derive(Debug, Clone, Deserialize)]
pub struct Ec2Placement {
    /// Availability zone.
    #[serde(rename = "availabilityZone")]
    pub availability_zone: String,
}

/// EC2 instance information.
#[derive(Debug, Clone, Deserialize)]
pub struct Ec2Instance {
    /// Instance ID.
    #[serde(rename = "instanceId")]
    pub instance_id: String,
    /// AMI ID.
    #[serde(rename = "imageId")]
    pub image_id: String,
    /// Instance state.
    #[serde(rename = "instanceState")]
    pub state: Ec2InstanceState,
    /// Private DNS name. Empty while the instance is pending.
    #[serde(rename = "privateDnsName", default)]
    pub private_dns_name: Option<String>,
    /// Public DNS name.
    #[serde(rename = "dnsName", default)]
    pub dns_name: Option<String>,
    /// Instance type.
    #[serde(rename = "instanceType")]
    pub instance_type: String,
    /// Private IP address.
    #[serde(rename = "privateIpAddress", default)]
    pub private_ip_address: Option<String>,
    /// Public IP address.
    #[serde(rename = "ipAddress", default)]
    pub ip_address: Option<String>,
    /// Placement.
    #[serde(default)]
    pub placement: Option<Ec2Placement>,
}

/// Reservation within a `DescribeInstances` response.
#[derive(Debug, Clone, Deserialize)]
pub struct Ec2Reservation {
    /// Reservation ID.
    #[serde(rename = "reservationId")]
    pub reservation_id: String,
    /// Instances of the reservation.
    #[serde(rename = "instancesSet", default)]
    pub instances: ItemSet<Ec2Instance>,
}

/// `RunInstances` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RunInstancesResponse {
    /// Request ID.
    #[serde(rename = "requestId")]
    pub request_id: String,
    /// Reservation ID.
    #[serde(rename = "reservationId", default)]
    pub reservation_id: Option<String>,
    /// Launched instances.
    #[serde(rename = "instancesSet", default)]
    pub instances: ItemSet<Ec2Instance>,
}

/// `DescribeInstances` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DescribeInstancesResponse {
    /// Request ID.
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    /// Reservations.
    #[serde(rename = "reservationSet", default)]
    pub reservations: ItemSet<Ec2Reservation>,
    /// Pagination token for the next page, if any.
    #[serde(rename = "nextToken", default)]
    pub next_token: Option<String>,
}

impl DescribeInstancesResponse {
    /// All instances across all reservations.
    pub fn instances(&self) -> impl Iterator<Item = &Ec2Instance> {
        self.reservations
            .items
            .iter()
            .flat_map(|r| r.instances.items.iter())
    }
}

/// A single EC2 error entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Ec2ErrorDetail {
    /// Error code.
    #[serde(rename = "Code")]
    pub code: String,
    /// Error message.
    #[serde(rename = "Message", default)]
    pub message: String,
}

/// `<Errors>` wrapper.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ec2Errors {
    /// Error entries.
    #[serde(rename = "Error", default)]
    pub errors: Vec<Ec2ErrorDetail>,
}

/// EC2 error response (`<Response><Errors>…</Errors><RequestID>…`).
#[derive(Debug, Clone, Deserialize)]
pub struct Ec2ErrorResponse {
    /// Errors.
    #[serde(rename = "Errors", default)]
    pub errors: Ec2Errors,
    /// Request ID.
    #[serde(rename = "RequestID", default)]
    pub request_id: Option<String>,
}

// ============================================================================
// S3 types
// ============================================================================

/// S3 error response (`<Error><Code>…</Code>…</Error>`).
#[derive(Debug, Clone, Deserialize)]
pub struct S3ErrorResponse {
    /// Error code.
    #[serde(rename = "Code")]
    pub code: String,
    /// Error message.
    #[serde(rename = "Message", default)]
    pub message: String,
    /// Request ID.
    #[serde(rename = "RequestId", default)]
    pub request_id: Option<String>,
}
