//! AWS API client implementation.
//!
//! EC2 is driven through the Query API (form-encoded `POST /`, XML answers)
//! and S3 through its REST API. Both are signed with SigV4.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::credentials::Credentials;
use super::models::{
    DescribeInstancesResponse, Ec2ErrorResponse, Ec2Instance, RunInstancesResponse,
    S3ErrorResponse,
};
use super::signing::{self, SigningParams};
use crate::providers::traits::{
    CloudProviderError, ComputeProvider, Instance, InstanceState, LaunchRequest, ObjectStore,
    Reservation, ServiceError,
};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// EC2 Query API version.
const EC2_API_VERSION: &str = "2016-11-15";

/// Content type of EC2 Query API bodies.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Which AWS service a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Ec2,
    S3,
}

impl Service {
    fn name(self) -> &'static str {
        match self {
            Self::Ec2 => "ec2",
            Self::S3 => "s3",
        }
    }
}

/// AWS cloud provider.
#[derive(Clone)]
pub struct Aws {
    /// HTTP client.
    client: Client,
    /// Signing credentials.
    credentials: Credentials,
    /// AWS region.
    region: String,
    /// EC2 endpoint override (e.g. a local test server).
    ec2_endpoint: Option<String>,
    /// S3 endpoint override. When set, path-style addressing is used.
    s3_endpoint: Option<String>,
}

impl Aws {
    /// Create a new AWS provider.
    ///
    /// # Arguments
    /// * `credentials` - Access key pair used to sign requests
    /// * `region` - AWS region (e.g., "us-east-1")
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Result<Self, CloudProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(CloudProviderError::Http)?;

        Ok(Self {
            client,
            credentials,
            region: region.into(),
            ec2_endpoint: None,
            s3_endpoint: None,
        })
    }

    /// Send EC2 requests to `endpoint` instead of the regional endpoint.
    #[must_use]
    pub fn with_ec2_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.ec2_endpoint = Some(endpoint.into());
        self
    }

    /// Send S3 requests to `endpoint` (path-style) instead of the
    /// virtual-hosted bucket endpoint.
    #[must_use]
    pub fn with_s3_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.s3_endpoint = Some(endpoint.into());
        self
    }

    /// Region this client signs for.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Get EC2 API endpoint.
    fn ec2_endpoint(&self) -> String {
        self.ec2_endpoint.as_ref().map_or_else(
            || format!("https://ec2.{}.amazonaws.com/", self.region),
            |endpoint| format!("{}/", endpoint.trim_end_matches('/')),
        )
    }

    /// Get the URL of an S3 object.
    fn s3_object_url(&self, bucket: &str, key: &str) -> String {
        let key = key
            .split('/')
            .map(signing::encode_segment)
            .collect::<Vec<_>>()
            .join("/");

        match &self.s3_endpoint {
            Some(endpoint) => format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/')),
            None => format!("https://{bucket}.s3.{}.amazonaws.com/{key}", self.region),
        }
    }

    /// Sign and execute an AWS request.
    async fn aws_request(
        &self,
        service: Service,
        method: Method,
        url: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, CloudProviderError> {
        debug!(url = %url, method = %method, service = service.name(), "AWS request");

        let parsed = Url::parse(url)
            .map_err(|e| CloudProviderError::Config(format!("Invalid endpoint URL {url}: {e}")))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(CloudProviderError::Config(format!(
                    "Endpoint URL has no host: {url}"
                )))
            }
        };

        let now = chrono::Utc::now();
        let amz_date = signing::amz_date(now);
        let payload_hash = signing::sha256_hex(&body);

        let mut signed: Vec<(&str, &str)> = vec![
            ("host", host.as_str()),
            ("x-amz-content-sha256", payload_hash.as_str()),
            ("x-amz-date", amz_date.as_str()),
        ];
        if let Some(token) = &self.credentials.session_token {
            signed.push(("x-amz-security-token", token.as_str()));
        }

        let authorization = signing::sign(
            &SigningParams {
                method: method.as_str(),
                path: parsed.path(),
                query: parsed.query().unwrap_or(""),
                headers: &signed,
                payload_hash: &payload_hash,
                region: &self.region,
                service: service.name(),
                time: now,
            },
            &self.credentials,
        );

        let mut request = self
            .client
            .request(method, parsed)
            .header("Authorization", authorization)
            .header("X-Amz-Date", &amz_date)
            .header("X-Amz-Content-Sha256", &payload_hash);
        if let Some(token) = &self.credentials.session_token {
            request = request.header("X-Amz-Security-Token", token);
        }
        if let Some(content_type) = content_type {
            request = request
                .header("Content-Type", content_type)
                .header("Content-Length", body.len());
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        Ok(request.send().await?)
    }

    /// Execute an EC2 Query API action and return the raw XML answer.
    async fn ec2_action(
        &self,
        action: &str,
        params: &[(String, String)],
    ) -> Result<String, CloudProviderError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("Action", action)
            .append_pair("Version", EC2_API_VERSION)
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();

        let response = self
            .aws_request(
                Service::Ec2,
                Method::POST,
                &self.ec2_endpoint(),
                body.into_bytes(),
                Some(FORM_CONTENT_TYPE),
            )
            .await?;

        Self::handle_ec2_response(action, response).await
    }

    /// Execute an EC2 action and decode its XML answer.
    async fn ec2_call<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(String, String)],
    ) -> Result<T, CloudProviderError> {
        let text = self.ec2_action(action, params).await?;
        quick_xml::de::from_str(&text).map_err(|e| {
            warn!(error = %e, action, "Failed to parse EC2 response");
            CloudProviderError::Xml(e)
        })
    }

    /// Handle an EC2 API response.
    async fn handle_ec2_response(
        action: &str,
        response: reqwest::Response,
    ) -> Result<String, CloudProviderError> {
        let status = response.status();
        let header_request_id = request_id_header(&response);
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        let (code, message, request_id) = match quick_xml::de::from_str::<Ec2ErrorResponse>(&text)
        {
            Ok(parsed) => {
                let first = parsed.errors.errors.into_iter().next();
                (
                    first.as_ref().map(|e| e.code.clone()),
                    first.map(|e| e.message),
                    parsed.request_id,
                )
            }
            Err(_) => (None, None, None),
        };

        let error = ServiceError {
            status: status.as_u16(),
            code: code.unwrap_or_else(|| canonical_reason(status)),
            message: message.unwrap_or(text),
            request_id: request_id.or(header_request_id),
        };
        warn!(action, error = %error, "EC2 request failed");

        if error.code.ends_with(".NotFound") {
            Err(CloudProviderError::NotFound(error.message))
        } else {
            Err(CloudProviderError::Service(error))
        }
    }

    /// Handle an S3 API response, returning the body on success.
    async fn handle_s3_response(
        key: &str,
        response: reqwest::Response,
    ) -> Result<Vec<u8>, CloudProviderError> {
        let status = response.status();
        let header_request_id = request_id_header(&response);
        let bytes = response.bytes().await?;

        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        let text = String::from_utf8_lossy(&bytes).into_owned();
        let parsed = quick_xml::de::from_str::<S3ErrorResponse>(&text).ok();

        if status == StatusCode::NOT_FOUND
            && parsed.as_ref().map_or(true, |e| e.code == "NoSuchKey")
        {
            return Err(CloudProviderError::NotFound(key.to_string()));
        }

        let error = match parsed {
            Some(parsed) => ServiceError {
                status: status.as_u16(),
                code: parsed.code,
                message: parsed.message,
                request_id: parsed.request_id.or(header_request_id),
            },
            None => ServiceError {
                status: status.as_u16(),
                code: canonical_reason(status),
                message: text,
                request_id: header_request_id,
            },
        };
        warn!(key, error = %error, "S3 request failed");
        Err(CloudProviderError::Service(error))
    }

    /// Convert EC2 instance to our type.
    fn to_instance(ec2: &Ec2Instance) -> Instance {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        Instance {
            id: ec2.instance_id.clone(),
            image_id: ec2.image_id.clone(),
            instance_type: ec2.instance_type.clone(),
            state: ec2.state.name.parse().unwrap_or(InstanceState::Unknown),
            private_address: non_empty(&ec2.private_dns_name)
                .or_else(|| non_empty(&ec2.private_ip_address)),
            public_address: non_empty(&ec2.dns_name).or_else(|| non_empty(&ec2.ip_address)),
            zone: ec2.placement.as_ref().map(|p| p.availability_zone.clone()),
        }
    }

    /// `InstanceId.N` parameters for a set of ids.
    fn instance_id_params(ids: &[String]) -> Vec<(String, String)> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| (format!("InstanceId.{}", i + 1), id.clone()))
            .collect()
    }
}

fn request_id_header(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("x-amz-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn canonical_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown")
        .replace(' ', "")
}

#[async_trait]
impl ComputeProvider for Aws {
    async fn create_instances(
        &self,
        req: &LaunchRequest,
    ) -> Result<Reservation, CloudProviderError> {
        info!(
            count = req.count,
            image_id = %req.image_id,
            instance_type = %req.instance_type,
            key_pair = %req.key_pair,
            zone = %req.zone,
            "Launching EC2 instances"
        );

        let mut params = vec![
            ("ImageId".to_string(), req.image_id.clone()),
            ("InstanceType".to_string(), req.instance_type.clone()),
            ("MinCount".to_string(), req.count.to_string()),
            ("MaxCount".to_string(), req.count.to_string()),
            ("KeyName".to_string(), req.key_pair.clone()),
            ("Placement.AvailabilityZone".to_string(), req.zone.clone()),
        ];
        params.extend(
            req.security_groups
                .iter()
                .enumerate()
                .map(|(i, group)| (format!("SecurityGroup.{}", i + 1), group.clone())),
        );

        let response: RunInstancesResponse = self.ec2_call("RunInstances", &params).await?;
        let instance_ids: Vec<String> = response
            .instances
            .items
            .iter()
            .map(|i| i.instance_id.clone())
            .collect();

        info!(
            request_id = %response.request_id,
            instances = ?instance_ids,
            "EC2 instances launched"
        );

        Ok(Reservation {
            request_id: response.request_id,
            reservation_id: response.reservation_id,
            instance_ids,
        })
    }

    async fn describe_instance(&self, id: &str) -> Result<Instance, CloudProviderError> {
        let params = Self::instance_id_params(&[id.to_string()]);
        let response: DescribeInstancesResponse =
            self.ec2_call("DescribeInstances", &params).await?;

        let found = response
            .instances()
            .find(|i| i.instance_id == id)
            .map(Self::to_instance);
        found.ok_or_else(|| CloudProviderError::NotFound(format!("Instance not found: {id}")))
    }

    async fn list_instances(
        &self,
        state: Option<InstanceState>,
    ) -> Result<Vec<Instance>, CloudProviderError> {
        let mut instances = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut params = Vec::new();
            if let Some(state) = state {
                params.push(("Filter.1.Name".to_string(), "instance-state-name".to_string()));
                params.push(("Filter.1.Value.1".to_string(), state.as_str().to_string()));
            }
            if let Some(token) = next_token.take() {
                params.push(("NextToken".to_string(), token));
            }

            let response: DescribeInstancesResponse =
                self.ec2_call("DescribeInstances", &params).await?;
            instances.extend(
                response
                    .instances()
                    .map(Self::to_instance)
                    .filter(|i| state.map_or(true, |s| i.state == s)),
            );

            match response.next_token.filter(|t| !t.is_empty()) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!(count = instances.len(), state = ?state, "Listed EC2 instances");
        Ok(instances)
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<(), CloudProviderError> {
        if ids.is_empty() {
            debug!("No instances to terminate");
            return Ok(());
        }

        info!(instances = ?ids, "Terminating instances");
        self.ec2_action("TerminateInstances", &Self::instance_id_params(ids))
            .await?;
        info!(count = ids.len(), "Instance termination initiated");
        Ok(())
    }

    async fn reboot_instances(&self, ids: &[String]) -> Result<(), CloudProviderError> {
        if ids.is_empty() {
            debug!("No instances to reboot");
            return Ok(());
        }

        info!(instances = ?ids, "Rebooting instances");
        self.ec2_action("RebootInstances", &Self::instance_id_params(ids))
            .await?;
        info!(count = ids.len(), "Instance reboot initiated");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for Aws {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), CloudProviderError> {
        let length = body.len();
        let url = self.s3_object_url(bucket, key);
        let response = self
            .aws_request(Service::S3, Method::PUT, &url, body, Some(content_type))
            .await?;
        Self::handle_s3_response(key, response).await?;

        info!(bucket, key, length, content_type, "Stored object");
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, CloudProviderError> {
        let url = self.s3_object_url(bucket, key);
        let response = self
            .aws_request(Service::S3, Method::GET, &url, Vec::new(), None)
            .await?;
        Self::handle_s3_response(key, response).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), CloudProviderError> {
        let url = self.s3_object_url(bucket, key);
        let response = self
            .aws_request(Service::S3, Method::DELETE, &url, Vec::new(), None)
            .await?;

        match Self::handle_s3_response(key, response).await {
            Ok(_) | Err(CloudProviderError::NotFound(_)) => {
                debug!(bucket, key, "Deleted object");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
