//! AWS Signature Version 4 request signing.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::credentials::Credentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Inputs to a SigV4 signature.
#[derive(Debug)]
pub struct SigningParams<'a> {
    /// HTTP method, upper case.
    pub method: &'a str,
    /// Canonical (already URI-encoded) path.
    pub path: &'a str,
    /// Canonical query string, `""` if none.
    pub query: &'a str,
    /// Headers to sign as `(lowercase name, value)`. Must include `host`.
    pub headers: &'a [(&'a str, &'a str)],
    /// Hex-encoded SHA-256 of the request payload.
    pub payload_hash: &'a str,
    /// AWS region.
    pub region: &'a str,
    /// AWS service name (`ec2`, `s3`).
    pub service: &'a str,
    /// Signing time.
    pub time: DateTime<Utc>,
}

/// Hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `x-amz-date` timestamp format.
#[must_use]
pub fn amz_date(time: DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// URI-encode one path segment per SigV4 rules (unreserved characters kept).
#[must_use]
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Compute the `Authorization` header value for a request.
#[must_use]
pub fn sign(params: &SigningParams<'_>, credentials: &Credentials) -> String {
    let mut headers: Vec<(String, String)> = params
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        params.method,
        params.path,
        params.query,
        canonical_headers,
        signed_headers,
        params.payload_hash
    );

    let date = params.time.format("%Y%m%d").to_string();
    let scope = format!("{date}/{}/{}/aws4_request", params.region, params.service);
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{scope}\n{}",
        amz_date(params.time),
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(
        &credentials.secret_access_key,
        &date,
        params.region,
        params.service,
    );
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    )
}
