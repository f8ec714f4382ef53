//! Time-limited URLs for candidate pictures kept in S3-compatible object storage.
//!
//! URLs are presigned locally with AWS Signature Version 4 (query-string
//! authentication); no request reaches the storage service until the client
//! follows the URL.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const DEFAULT_BUCKET: &str = "rankrat-pictures";
/// Longest validity accepted by SigV4 presigned URLs.
pub const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Failures while producing a signed URL.
#[derive(Debug, Error)]
pub enum SignerError {
    /// A required variable is unset.
    #[error("missing object storage environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// The object key is blank.
    #[error("object key must not be empty")]
    EmptyKey,
    /// The requested validity exceeds what S3 accepts.
    #[error("presign validity must be between 1s and {max:?}, got {requested:?}")]
    InvalidTtl { requested: Duration, max: Duration },
    /// The secret key cannot seed an HMAC.
    #[error("invalid signing key")]
    InvalidSigningKey,
}

/// Turns stored picture keys into time-limited URLs.
pub trait PictureSigner: Send + Sync {
    /// Signed `GET` URL valid for `ttl`.
    fn sign_download(&self, key: &str, ttl: Duration) -> Result<String, SignerError>;
    /// Signed `PUT` URL valid for `ttl`; the uploader must send `content_type`.
    fn sign_upload(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, SignerError>;
}

/// Credentials and location of the picture bucket.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// AWS region of the bucket.
    pub region: String,
    /// Bucket holding candidate pictures.
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl S3Config {
    /// Read `AWS_REGION`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `PICTURE_BUCKET`.
    pub fn from_env() -> Result<Self, SignerError> {
        let required = |var: &'static str| {
            std::env::var(var)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .ok_or(SignerError::MissingEnvVar { var })
        };

        Ok(Self {
            region: required("AWS_REGION")?,
            access_key_id: required("AWS_ACCESS_KEY_ID")?,
            secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
            bucket: std::env::var("PICTURE_BUCKET")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BUCKET.to_owned()),
        })
    }
}

/// SigV4 query presigner for virtual-hosted style S3 URLs.
#[derive(Debug, Clone)]
pub struct S3PictureSigner {
    config: S3Config,
    host: String,
}

impl S3PictureSigner {
    /// Signer for `config`.
    pub fn new(config: S3Config) -> Self {
        let host = format!("{}.s3.{}.amazonaws.com", config.bucket, config.region);
        Self { config, host }
    }

    /// Virtual-hosted endpoint of the bucket.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn presign(
        &self,
        method: &str,
        key: &str,
        content_type: Option<&str>,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> Result<String, SignerError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(SignerError::EmptyKey);
        }
        if ttl.as_secs() == 0 || ttl > MAX_PRESIGN_TTL {
            return Err(SignerError::InvalidTtl {
                requested: ttl,
                max: MAX_PRESIGN_TTL,
            });
        }

        let (date, amz_date) = format_timestamps(now);
        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.config.region);
        let credential = format!("{}/{scope}", self.config.access_key_id);

        let (canonical_headers, signed_headers) = match content_type {
            Some(content_type) => (
                format!("content-type:{}\nhost:{}\n", content_type.trim(), self.host),
                "content-type;host",
            ),
            None => (format!("host:{}\n", self.host), "host"),
        };

        // Parameter names are already in byte order.
        let query = [
            ("X-Amz-Algorithm", ALGORITHM.to_owned()),
            ("X-Amz-Credential", credential),
            ("X-Amz-Date", amz_date.clone()),
            ("X-Amz-Expires", ttl.as_secs().to_string()),
            ("X-Amz-SignedHeaders", signed_headers.to_owned()),
        ]
        .iter()
        .map(|(name, value)| format!("{}={}", uri_encode(name, true), uri_encode(value, true)))
        .collect::<Vec<_>>()
        .join("&");

        let path = format!("/{}", uri_encode(key, false));
        let canonical_request = format!(
            "{method}\n{path}\n{query}\n{canonical_headers}\n{signed_headers}\n{UNSIGNED_PAYLOAD}"
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = self.signing_key(&date)?;
        let signature = hex::encode(hmac(&signing_key, string_to_sign.as_bytes())?);

        Ok(format!(
            "https://{}{path}?{query}&X-Amz-Signature={signature}",
            self.host
        ))
    }

    fn signing_key(&self, date: &str) -> Result<Vec<u8>, SignerError> {
        let secret = format!("AWS4{}", self.config.secret_access_key);
        let date_key = hmac(secret.as_bytes(), date.as_bytes())?;
        let region_key = hmac(&date_key, self.config.region.as_bytes())?;
        let service_key = hmac(&region_key, SERVICE.as_bytes())?;
        hmac(&service_key, b"aws4_request")
    }
}

impl PictureSigner for S3PictureSigner {
    fn sign_download(&self, key: &str, ttl: Duration) -> Result<String, SignerError> {
        self.presign("GET", key, None, ttl, OffsetDateTime::now_utc())
    }

    fn sign_upload(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, SignerError> {
        self.presign(
            "PUT",
            key,
            Some(content_type),
            ttl,
            OffsetDateTime::now_utc(),
        )
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SignerError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignerError::InvalidSigningKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// `YYYYMMDD` and `YYYYMMDDTHHMMSSZ` in UTC.
fn format_timestamps(now: OffsetDateTime) -> (String, String) {
    let now = now.to_offset(time::UtcOffset::UTC);
    let date = format!(
        "{:04}{:02}{:02}",
        now.year(),
        u8::from(now.month()),
        now.day()
    );
    let amz_date = format!(
        "{date}T{:02}{:02}{:02}Z",
        now.hour(),
        now.minute(),
        now.second()
    );
    (date, amz_date)
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            b'/' if !encode_slash => encoded.push('/'),
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

/// Signer that never succeeds, used when object storage is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPictureSigner;

impl PictureSigner for DisabledPictureSigner {
    fn sign_download(&self, _key: &str, _ttl: Duration) -> Result<String, SignerError> {
        Err(SignerError::MissingEnvVar {
            var: "AWS_ACCESS_KEY_ID",
        })
    }

    fn sign_upload(
        &self,
        _key: &str,
        _content_type: &str,
        _ttl: Duration,
    ) -> Result<String, SignerError> {
        Err(SignerError::MissingEnvVar {
            var: "AWS_ACCESS_KEY_ID",
        })
    }
}
