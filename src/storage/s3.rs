//! AWS S3 object store.
//!
//! Credentials resolve in this order: a named profile, then an explicit
//! access-key pair, then the SDK's default chain. The SDK's own retries are
//! disabled; [`super::ContentFetcher`] owns the retry policy.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, ProvideCredentials, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;

use super::{ContentPath, FetchError, ObjectStore};
use crate::error::Result;
use crate::models::StorageConfig;

/// Error codes worth another attempt.
const TRANSIENT_CODES: [&str; 6] = [
    "InternalError",
    "ServiceUnavailable",
    "SlowDown",
    "RequestTimeout",
    "Throttling",
    "ThrottlingException",
];

/// Read-only S3 access for entry content.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from storage settings.
    ///
    /// Returns `Ok(None)` when no credentials resolve; the caller is expected
    /// to continue without content.
    pub async fn connect(config: &StorageConfig) -> Result<Option<Self>> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
                    .read_timeout(Duration::from_secs(config.read_timeout_secs))
                    .build(),
            );

        let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let source = match (
            non_blank(&config.profile),
            non_blank(&config.access_key_id),
            non_blank(&config.secret_access_key),
        ) {
            (Some(profile), _, _) => {
                let source = format!("profile '{profile}'");
                loader = loader.profile_name(profile);
                source
            }
            (None, Some(key_id), Some(secret)) => {
                loader = loader.credentials_provider(Credentials::new(
                    key_id, secret, None, None, "regfeeds-config",
                ));
                "access key pair".to_string()
            }
            _ => "default credential chain".to_string(),
        };

        let sdk_config = loader.load().await;
        let Some(provider) = sdk_config.credentials_provider() else {
            log::debug!("No S3 credential provider from {source}");
            return Ok(None);
        };
        if let Err(e) = provider.provide_credentials().await {
            log::debug!("S3 credentials from {source} did not resolve: {e}");
            return Ok(None);
        }

        log::info!("S3 content access enabled via {source} ({})", config.region);
        Ok(Some(Self::new(Client::new(&sdk_config))))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(
        &self,
        path: &ContentPath,
        max_bytes: u64,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        let output = self
            .client
            .get_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(classify)?;

        let declared = output.content_length().unwrap_or(0).max(0) as u64;
        if declared > max_bytes {
            return Err(FetchError::TooLarge { limit: max_bytes });
        }

        let mut body = output.body;
        let mut buf = Vec::with_capacity(declared as usize);
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?
        {
            if (buf.len() + chunk.len()) as u64 > max_bytes {
                return Err(FetchError::TooLarge { limit: max_bytes });
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }
}

fn classify<R>(err: SdkError<GetObjectError, R>) -> FetchError
where
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match err {
        SdkError::TimeoutError(_) => FetchError::Timeout,
        SdkError::DispatchFailure(ref failure) if failure.is_timeout() => FetchError::Timeout,
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            FetchError::Transient(err.to_string())
        }
        SdkError::ServiceError(_) => {
            let service = err.into_service_error();
            if service.is_no_such_key() {
                return FetchError::NotFound;
            }
            match service.code() {
                Some("NoSuchKey" | "NoSuchBucket" | "NotFound") => FetchError::NotFound,
                Some("AccessDenied" | "Forbidden" | "InvalidAccessKeyId") => {
                    FetchError::AccessDenied
                }
                Some(code) if TRANSIENT_CODES.contains(&code) => {
                    FetchError::Transient(code.to_string())
                }
                _ => FetchError::Permanent(service.to_string()),
            }
        }
        other => FetchError::Permanent(other.to_string()),
    }
}
