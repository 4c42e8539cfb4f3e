//! S3 storage backend.
//!
//! Forwards each operation to an S3-compatible service through the AWS
//! SDK client built by [`crate::client::build_client`]. SDK failures are
//! classified by HTTP status so callers can tell a missing key apart from
//! credential and transport problems.

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use super::backend::{ObjectStore, PutRequest};
use crate::client;
use crate::config::Settings;
use crate::errors::BlobstoreError;

/// Store backed by the AWS SDK S3 client.
pub struct S3ObjectStore {
    /// Configured SDK client; never modified after construction.
    client: Client,
    /// Base URL used to report object locations.
    base_url: String,
}

impl S3ObjectStore {
    /// Build the SDK client for `settings`. No request is sent.
    pub async fn new(settings: &Settings) -> Result<Self, BlobstoreError> {
        let client = client::build_client(settings).await?;
        Ok(Self::from_client(client, base_url(settings)))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

/// Base URL of the service: the custom endpoint, or the regional AWS one.
fn base_url(settings: &Settings) -> String {
    settings.endpoint_url.clone().unwrap_or_else(|| {
        format!(
            "https://s3.{}.amazonaws.com",
            settings.effective_region.signing_region()
        )
    })
}

/// Map an SDK error to a [`BlobstoreError`] using the response status.
fn classify<E>(operation: &str, bucket: &str, key: &str, err: SdkError<E>) -> BlobstoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|resp| resp.status().as_u16());
    let (code, message) = match err.as_service_error() {
        Some(service_err) => (
            service_err.code().map(str::to_string),
            service_err.message().map(str::to_string),
        ),
        None => (None, None),
    };

    match status {
        Some(404) => BlobstoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
            code: code.unwrap_or_else(|| "NotFound".to_string()),
        },
        Some(401) | Some(403) => BlobstoreError::Auth {
            code: code.unwrap_or_else(|| "AccessDenied".to_string()),
            message: message.unwrap_or_else(|| format!("{operation} on '{key}' was rejected")),
        },
        _ => BlobstoreError::Transport(format!(
            "S3 {operation} failed: {}",
            DisplayErrorContext(&err)
        )),
    }
}

impl ObjectStore for S3ObjectStore {
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, BlobstoreError>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 get_object: bucket={} key={}", bucket, key);

            let resp = self
                .client
                .get_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| classify("get_object", &bucket, &key, e))?;

            Ok(resp.body)
        })
    }

    fn put_object(
        &self,
        request: PutRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>> {
        Box::pin(async move {
            let PutRequest {
                bucket,
                key,
                body,
                server_side_encryption,
                sse_kms_key_id,
            } = request;

            debug!(
                "S3 put_object: bucket={} key={} sse={:?}",
                bucket, key, server_side_encryption
            );

            let mut req = self.client.put_object().bucket(&bucket).key(&key).body(body);
            if let Some(sse) = server_side_encryption.as_deref() {
                req = req.server_side_encryption(ServerSideEncryption::from(sse));
            }
            if let Some(kms_key_id) = sse_kms_key_id {
                req = req.ssekms_key_id(kms_key_id);
            }

            req.send()
                .await
                .map_err(|e| classify("put_object", &bucket, &key, e))?;

            Ok(())
        })
    }

    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 delete_object: bucket={} key={}", bucket, key);

            self.client
                .delete_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| classify("delete_object", &bucket, &key, e))?;

            Ok(())
        })
    }

    fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 head_object: bucket={} key={}", bucket, key);

            self.client
                .head_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| classify("head_object", &bucket, &key, e))?;

            Ok(())
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), bucket, key)
    }
}

// -- Tests -------------------------------------------------------------------
