//! Abstract object store trait.
//!
//! The blobstore facade talks to storage only through [`ObjectStore`],
//! so the SDK-backed store and the in-memory store are interchangeable.
//! Implementations report a missing key as [`BlobstoreError::NotFound`]
//! and leave the decision of whether that is an error to the caller.

use aws_sdk_s3::primitives::ByteStream;
use std::future::Future;
use std::pin::Pin;

use crate::errors::BlobstoreError;

/// A single-object upload.
#[derive(Debug)]
pub struct PutRequest {
    pub bucket: String,
    pub key: String,
    /// Full object content.
    pub body: ByteStream,
    /// Server-side encryption algorithm, e.g. `AES256` or `aws:kms`.
    pub server_side_encryption: Option<String>,
    /// KMS key id used with `aws:kms` encryption.
    pub sse_kms_key_id: Option<String>,
}

/// Async object storage contract. Each call is one request to the store.
pub trait ObjectStore: Send + Sync + 'static {
    /// Open the content of `key` as a byte stream.
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, BlobstoreError>> + Send + '_>>;

    /// Upload an object, replacing any existing content.
    fn put_object(
        &self,
        request: PutRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>>;

    /// Delete `key`.
    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>>;

    /// Metadata-only existence probe.
    fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>>;

    /// Human-readable location of an object, used in log lines.
    fn object_url(&self, bucket: &str, key: &str) -> String;
}
