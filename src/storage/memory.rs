//! In-memory storage backend.
//!
//! Objects are held in a `tokio::sync::RwLock<HashMap<...>>` keyed by
//! bucket and key. Every trait call counts as one request, which lets
//! callers verify that an operation never reached the store.

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::backend::{ObjectStore, PutRequest};
use crate::errors::BlobstoreError;

/// A stored object plus the encryption settings it was uploaded with.
#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub data: Bytes,
    pub server_side_encryption: Option<String>,
    pub sse_kms_key_id: Option<String>,
}

/// In-memory object store.
#[derive(Default)]
pub struct MemoryObjectStore {
    /// (bucket, key) -> object.
    objects: tokio::sync::RwLock<HashMap<(String, String), MemoryObject>>,
    /// Number of trait calls served so far.
    requests: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests served through [`ObjectStore`] methods.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Seed an object without counting a request.
    pub async fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.objects.write().await.insert(
            (bucket.to_string(), key.to_string()),
            MemoryObject {
                data: data.into(),
                server_side_encryption: None,
                sse_kms_key_id: None,
            },
        );
    }

    /// Inspect an object without counting a request.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<MemoryObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn not_found(bucket: &str, key: &str, code: &str) -> BlobstoreError {
        BlobstoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
            code: code.to_string(),
        }
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, BlobstoreError>> + Send + '_>> {
        let id = (bucket.to_string(), key.to_string());
        Box::pin(async move {
            self.record_request();
            let objects = self.objects.read().await;
            match objects.get(&id) {
                Some(obj) => Ok(ByteStream::from(obj.data.clone())),
                None => Err(Self::not_found(&id.0, &id.1, "NoSuchKey")),
            }
        })
    }

    fn put_object(
        &self,
        request: PutRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>> {
        Box::pin(async move {
            self.record_request();
            let data = request
                .body
                .collect()
                .await
                .map_err(|e| BlobstoreError::Transport(format!("reading upload body: {e}")))?
                .into_bytes();

            self.objects.write().await.insert(
                (request.bucket, request.key),
                MemoryObject {
                    data,
                    server_side_encryption: request.server_side_encryption,
                    sse_kms_key_id: request.sse_kms_key_id,
                },
            );
            Ok(())
        })
    }

    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>> {
        let id = (bucket.to_string(), key.to_string());
        Box::pin(async move {
            self.record_request();
            // Some S3-compatible servers answer 404 here; mirror them.
            match self.objects.write().await.remove(&id) {
                Some(_) => Ok(()),
                None => Err(Self::not_found(&id.0, &id.1, "NoSuchKey")),
            }
        })
    }

    fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>> {
        let id = (bucket.to_string(), key.to_string());
        Box::pin(async move {
            self.record_request();
            if self.objects.read().await.contains_key(&id) {
                Ok(())
            } else {
                Err(Self::not_found(&id.0, &id.1, "NotFound"))
            }
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{bucket}/{key}")
    }
}
