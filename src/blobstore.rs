//! Blobstore facade: get, put, delete, and exists on one bucket.
//!
//! [`Blobstore`] owns the resolved [`Settings`] and an [`ObjectStore`].
//! Mutating operations are rejected up front under anonymous credentials,
//! deleting a missing key succeeds, and `exists` turns a missing key into
//! `false`. Everything else propagates to the caller.

use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::Settings;
use crate::errors::BlobstoreError;
use crate::storage::backend::{ObjectStore, PutRequest};
use crate::storage::s3::S3ObjectStore;

/// Tracing target of the per-operation status lines on stderr.
///
/// Callers match on these lines, so the binary keeps this target at
/// `info` whatever `RUST_LOG` says.
pub const STATUS_TARGET: &str = "s3blob::status";

/// Operations on the configured bucket.
pub struct Blobstore<S: ObjectStore = S3ObjectStore> {
    store: S,
    settings: Settings,
}

impl Blobstore<S3ObjectStore> {
    /// Build the S3 client for `settings`. No request is sent.
    pub async fn connect(settings: Settings) -> Result<Self, BlobstoreError> {
        let store = S3ObjectStore::new(&settings).await?;
        Ok(Self::new(store, settings))
    }
}

impl<S: ObjectStore> Blobstore<S> {
    pub fn new(store: S, settings: Settings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn bucket(&self) -> &str {
        &self.settings.bucket_name
    }

    fn ensure_writable(&self) -> Result<(), BlobstoreError> {
        if self.settings.is_read_only() {
            return Err(BlobstoreError::ReadOnly);
        }
        Ok(())
    }

    /// Stream the object at `key` into `dest`, returning the byte count.
    pub async fn get<W>(&self, key: &str, dest: &mut W) -> Result<u64, BlobstoreError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let mut body = self.store.get_object(self.bucket(), key).await?;

        let mut written: u64 = 0;
        while let Some(chunk) = body.try_next().await.map_err(|e| {
            BlobstoreError::Transport(format!("reading content of '{key}': {e}"))
        })? {
            dest.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        dest.flush().await?;

        debug!("Downloaded {} bytes from '{}'", written, key);
        Ok(written)
    }

    /// Download `key` into the file at `path`, replacing its content.
    pub async fn get_file(&self, key: &str, path: &Path) -> Result<u64, BlobstoreError> {
        let mut file = tokio::fs::File::create(path).await?;
        let written = self.get(key, &mut file).await?;
        file.sync_all().await?;
        Ok(written)
    }

    /// Upload `source` as `key`, applying the configured encryption.
    pub async fn put(&self, source: ByteStream, key: &str) -> Result<(), BlobstoreError> {
        self.ensure_writable()?;

        let request = PutRequest {
            bucket: self.bucket().to_string(),
            key: key.to_string(),
            body: source,
            server_side_encryption: self.settings.server_side_encryption.clone(),
            sse_kms_key_id: self.settings.sse_kms_key_id.clone(),
        };
        self.store.put_object(request).await?;

        info!(
            target: STATUS_TARGET,
            "Successfully uploaded file to {}",
            self.store.object_url(self.bucket(), key)
        );
        Ok(())
    }

    /// Upload the file at `path` as `key`.
    pub async fn put_file(&self, path: &Path, key: &str) -> Result<(), BlobstoreError> {
        // Checked before touching the file so anonymous mode never reads it.
        self.ensure_writable()?;
        let source = ByteStream::from_path(path).await.map_err(|e| {
            BlobstoreError::Io(std::io::Error::other(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        })?;
        self.put(source, key).await
    }

    /// Delete `key`. A key that is already absent is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), BlobstoreError> {
        self.ensure_writable()?;

        match self.store.delete_object(self.bucket(), key).await {
            Ok(()) => {
                info!(
                    target: STATUS_TARGET,
                    "File '{}' deleted from bucket '{}'",
                    key,
                    self.bucket()
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!(
                    target: STATUS_TARGET,
                    "File '{}' does not exist in bucket '{}', nothing to delete",
                    key,
                    self.bucket()
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Check whether `key` exists without transferring its content.
    pub async fn exists(&self, key: &str) -> Result<bool, BlobstoreError> {
        match self.store.head_object(self.bucket(), key).await {
            Ok(()) => {
                info!(
                    target: STATUS_TARGET,
                    "File '{}' exists in bucket '{}'",
                    key,
                    self.bucket()
                );
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                info!(
                    target: STATUS_TARGET,
                    "File '{}' does not exist in bucket '{}'",
                    key,
                    self.bucket()
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::storage::memory::MemoryObjectStore;
    use bytes::Bytes;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const STATIC_CONFIG: &str = r#"{
        "bucket_name": "b",
        "credentials_source": "static",
        "access_key_id": "A",
        "secret_access_key": "S",
        "region": "us-east-1"
    }"#;

    fn blobstore(config: &str) -> Blobstore<MemoryObjectStore> {
        Blobstore::new(MemoryObjectStore::new(), parse_config(config).unwrap())
    }

    async fn get_bytes<S: ObjectStore>(
        store: &Blobstore<S>,
        key: &str,
    ) -> Result<Vec<u8>, BlobstoreError> {
        let mut buf: Vec<u8> = Vec::new();
        store.get(key, &mut buf).await?;
        Ok(buf)
    }

    /// Store that fails every request with a fixed error.
    struct FaultyStore {
        requests: AtomicUsize,
        error: fn() -> BlobstoreError,
    }

    impl FaultyStore {
        fn new(error: fn() -> BlobstoreError) -> Self {
            Self {
                requests: AtomicUsize::new(0),
                error,
            }
        }

        fn fail<T: Send + 'static>(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<T, BlobstoreError>> + Send + '_>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let err = (self.error)();
            Box::pin(async move { Err(err) })
        }
    }

    impl ObjectStore for FaultyStore {
        fn get_object(
            &self,
            _bucket: &str,
            _key: &str,
        ) -> Pin<Box<dyn Future<Output = Result<ByteStream, BlobstoreError>> + Send + '_>> {
            self.fail()
        }

        fn put_object(
            &self,
            _request: PutRequest,
        ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>> {
            self.fail()
        }

        fn delete_object(
            &self,
            _bucket: &str,
            _key: &str,
        ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>> {
            self.fail()
        }

        fn head_object(
            &self,
            _bucket: &str,
            _key: &str,
        ) -> Pin<Box<dyn Future<Output = Result<(), BlobstoreError>> + Send + '_>> {
            self.fail()
        }

        fn object_url(&self, bucket: &str, key: &str) -> String {
            format!("faulty://{bucket}/{key}")
        }
    }

    fn access_denied() -> BlobstoreError {
        BlobstoreError::Auth {
            code: "AccessDenied".to_string(),
            message: "Access Denied".to_string(),
        }
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let store = blobstore(STATIC_CONFIG);

        store
            .put(ByteStream::from_static(b"hi"), "hello.txt")
            .await
            .unwrap();
        assert_eq!(get_bytes(&store, "hello.txt").await.unwrap(), b"hi");
        assert!(store.exists("hello.txt").await.unwrap());

        store.delete("hello.txt").await.unwrap();
        assert!(!store.exists("hello.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_roundtrip_arbitrary_bytes() {
        let store = blobstore(STATIC_CONFIG);
        let payloads: Vec<Vec<u8>> = vec![
            Vec::new(),
            vec![0u8, 255, 10, 13, 0],
            (0..=255u8).cycle().take(70_000).collect(),
        ];
        for (idx, payload) in payloads.into_iter().enumerate() {
            let key = format!("blob-{idx}");
            store
                .put(ByteStream::from(payload.clone()), &key)
                .await
                .unwrap();
            assert_eq!(get_bytes(&store, &key).await.unwrap(), payload);
        }
    }

    #[tokio::test]
    async fn test_get_overwrites_destination_file() {
        let store = blobstore(STATIC_CONFIG);
        store.store().insert("b", "k", "new").await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dest");
        std::fs::write(&path, "much longer old content").unwrap();

        let written = store.get_file("k", &path).await.unwrap();
        assert_eq!(written, 3);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_put_file() {
        let store = blobstore(STATIC_CONFIG);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src");
        std::fs::write(&path, "from disk").unwrap();

        store.put_file(&path, "k").await.unwrap();
        let obj = store.store().object("b", "k").await.unwrap();
        assert_eq!(obj.data, Bytes::from_static(b"from disk"));
    }

    #[tokio::test]
    async fn test_put_file_missing_source() {
        let store = blobstore(STATIC_CONFIG);
        let err = store
            .put_file(Path::new("/nonexistent/s3blob/src"), "k")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobstoreError::Io(_)));
        assert_eq!(store.store().request_count(), 0);
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let store = blobstore(STATIC_CONFIG);
        let err = get_bytes(&store, "nope.txt").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("NoSuchKey"));
    }

    #[tokio::test]
    async fn test_get_transport_error_is_distinct() {
        let store = Blobstore::new(
            FaultyStore::new(|| BlobstoreError::Transport("connection refused".to_string())),
            parse_config(STATIC_CONFIG).unwrap(),
        );
        let err = get_bytes(&store, "nope.txt").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(err, BlobstoreError::Transport(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = blobstore(STATIC_CONFIG);
        store.store().insert("b", "k", "x").await;
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_surfaces_other_errors() {
        let store = Blobstore::new(
            FaultyStore::new(access_denied),
            parse_config(STATIC_CONFIG).unwrap(),
        );
        let err = store.delete("k").await.unwrap_err();
        assert!(matches!(err, BlobstoreError::Auth { .. }));
        assert_eq!(store.store().requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exists_surfaces_other_errors() {
        let store = Blobstore::new(
            FaultyStore::new(access_denied),
            parse_config(STATIC_CONFIG).unwrap(),
        );
        assert!(store.exists("k").await.is_err());
    }

    #[tokio::test]
    async fn test_anonymous_mode_rejects_mutations_without_requests() {
        let store = Blobstore::new(
            FaultyStore::new(access_denied),
            parse_config(r#"{"bucket_name": "b", "credentials_source": "none"}"#).unwrap(),
        );

        let err = store
            .put(ByteStream::from_static(b"data"), "k")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobstoreError::ReadOnly));

        let err = store.delete("k").await.unwrap_err();
        assert!(matches!(err, BlobstoreError::ReadOnly));

        let err = store
            .put_file(Path::new("/nonexistent/s3blob/src"), "k")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobstoreError::ReadOnly));

        assert_eq!(store.store().requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_anonymous_mode_allows_reads() {
        let store = blobstore(r#"{"bucket_name": "b", "credentials_source": "none"}"#);
        store.store().insert("b", "public.txt", "open").await;

        assert!(store.exists("public.txt").await.unwrap());
        assert_eq!(get_bytes(&store, "public.txt").await.unwrap(), b"open");
    }

    #[tokio::test]
    async fn test_put_applies_encryption_settings() {
        let store = blobstore(
            r#"{
                "bucket_name": "b",
                "access_key_id": "A",
                "secret_access_key": "S",
                "server_side_encryption": "aws:kms",
                "sse_kms_key_id": "key-1"
            }"#,
        );
        store
            .put(ByteStream::from_static(b"secret"), "k")
            .await
            .unwrap();

        let obj = store.store().object("b", "k").await.unwrap();
        assert_eq!(obj.server_side_encryption.as_deref(), Some("aws:kms"));
        assert_eq!(obj.sse_kms_key_id.as_deref(), Some("key-1"));
    }

    #[tokio::test]
    async fn test_put_without_encryption() {
        let store = blobstore(STATIC_CONFIG);
        store.put(ByteStream::from_static(b"x"), "k").await.unwrap();
        let obj = store.store().object("b", "k").await.unwrap();
        assert_eq!(obj.server_side_encryption, None);
        assert_eq!(obj.sse_kms_key_id, None);
    }
}
