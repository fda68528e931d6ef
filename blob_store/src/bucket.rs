//! Bucket handle: the object operations the proxy needs, over `object_store`.

use std::{env, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use object_store::{
    aws::AmazonS3Builder,
    gcp::GoogleCloudStorageBuilder,
    local::LocalFileSystem,
    memory::InMemory,
    path::Path,
    Attributes,
    GetOptions,
    ObjectStore,
    PutMultipartOptions,
};
use tracing::{info, warn};

use crate::{
    BlobError,
    BlobMetrics,
    BlobResult,
    BucketConfig,
    BucketLocation,
    MultipartObjectWriter,
    ObjectAttributes,
    ObjectMetadata,
    ObjectWriter,
};

/// Byte stream of an object's content.
pub type ObjectReader = BoxStream<'static, BlobResult<Bytes>>;

/// Object operations on a single bucket.
///
/// Implementations are shared across all in-flight requests and must not rely
/// on interior mutation.
#[async_trait]
pub trait ObjectBucket: Send + Sync {
    /// Bucket name, for logging.
    fn name(&self) -> &str;

    /// Looks up an object's attributes without reading its content.
    ///
    /// Returns `BlobError::NotFound` if the object doesn't exist.
    async fn stat(&self, key: &str) -> BlobResult<ObjectAttributes>;

    /// Opens a stream over the object's content.
    ///
    /// Returns `BlobError::NotFound` if the object doesn't exist. Errors while
    /// reading surface as items of the stream.
    async fn open_reader(&self, key: &str) -> BlobResult<ObjectReader>;

    /// Starts a write of `key` carrying `metadata`.
    ///
    /// Store errors surface on [`ObjectWriter::write`] and
    /// [`ObjectWriter::finalize`]; this only fails for keys that can't be
    /// expressed as an object path.
    async fn open_writer(
        &self,
        key: &str,
        metadata: ObjectMetadata,
    ) -> BlobResult<Box<dyn ObjectWriter>>;
}

#[derive(Clone)]
pub struct BucketHandle {
    name: String,
    object_store: Arc<dyn ObjectStore>,
    supports_attributes: bool,
    metrics: BlobMetrics,
}

impl Debug for BucketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketHandle")
            .field("name", &self.name)
            .field("object_store", &self.object_store.to_string())
            .finish()
    }
}

impl BucketHandle {
    pub fn from_config(config: &BucketConfig) -> BlobResult<Self> {
        let location = config.location()?;
        let handle = match location {
            BucketLocation::Gcs { bucket } => {
                let store = GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(&bucket)
                    .build()?;
                Self::new(&bucket, Arc::new(store))
            }
            BucketLocation::S3 { bucket } => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(&bucket);
                // For supporting localstack/minio for testing
                if let Ok(endpoint) = env::var("AWS_ENDPOINT_URL") {
                    if endpoint.starts_with("http://") {
                        builder = builder.with_allow_http(true);
                    }
                    builder = builder.with_endpoint(endpoint);
                }
                Self::new(&bucket, Arc::new(builder.build()?))
            }
            BucketLocation::Local { root } => {
                std::fs::create_dir_all(&root)?;
                let store = LocalFileSystem::new_with_prefix(&root)?;
                let mut handle = Self::new(&root.to_string_lossy(), Arc::new(store));
                // The local filesystem has nowhere to keep object metadata.
                handle.supports_attributes = false;
                handle
            }
            BucketLocation::Memory => Self::in_memory(),
        };
        info!(bucket = %handle.name, store = %handle.object_store, "created bucket handle");
        Ok(handle)
    }

    pub fn new(name: &str, object_store: Arc<dyn ObjectStore>) -> Self {
        Self {
            name: name.to_string(),
            object_store,
            supports_attributes: true,
            metrics: BlobMetrics::from_global(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new("memory", Arc::new(InMemory::new()))
    }

    fn path(key: &str) -> BlobResult<Path> {
        let path = Path::parse(key).map_err(|e| BlobError::InvalidKey {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        // Path::parse strips one leading and one trailing delimiter.
        if path.as_ref() != key {
            return Err(BlobError::InvalidKey {
                key: key.to_string(),
                reason: "leading or trailing '/' is not supported".to_string(),
            });
        }
        Ok(path)
    }

    fn record(&self, op: &'static str, err: BlobError) -> BlobError {
        if !err.is_not_found() {
            self.metrics.record_error(op);
        }
        err
    }
}

#[async_trait]
impl ObjectBucket for BucketHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stat(&self, key: &str) -> BlobResult<ObjectAttributes> {
        let _timer = self.metrics.timer("stat");
        let path = Self::path(key)?;
        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = self
            .object_store
            .get_opts(&path, options)
            .await
            .map_err(|e| self.record("stat", e.into()))?;
        Ok(ObjectAttributes::new(result.meta, &result.attributes))
    }

    async fn open_reader(&self, key: &str) -> BlobResult<ObjectReader> {
        let _timer = self.metrics.timer("get");
        let path = Self::path(key)?;
        let result = self
            .object_store
            .get(&path)
            .await
            .map_err(|e| self.record("get", e.into()))?;
        let metrics = self.metrics.clone();
        Ok(result
            .into_stream()
            .map(move |chunk| {
                chunk.map_err(|e| {
                    metrics.record_error("get");
                    BlobError::from(e)
                })
            })
            .boxed())
    }

    async fn open_writer(
        &self,
        key: &str,
        metadata: ObjectMetadata,
    ) -> BlobResult<Box<dyn ObjectWriter>> {
        let path = Self::path(key)?;
        let attributes = if self.supports_attributes {
            Attributes::from(&metadata)
        } else {
            if !metadata.is_empty() {
                warn!(bucket = %self.name, key, "bucket can't store object metadata, dropping it");
            }
            Attributes::new()
        };
        let opts = PutMultipartOptions {
            attributes,
            ..Default::default()
        };
        Ok(Box::new(MultipartObjectWriter::new(
            self.object_store.clone(),
            path,
            opts,
            self.metrics.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use tempfile::TempDir;

    use super::*;
    use crate::MetadataField;

    async fn put(bucket: &BucketHandle, key: &str, data: &'static str, metadata: ObjectMetadata) {
        let mut writer = bucket.open_writer(key, metadata).await.unwrap();
        writer.write(Bytes::from(data)).await.unwrap();
        writer.finalize().await.unwrap();
    }

    async fn read(bucket: &BucketHandle, key: &str) -> Vec<u8> {
        let chunks: Vec<Bytes> = bucket
            .open_reader(key)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_put_stat_get() {
        let bucket = BucketHandle::in_memory();
        let mut metadata = ObjectMetadata::default();
        metadata.set(MetadataField::ContentType, "application/x-nix-narinfo");
        metadata.set(MetadataField::CacheControl, "max-age=3600");

        put(&bucket, "abc.narinfo", "StorePath: /nix/store/abc", metadata.clone()).await;

        let attributes = bucket.stat("abc.narinfo").await.unwrap();
        assert_eq!(attributes.size_bytes, 25);
        assert_eq!(attributes.metadata, metadata);
        assert_eq!(read(&bucket, "abc.narinfo").await, b"StorePath: /nix/store/abc");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let bucket = BucketHandle::in_memory();
        assert!(bucket.stat("missing").await.unwrap_err().is_not_found());
        assert!(bucket
            .open_reader("missing")
            .await
            .err()
            .unwrap()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_invalid_key_is_rejected() {
        let bucket = BucketHandle::in_memory();
        let err = bucket.stat("a//b").await.unwrap_err();
        assert!(matches!(err, BlobError::InvalidKey { .. }));
        let err = bucket
            .open_writer("../escape", ObjectMetadata::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BlobError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn test_keys_are_not_normalized() {
        let bucket = BucketHandle::in_memory();
        put(&bucket, "foo", "plain", ObjectMetadata::default()).await;

        for key in ["foo/", "/foo", "/", "nar/"] {
            let err = bucket
                .open_writer(key, ObjectMetadata::default())
                .await
                .err()
                .unwrap();
            assert!(matches!(err, BlobError::InvalidKey { .. }), "{key}");
            assert!(matches!(
                bucket.stat(key).await.unwrap_err(),
                BlobError::InvalidKey { .. }
            ));
        }

        assert_eq!(read(&bucket, "foo").await, b"plain");
        assert!(bucket.stat("").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_local_bucket_drops_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let config = BucketConfig::new(&format!("file://{}", temp_dir.path().display()));
        let bucket = BucketHandle::from_config(&config).unwrap();

        let mut metadata = ObjectMetadata::default();
        metadata.set(MetadataField::ContentType, "text/plain");
        put(&bucket, "foo/bar.txt", "hello", metadata).await;

        assert_eq!(read(&bucket, "foo/bar.txt").await, b"hello");
        assert!(temp_dir.path().join("foo/bar.txt").exists());
        let attributes = bucket.stat("foo/bar.txt").await.unwrap();
        assert!(attributes.metadata.is_empty());
    }
}
