//! Bucket access for the proxy.
//!
//! This crate exposes the three object operations the HTTP proxy is built on,
//! over the `object_store` crate:
//!
//! - `stat`: attributes of an object, without its content
//! - `open_reader`: a byte stream over an object's content
//! - `open_writer`: a streaming writer that commits on `finalize`
//!
//! Supported buckets are Google Cloud Storage (the default for a bare bucket
//! name), S3, a local directory and an in-memory store.
//!
//! # Usage
//!
//! ```rust,no_run
//! use blob_store::{BucketConfig, BucketHandle, ObjectBucket, ObjectMetadata};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), blob_store::BlobError> {
//! let bucket = BucketHandle::from_config(&BucketConfig::new("my-nix-cache"))?;
//!
//! let mut writer = bucket
//!     .open_writer("nix-cache-info", ObjectMetadata::default())
//!     .await?;
//! writer.write(Bytes::from("StoreDir: /nix/store\n")).await?;
//! writer.finalize().await?;
//!
//! let attributes = bucket.stat("nix-cache-info").await?;
//! assert_eq!(attributes.size_bytes, 21);
//! # Ok(())
//! # }
//! ```

mod bucket;
mod config;
mod error;
mod metadata;
mod metrics;
mod writer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bucket::{BucketHandle, ObjectBucket, ObjectReader};
pub use config::{BucketConfig, BucketLocation};
pub use error::{BlobError, BlobResult};
pub use metadata::{MetadataField, ObjectAttributes, ObjectMetadata};
pub use metrics::{BlobMetrics, Timer};
pub use writer::{MultipartObjectWriter, ObjectWriter};
