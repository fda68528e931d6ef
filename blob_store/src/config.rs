//! Bucket configuration.

use std::path::PathBuf;

use url::Url;

use crate::{BlobError, BlobResult};

/// Configuration for the proxied bucket.
#[derive(Debug, Clone, Default)]
pub struct BucketConfig {
    /// A bare bucket name (Google Cloud Storage) or a bucket URL:
    /// `gs://bucket`, `s3://bucket`, `file:///path/to/dir` or `memory://`.
    pub bucket: String,
}

impl BucketConfig {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
        }
    }

    pub fn location(&self) -> BlobResult<BucketLocation> {
        BucketLocation::parse(&self.bucket)
    }
}

/// Where the bucket lives, resolved from [`BucketConfig::bucket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketLocation {
    Gcs { bucket: String },
    S3 { bucket: String },
    Local { root: PathBuf },
    Memory,
}

impl BucketLocation {
    pub fn parse(bucket: &str) -> BlobResult<Self> {
        if bucket.is_empty() {
            return Err(BlobError::InvalidUri {
                uri: bucket.to_string(),
                reason: "bucket name is empty".to_string(),
            });
        }
        if !bucket.contains("://") {
            return Ok(BucketLocation::Gcs {
                bucket: bucket.to_string(),
            });
        }

        let url = Url::parse(bucket).map_err(|e| BlobError::InvalidUri {
            uri: bucket.to_string(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "gs" => Ok(BucketLocation::Gcs {
                bucket: Self::host(bucket, &url)?,
            }),
            "s3" => Ok(BucketLocation::S3 {
                bucket: Self::host(bucket, &url)?,
            }),
            "file" => {
                let root = url.to_file_path().map_err(|_| BlobError::InvalidUri {
                    uri: bucket.to_string(),
                    reason: "not an absolute file path".to_string(),
                })?;
                Ok(BucketLocation::Local { root })
            }
            "memory" => Ok(BucketLocation::Memory),
            scheme => Err(BlobError::UnsupportedBackend {
                scheme: scheme.to_string(),
            }),
        }
    }

    fn host(bucket: &str, url: &Url) -> BlobResult<String> {
        match url.host_str() {
            Some(host) if !host.is_empty() => Ok(host.to_string()),
            _ => Err(BlobError::InvalidUri {
                uri: bucket.to_string(),
                reason: "missing bucket name".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_is_gcs() {
        let location = BucketLocation::parse("my-nix-cache").unwrap();
        assert_eq!(
            location,
            BucketLocation::Gcs {
                bucket: "my-nix-cache".to_string()
            }
        );
    }

    #[test]
    fn test_parse_bucket_urls() {
        assert_eq!(
            BucketLocation::parse("gs://cache").unwrap(),
            BucketLocation::Gcs {
                bucket: "cache".to_string()
            }
        );
        assert_eq!(
            BucketLocation::parse("s3://cache").unwrap(),
            BucketLocation::S3 {
                bucket: "cache".to_string()
            }
        );
        assert_eq!(
            BucketLocation::parse("file:///var/lib/cache").unwrap(),
            BucketLocation::Local {
                root: PathBuf::from("/var/lib/cache")
            }
        );
        assert_eq!(
            BucketLocation::parse("memory://").unwrap(),
            BucketLocation::Memory
        );
    }

    #[test]
    fn test_parse_rejects_bad_buckets() {
        assert!(matches!(
            BucketLocation::parse(""),
            Err(BlobError::InvalidUri { .. })
        ));
        assert!(matches!(
            BucketLocation::parse("gs://"),
            Err(BlobError::InvalidUri { .. })
        ));
        assert!(matches!(
            BucketLocation::parse("ftp://cache"),
            Err(BlobError::UnsupportedBackend { .. })
        ));
    }
}
