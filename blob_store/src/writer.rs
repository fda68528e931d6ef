//! Streaming object writer backed by an object store multipart upload.

use std::{mem, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::{path::Path, ObjectStore, PutMultipartOptions, WriteMultipart};
use tracing::{debug, warn};

use crate::{metrics::Timer, BlobError, BlobMetrics, BlobResult};

// Parts buffered or in flight before `write` waits on the store.
const MAX_INFLIGHT_PARTS: usize = 2;

/// A write in progress.
///
/// Nothing is visible to readers until [`ObjectWriter::finalize`] succeeds.
/// A writer dropped before it is finalized or aborted aborts its upload in the
/// background.
#[async_trait]
pub trait ObjectWriter: Send {
    async fn write(&mut self, chunk: Bytes) -> BlobResult<()>;

    async fn finalize(self: Box<Self>) -> BlobResult<()>;

    async fn abort(self: Box<Self>) -> BlobResult<()>;
}

enum WriterState {
    // The upload is only created on the first write or on finalize.
    Pending {
        object_store: Arc<dyn ObjectStore>,
        opts: PutMultipartOptions,
    },
    Uploading(WriteMultipart),
    Closed,
}

pub struct MultipartObjectWriter {
    path: Path,
    state: WriterState,
    size_bytes: usize,
    metrics: BlobMetrics,
    _timer: Timer,
}

impl MultipartObjectWriter {
    pub(crate) fn new(
        object_store: Arc<dyn ObjectStore>,
        path: Path,
        opts: PutMultipartOptions,
        metrics: BlobMetrics,
    ) -> Self {
        let timer = metrics.timer("put");
        Self {
            path,
            state: WriterState::Pending { object_store, opts },
            size_bytes: 0,
            metrics,
            _timer: timer,
        }
    }

    async fn upload(&mut self) -> BlobResult<&mut WriteMultipart> {
        self.state = match mem::replace(&mut self.state, WriterState::Closed) {
            WriterState::Pending { object_store, opts } => {
                let upload = object_store
                    .put_multipart_opts(&self.path, opts)
                    .await
                    .inspect_err(|_| self.metrics.record_error("put"))?;
                WriterState::Uploading(WriteMultipart::new(upload))
            }
            state => state,
        };
        match &mut self.state {
            WriterState::Uploading(writer) => Ok(writer),
            _ => Err(BlobError::Other {
                source: anyhow!("writer for {} is already closed", self.path),
            }),
        }
    }
}

#[async_trait]
impl ObjectWriter for MultipartObjectWriter {
    async fn write(&mut self, chunk: Bytes) -> BlobResult<()> {
        let len = chunk.len();
        let metrics = self.metrics.clone();
        let writer = self.upload().await?;
        writer
            .wait_for_capacity(MAX_INFLIGHT_PARTS)
            .await
            .inspect_err(|_| metrics.record_error("put"))?;
        writer.write(&chunk);
        self.size_bytes += len;
        Ok(())
    }

    async fn finalize(self: Box<Self>) -> BlobResult<()> {
        let mut this = *self;
        this.upload().await?;
        if let WriterState::Uploading(writer) = mem::replace(&mut this.state, WriterState::Closed)
        {
            writer
                .finish()
                .await
                .inspect_err(|_| this.metrics.record_error("put"))?;
        }
        debug!(path = %this.path, size_bytes = this.size_bytes, "object committed");
        Ok(())
    }

    async fn abort(self: Box<Self>) -> BlobResult<()> {
        let mut this = *self;
        if let WriterState::Uploading(writer) = mem::replace(&mut this.state, WriterState::Closed)
        {
            writer.abort().await?;
            debug!(path = %this.path, "upload aborted");
        }
        Ok(())
    }
}

impl Drop for MultipartObjectWriter {
    fn drop(&mut self) {
        let WriterState::Uploading(writer) = mem::replace(&mut self.state, WriterState::Closed)
        else {
            return;
        };
        let path = self.path.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match writer.abort().await {
                        Ok(()) => debug!(path = %path, "abandoned upload aborted"),
                        Err(err) => {
                            warn!(path = %path, error = %err, "failed to abort abandoned upload")
                        }
                    }
                });
            }
            Err(_) => warn!(path = %path, "no runtime to abort abandoned upload"),
        }
    }
}
