use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
    Mutex,
};

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use blob_store::{
    BlobError,
    BlobResult,
    BucketHandle,
    ObjectAttributes,
    ObjectBucket,
    ObjectMetadata,
    ObjectReader,
    ObjectWriter,
};
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower::ServiceExt;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{config::ProxyConfig, service::Service};

pub struct TestService {
    pub service: Service,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

impl TestService {
    pub fn new() -> Self {
        Self::with_bucket(Arc::new(BucketHandle::in_memory()))
    }

    pub fn with_bucket(bucket: Arc<dyn ObjectBucket>) -> Self {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
        let _ = subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
        );

        let config = ProxyConfig {
            bucket_name: bucket.name().to_string(),
            ..Default::default()
        };
        Self {
            service: Service::with_bucket(config, bucket),
        }
    }

    pub fn router(&self) -> Router {
        self.service.routes()
    }

    pub fn bucket(&self) -> Arc<dyn ObjectBucket> {
        self.service.bucket.clone()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: Body,
    ) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = self
            .router()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn put(
        &self,
        uri: &str,
        headers: &[(&str, &str)],
        body: &'static str,
    ) -> TestResponse {
        self.request(Method::PUT, uri, headers, Body::from(body))
            .await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, &[], Body::empty()).await
    }

    pub async fn head(&self, uri: &str) -> TestResponse {
        self.request(Method::HEAD, uri, &[], Body::empty()).await
    }
}

/// Where a [`FailingBucket`] writer should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Nothing,
    Write,
    Finalize,
}

#[derive(Default)]
pub struct WriterEvents {
    pub writes: AtomicUsize,
    pub finalized: AtomicBool,
    pub aborted: AtomicBool,
}

/// A bucket whose reads fail with a fixed message and whose writers fail at a
/// chosen step.
pub struct FailingBucket {
    message: String,
    fail_at: FailAt,
    pub events: Arc<WriterEvents>,
}

impl FailingBucket {
    pub fn new(message: &str, fail_at: FailAt) -> Self {
        Self {
            message: message.to_string(),
            fail_at,
            events: Arc::new(WriterEvents::default()),
        }
    }

    fn error(&self) -> BlobError {
        BlobError::Other {
            source: anyhow!(self.message.clone()),
        }
    }
}

#[async_trait]
impl ObjectBucket for FailingBucket {
    fn name(&self) -> &str {
        "failing"
    }

    async fn stat(&self, _key: &str) -> BlobResult<ObjectAttributes> {
        Err(self.error())
    }

    async fn open_reader(&self, _key: &str) -> BlobResult<ObjectReader> {
        Err(self.error())
    }

    async fn open_writer(
        &self,
        _key: &str,
        _metadata: ObjectMetadata,
    ) -> BlobResult<Box<dyn ObjectWriter>> {
        Ok(Box::new(FailingWriter {
            message: self.message.clone(),
            fail_at: self.fail_at,
            events: self.events.clone(),
        }))
    }
}

struct FailingWriter {
    message: String,
    fail_at: FailAt,
    events: Arc<WriterEvents>,
}

#[async_trait]
impl ObjectWriter for FailingWriter {
    async fn write(&mut self, _chunk: Bytes) -> BlobResult<()> {
        self.events.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == FailAt::Write {
            return Err(BlobError::Other {
                source: anyhow!(self.message.clone()),
            });
        }
        Ok(())
    }

    async fn finalize(self: Box<Self>) -> BlobResult<()> {
        if self.fail_at == FailAt::Finalize {
            return Err(BlobError::Other {
                source: anyhow!(self.message.clone()),
            });
        }
        self.events.finalized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn abort(self: Box<Self>) -> BlobResult<()> {
        self.events.aborted.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A bucket whose single readable object is fed chunk by chunk by the test.
pub struct ChannelBucket {
    receiver: Mutex<Option<mpsc::Receiver<BlobResult<Bytes>>>>,
}

impl ChannelBucket {
    pub fn new() -> (Self, mpsc::Sender<BlobResult<Bytes>>) {
        let (tx, rx) = mpsc::channel(1);
        (
            Self {
                receiver: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait]
impl ObjectBucket for ChannelBucket {
    fn name(&self) -> &str {
        "channel"
    }

    async fn stat(&self, key: &str) -> BlobResult<ObjectAttributes> {
        Err(BlobError::NotFound {
            key: key.to_string(),
        })
    }

    async fn open_reader(&self, key: &str) -> BlobResult<ObjectReader> {
        let receiver = self.receiver.lock().unwrap().take();
        match receiver {
            Some(rx) => Ok(ReceiverStream::new(rx).boxed()),
            None => Err(BlobError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn open_writer(
        &self,
        key: &str,
        _metadata: ObjectMetadata,
    ) -> BlobResult<Box<dyn ObjectWriter>> {
        Err(BlobError::InvalidKey {
            key: key.to_string(),
            reason: "read-only bucket".to_string(),
        })
    }
}
