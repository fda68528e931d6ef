use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use blob_store::{BlobError, MetadataField, ObjectBucket, ObjectMetadata};
use futures::{StreamExt, TryStreamExt};
use tower_http::{
    catch_panic::CatchPanicLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{error, warn, Level};

use crate::{http_objects::ProxyAPIError, middleware::ProxyRequestSpan};

/// Request headers stored as object metadata on PUT.
const METADATA_HEADERS: [(&str, MetadataField); 5] = [
    ("content-type", MetadataField::ContentType),
    ("content-language", MetadataField::ContentLanguage),
    ("content-encoding", MetadataField::ContentEncoding),
    ("content-disposition", MetadataField::ContentDisposition),
    ("cache-control", MetadataField::CacheControl),
];

#[derive(Clone)]
pub struct RouteState {
    pub bucket: Arc<dyn ObjectBucket>,
}

pub fn create_routes(route_state: RouteState, request_span: ProxyRequestSpan) -> Router {
    Router::new()
        .route("/", any(proxy_bucket_root))
        .route("/{*key}", any(proxy_object))
        .with_state(route_state)
        .layer(DefaultBodyLimit::disable())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CatchPanicLayer::new())
}

async fn proxy_object(
    State(state): State<RouteState>,
    Path(key): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ProxyAPIError> {
    serve_object(state.bucket.as_ref(), &key, method, &headers, body).await
}

// `/` carries no key; it is handed to the bucket as the empty key.
async fn proxy_bucket_root(
    State(state): State<RouteState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ProxyAPIError> {
    serve_object(state.bucket.as_ref(), "", method, &headers, body).await
}

async fn serve_object(
    bucket: &dyn ObjectBucket,
    key: &str,
    method: Method,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, ProxyAPIError> {
    match method {
        Method::HEAD => head_object(bucket, key).await,
        Method::GET => get_object(bucket, key).await,
        Method::PUT => put_object(bucket, key, headers, body).await,
        _ => Err(ProxyAPIError::method_not_allowed(&method)),
    }
}

async fn head_object(bucket: &dyn ObjectBucket, key: &str) -> Result<Response, ProxyAPIError> {
    bucket.stat(key).await?;
    Ok(StatusCode::OK.into_response())
}

async fn get_object(bucket: &dyn ObjectBucket, key: &str) -> Result<Response, ProxyAPIError> {
    let reader = bucket.open_reader(key).await?;

    let key = key.to_string();
    let reader = reader.inspect_err(move |e| {
        warn!(key = %key, error = %e, "object read failed mid-response");
    });
    Ok((StatusCode::OK, Body::from_stream(reader)).into_response())
}

async fn put_object(
    bucket: &dyn ObjectBucket,
    key: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, ProxyAPIError> {
    let mut writer = bucket
        .open_writer(key, object_metadata(headers))
        .await
        .map_err(|e| {
            error!(key, error = %e, "failed to open object writer");
            ProxyAPIError::bad_gateway(&e)
        })?;

    let mut body = body.into_data_stream();
    while let Some(chunk) = body.next().await {
        let copied = match chunk {
            Ok(chunk) => writer.write(chunk).await,
            Err(e) => Err(BlobError::Other {
                source: anyhow!(e),
            }),
        };
        if let Err(e) = copied {
            error!(key, error = %e, "failed to copy request body to object");
            if let Err(abort_err) = writer.abort().await {
                warn!(key, error = %abort_err, "failed to abort object upload");
            }
            return Err(ProxyAPIError::bad_gateway(&e));
        }
    }

    writer.finalize().await.map_err(|e| {
        error!(key, error = %e, "failed to finalize object");
        ProxyAPIError::bad_gateway(&e)
    })?;

    Ok((StatusCode::OK, "OK").into_response())
}

fn object_metadata(headers: &HeaderMap) -> ObjectMetadata {
    let mut metadata = ObjectMetadata::default();
    for (name, field) in METADATA_HEADERS {
        if let Some(value) = headers.get(name) {
            metadata.set(field, String::from_utf8_lossy(value.as_bytes()));
        }
    }
    metadata
}
