use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use axum_server::Handle;
use blob_store::{BucketHandle, ObjectBucket};
use tokio::{net::lookup_host, signal};
use tracing::{error, info};

use crate::{
    config::ProxyConfig,
    middleware::ProxyRequestSpan,
    routes::{create_routes, RouteState},
};

// In-flight uploads get this long to finish once a shutdown signal arrives.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct Service {
    pub config: ProxyConfig,
    pub instance_id: String,
    pub bucket: Arc<dyn ObjectBucket>,
}

impl Service {
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let bucket = BucketHandle::from_config(&config.bucket_config())
            .context("error initializing bucket")?;
        Ok(Self::with_bucket(config, Arc::new(bucket)))
    }

    pub fn with_bucket(config: ProxyConfig, bucket: Arc<dyn ObjectBucket>) -> Self {
        let instance_id = config.instance_id();
        Self {
            config,
            instance_id,
            bucket,
        }
    }

    pub fn routes(&self) -> axum::Router {
        let route_state = RouteState {
            bucket: self.bucket.clone(),
        };
        create_routes(
            route_state,
            ProxyRequestSpan::new(&self.config.env, &self.instance_id),
        )
    }

    pub async fn start(&self) -> Result<()> {
        let addr = resolve_listen_addr(&self.config.listen_addr).await?;

        let handle = Handle::new();
        let handle_sh = handle.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh).await;
        });

        info!(
            "Starting proxy server on address {} for bucket {}",
            self.config.listen_addr,
            self.bucket.name()
        );
        axum_server::bind(addr)
            .handle(handle)
            .serve(self.routes().into_make_service())
            .await?;

        Ok(())
    }
}

async fn resolve_listen_addr(listen_addr: &str) -> Result<SocketAddr> {
    // ":port" binds every interface.
    let listen_addr = match listen_addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => listen_addr.to_string(),
    };
    let addr = lookup_host(listen_addr.as_str())
        .await
        .with_context(|| format!("resolving listen address {}", listen_addr))?
        .next()
        .ok_or_else(|| anyhow!("listen address {} resolved to nothing", listen_addr));
    addr
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {:?}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("failed to install signal handler: {:?}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
    info!("signal received, shutting down server gracefully");
}
