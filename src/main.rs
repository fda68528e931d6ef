use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use service::Service;

mod config;
mod http_objects;
mod middleware;
mod routes;
mod service;
mod tracing;
use config::{ConfigOverrides, ProxyConfig};
use tracing::setup_tracing;

#[cfg(test)]
mod testing;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "config file", help = "Path to config file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "bucket",
        help = "name of the bucket to proxy the data to"
    )]
    bucket_name: Option<String>,

    #[arg(
        long,
        value_name = "host:port",
        help = "listening address of the HTTP server [default: localhost:3000]"
    )]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ProxyConfig::load(
        cli.config.as_deref(),
        ConfigOverrides {
            bucket_name: cli.bucket_name,
            listen_addr: cli.addr,
        },
    )?;

    let tracer_provider = setup_tracing(&config)?;
    ::tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        built_at = env!("VERGEN_BUILD_TIMESTAMP"),
        "gcs-bucket-proxy"
    );

    let result = start_proxy(config).await;

    // export traces before shutdown
    if let Some(tracer_provider) = tracer_provider {
        if let Err(err) = tracer_provider.force_flush() {
            ::tracing::error!("Error flushing traces: {:?}", err);
        }
        if let Err(err) = tracer_provider.shutdown() {
            ::tracing::error!("Error shutting down tracer provider: {:?}", err);
        }
    }
    result
}

#[::tracing::instrument(skip(config), fields(env = %config.env))]
async fn start_proxy(config: ProxyConfig) -> anyhow::Result<()> {
    let service = Service::new(config).context("Failed to create service")?;
    service.start().await.context("Failed to start service")
}
