use std::{net::SocketAddr, path::Path};

use anyhow::{anyhow, Context, Result};
use blob_store::BucketConfig;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const LOCAL_ENV: &str = "local";
const ENV_PREFIX: &str = "GCS_PROXY_";
pub const DEFAULT_LISTEN_ADDR: &str = "localhost:3000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    // Export spans over OTLP.
    #[serde(default)]
    pub enable_tracing: bool,
    // OpenTelemetry collector grpc endpoint.
    // Defaults to OTEL_EXPORTER_OTLP_ENDPOINT or localhost:4317 if empty.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
}

/// Values given on the command line. They win over the config file and the
/// environment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_addr: Option<String>,
}

fn default_env() -> String {
    LOCAL_ENV.to_string()
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            env: default_env(),
            listen_addr: default_listen_addr(),
            bucket_name: String::new(),
            telemetry: Default::default(),
        }
    }
}

impl ProxyConfig {
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<ProxyConfig> {
        let config_str = match path {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?,
            ),
            None => None,
        };
        Self::from_sources(config_str.as_deref(), overrides)
    }

    fn from_sources(config_str: Option<&str>, overrides: ConfigOverrides) -> Result<ProxyConfig> {
        let mut figment = Figment::from(Serialized::defaults(ProxyConfig::default()));
        if let Some(config_str) = config_str {
            figment = figment.merge(Yaml::string(config_str));
        }
        let config: ProxyConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket_name.is_empty() {
            return Err(anyhow!("please specify a bucket name"));
        }
        if self.listen_addr.parse::<SocketAddr>().is_ok() {
            return Ok(());
        }
        match self.listen_addr.rsplit_once(':') {
            // An empty host (":3000") listens on all interfaces.
            Some((_, port)) if port.parse::<u16>().is_ok() => Ok(()),
            _ => Err(anyhow!("invalid listen address: {}", self.listen_addr)),
        }
    }

    pub fn bucket_config(&self) -> BucketConfig {
        BucketConfig::new(&self.bucket_name)
    }

    pub fn structured_logging(&self) -> bool {
        self.env != LOCAL_ENV
    }

    pub fn instance_id(&self) -> String {
        self.telemetry
            .instance_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.env, Uuid::new_v4()))
    }
}
