//! Configuration types and loading logic.

use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use gateway_tracing::TracingConfig;
use serde::Deserialize;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Server listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Directory holding `404.html`.
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
}

/// Streaming proxy upstream settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Deadline for the upstream to answer with a status line and headers.
    #[serde(default = "default_proxy_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Longest idle gap tolerated between upstream body chunks.
    #[serde(default = "default_proxy_timeout")]
    pub read_timeout_secs: u64,

    /// Forward the client's `Range` header upstream. Turning this off
    /// reproduces the older proxy variant and is deprecated.
    #[serde(default = "default_true")]
    pub forward_range: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Content backend serving the domain endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Base URL the domain endpoints are forwarded to. Unset means every
    /// domain endpoint answers 503.
    #[serde(default)]
    pub backend_url: Option<String>,

    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

fn default_listen_address() -> String {
    "0.0.0.0:4444".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_true() -> bool {
    true
}

fn default_proxy_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_catalog_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            public_dir: default_public_dir(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_proxy_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_proxy_timeout(),
            forward_range: true,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            timeout_secs: default_catalog_timeout(),
        }
    }
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl ServerConfig {
    /// Replace the port of `listen_address`, keeping its host.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .listen_address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("0.0.0.0");
        self.listen_address = format!("{host}:{port}");
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. `PORT` (port of `server.listen_address` only)
    /// 2. Environment variables (GATEWAY_ prefix, __ for nesting)
    /// 3. TOML config file
    /// 4. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("GATEWAY_").split("__"));
        let mut config = Self::from_figment(figment)?;

        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT {port:?}: {e}"))?;
            config.server.set_port(port);
        }

        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        Ok(figment.extract()?)
    }
}
