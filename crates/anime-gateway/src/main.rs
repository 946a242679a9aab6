//! anime-gateway: request dispatcher and range-aware media proxy for the
//! anime content API.

mod catalog;
mod config;
mod cors;
mod dispatch;
mod envelope;
mod error;
mod fallback;
mod proxy;
mod routes;
mod server;

use std::sync::Arc;

use catalog::BackendSource;
use config::GatewayConfig;
use dispatch::Dispatcher;
use fallback::NotFoundPage;
use proxy::StreamProxy;
use server::AppState;

fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1).cloned())
        .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
        .or_else(|| std::env::var("GATEWAY_CONFIG").ok())
        .unwrap_or_else(|| "anime-gateway.toml".to_string());

    let port_override = args
        .iter()
        .position(|a| a == "--port")
        .and_then(|i| args.get(i + 1))
        .map(|p| p.parse::<u16>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid --port: {e}"))?;

    let mut config = GatewayConfig::load(&config_path)?;
    if let Some(port) = port_override {
        config.server.set_port(port);
    }

    // Build the tokio runtime first; the tonic gRPC exporter needs a reactor context
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let tracing_guard = gateway_tracing::init_tracing(&config.tracing);

        tracing::info!(
            config_path = %config_path,
            listen_address = %config.server.listen_address,
            catalog_backend = ?config.catalog.backend_url,
            forward_range = config.proxy.forward_range,
            otlp_export = tracing_guard.is_exporting(),
            "Starting anime-gateway"
        );

        run(config).await
    })
}

async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let source = BackendSource::new(
        config.catalog.backend_url.clone(),
        std::time::Duration::from_secs(config.catalog.timeout_secs),
    )?;
    let proxy = StreamProxy::new(&config.proxy)?;

    let routes = routes::api_routes(Arc::new(source), proxy)?;
    let dispatcher = Dispatcher::new(routes, NotFoundPage::new(&config.server.public_dir));

    let state = AppState { config, dispatcher };

    server::run(state).await
}
