use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// Install the global Prometheus recorder with an HTTP scrape endpoint
///
/// Must be called from inside a tokio runtime.
pub fn init_metrics(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("Invalid metrics bind address: {bind_address}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Metrics initialized with Prometheus exporter on {}", addr);
    Ok(())
}
