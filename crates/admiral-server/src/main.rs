use admiral_server::config::ServerConfig;
use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from the file named by ADMIRAL_CONFIG and the environment
    let config = ServerConfig::load().context("Failed to load configuration")?;

    // Set up monitoring
    admiral_monitoring::init(&config.monitoring_config()).context("Failed to initialize monitoring")?;
    install_metrics_exporter(&config)?;

    admiral_server::run(config).await.context("Server error")?;

    Ok(())
}

#[cfg(feature = "prometheus")]
fn install_metrics_exporter(config: &ServerConfig) -> Result<()> {
    if let Some(addr) = config.metrics_addr()? {
        admiral_monitoring::install_prometheus_exporter(addr)?;
    }
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics_exporter(config: &ServerConfig) -> Result<()> {
    if config.metrics_listen_addr.is_some() {
        tracing::warn!("metrics_listen_addr is set but the prometheus feature is disabled");
    }
    Ok(())
}
