use std::sync::Arc;

use anyhow::Context;

use wgrid_api::app::{self, services};
use wgrid_coordination::{AnomalyScanner, EngineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wgrid_observability::init();

    let config = EngineConfig::from_env()?;
    let services = Arc::new(services::build_services(&config)?);

    let scanner = if config.scan_interval.is_zero() {
        tracing::info!("background anomaly scanning disabled");
        None
    } else {
        let handle = AnomalyScanner::with_interval(config.scan_interval)
            .spawn("anomaly-scanner", services.facade_handle())
            .context("failed to start anomaly scanner")?;
        Some(handle)
    };

    let router = app::build_app(config.jwt_secret.clone(), services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    if let Some(handle) = scanner {
        handle.shutdown();
    }
    Ok(())
}
