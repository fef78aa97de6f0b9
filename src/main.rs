use std::sync::Arc;

use anyhow::Context;
use preorder_admin::{build_registry, Dashboard};
use preorder_kernel::{InitCtx, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load preorder settings")?;
    preorder_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        test_mode = settings.dashboard.test_mode,
        shopify_configured = settings.shopify.is_configured(),
        "preorder-admin starting"
    );

    let dashboard = Arc::new(Dashboard::from_settings(&settings)?);
    let registry = build_registry(dashboard);

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    preorder_http::start_server(&registry, &settings, shutdown_signal()).await?;

    registry.stop_all().await?;
    tracing::info!("preorder-admin stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
