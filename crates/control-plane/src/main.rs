// Mailplate API server
// Decision: Binary is a thin shell over the library; all wiring lives in AppContext

use anyhow::{Context, Result};
use mailplate_control_plane::auth::{bootstrap_superadmin, AuthConfig};
use mailplate_control_plane::config::ServerConfig;
use mailplate_control_plane::{serve, AppContext};
use mailplate_core::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // RUST_LOG / LOG_FORMAT / SERVICE_NAME are read from the environment
    let mut telemetry_config = TelemetryConfig::from_env();
    if telemetry_config.service_name == "mailplate" {
        telemetry_config.service_name = "mailplate-control-plane".to_string();
    }
    if telemetry_config.log_filter.is_none() {
        telemetry_config.log_filter =
            Some("mailplate_control_plane=debug,tower_http=debug".to_string());
    }
    telemetry_config.service_version = Some(env!("CARGO_PKG_VERSION").to_string());
    init_telemetry(telemetry_config);

    tracing::info!("mailplate-control-plane starting...");

    let config = ServerConfig::from_env();
    let auth_config = AuthConfig::from_env();
    let ctx = AppContext::new(config, auth_config).context("Failed to build application")?;
    tracing::info!(
        delivery_mode = %ctx.bus.mode(),
        webhook_timeout_ms = ctx.config.webhook_timeout.as_millis() as u64,
        "Notification pipeline configured"
    );

    bootstrap_superadmin(&ctx.auth)
        .await
        .context("Failed to bootstrap superadmin")?;

    let addr = ctx.config.http_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("HTTP server listening on {}", addr);

    serve(&ctx, listener, shutdown_signal()).await?;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
