use parish_admin::config::get_configuration;
use parish_admin::services::{
    metrics::init_metrics, GoTrueClient, HomilyApiClient, MemoryRoleDirectory, PgRoleDirectory,
    RoleDirectory,
};
use parish_admin::startup::build_router;
use parish_admin::AppState;
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "parish-admin",
        &configuration.log_level,
        configuration.otlp_endpoint.as_deref(),
    );
    init_metrics()?;

    tracing::info!(
        environment = ?configuration.environment,
        hosted_url = %configuration.hosted.url,
        ancillary_url = %configuration.ancillary.url,
        "Starting parish-admin"
    );

    let roles: Arc<dyn RoleDirectory> = if configuration.database.url.is_some() {
        Arc::new(
            PgRoleDirectory::connect(&configuration.database)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect role directory: {}", e))?,
        )
    } else {
        tracing::warn!("No database.url configured, using in-memory role directory");
        Arc::new(MemoryRoleDirectory::new())
    };

    let identity = Arc::new(GoTrueClient::new(&configuration.hosted)?);
    let ancillary = Arc::new(HomilyApiClient::new(&configuration.ancillary)?);

    let state = AppState::new(identity, roles, ancillary);
    let app = build_router(state, &configuration.server);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    tracing::info!("Starting parish-admin on {}", address);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
