use homily_api::{
    build_router,
    config::{ApiConfig, StorageBackend},
    services::{ensure_admin, metrics::init_metrics, Database, HomilyStore, JwtService, MemoryStore, UserStore},
    AppState,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::init_tracing;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = ApiConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );
    init_metrics()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        storage = ?config.storage.backend,
        "Starting homily API"
    );

    let (users, homilies): (Arc<dyn UserStore>, Arc<dyn HomilyStore>) = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = Arc::new(Database::connect(&config.storage).await?);
            (db.clone(), db)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
    };

    ensure_admin(users.as_ref(), config.admin_bootstrap.as_ref()).await?;

    let jwt = JwtService::new(&config.jwt)?;
    tracing::info!(expiry_hours = config.jwt.expiry_hours, "JWT service initialized");

    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
        &config.rate_limit.trusted_proxies,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
        &config.rate_limit.trusted_proxies,
    );
    tracing::info!(
        login_attempts = config.rate_limit.login_attempts,
        login_window_seconds = config.rate_limit.login_window_seconds,
        trusted_proxies = ?config.rate_limit.trusted_proxies,
        "Rate limiters initialized"
    );

    let state = AppState::new(
        config.clone(),
        jwt,
        users,
        homilies,
        login_rate_limiter,
        ip_rate_limiter,
    );
    let app = build_router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
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
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
