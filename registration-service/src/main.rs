use registration_service::{
    build_router,
    config::RegistrationConfig,
    services::{InMemoryFlowStore, InMemoryIdentityStore, InMemorySessionStore, UnresolvedGeoLocator},
    AppState,
};
use service_core::observability::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = RegistrationConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )
    .map_err(service_core::error::AppError::ConfigError)?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        session_expiry_minutes = config.session_expiry_minutes,
        flow_expiry_minutes = config.registration_flow_expiry_minutes,
        "Starting registration service"
    );

    // Stores are process-local; sessions and identities do not survive a restart.
    let session_store = Arc::new(InMemorySessionStore::new());
    let flow_store = Arc::new(InMemoryFlowStore::new());
    let identity_store = Arc::new(InMemoryIdentityStore::new());
    tracing::info!("In-memory stores initialized");

    let addr = config.common.socket_addr();
    let grace = Duration::from_secs(config.common.shutdown_grace_seconds);

    let state = AppState::new(
        config,
        session_store,
        flow_store,
        identity_store,
        Arc::new(UnresolvedGeoLocator),
    )?;
    let app = build_router(state);

    tracing::info!(address = %addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(grace))
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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

    // Keep serving briefly so upstream proxies can stop routing here
    tokio::time::sleep(grace).await;
}
