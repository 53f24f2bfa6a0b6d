pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    middleware::from_fn,
    routing::{get, post},
    Json, Router,
};
use service_core::middleware::{
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, RequestId},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::RegistrationConfig;
use crate::dtos::HealthResponse;
use crate::services::{
    FlowStore, GeoLocator, IdentityStore, RegistrationService, SessionStore,
};
use crate::utils::CsrfTokenizer;
use service_core::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RegistrationConfig>,
    pub registration: RegistrationService,
    pub csrf: CsrfTokenizer,
}

impl AppState {
    /// Wire the registration core against the given collaborators.
    pub fn new(
        config: RegistrationConfig,
        session_store: Arc<dyn SessionStore>,
        flow_store: Arc<dyn FlowStore>,
        identity_store: Arc<dyn IdentityStore>,
        geo: Arc<dyn GeoLocator>,
    ) -> Result<Self, AppError> {
        let csrf = CsrfTokenizer::new(&config.csrf_secret)
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;
        let registration = RegistrationService::new(
            session_store,
            flow_store,
            identity_store,
            geo,
            config.registration_settings(),
        );

        Ok(Self {
            config: Arc::new(config),
            registration,
            csrf,
        })
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: state.config.service_name.clone(),
        version: state.config.service_version.clone(),
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/registrationFlows",
            post(handlers::create_registration_flow),
        )
        .route(
            "/registrationFlows/complete",
            post(handlers::complete_registration_flow),
        )
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &service_core::axum::extract::Request| {
                let request_id = req
                    .extensions()
                    .get::<RequestId>()
                    .map(|id| id.0.clone())
                    .unwrap_or_default();
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
}
