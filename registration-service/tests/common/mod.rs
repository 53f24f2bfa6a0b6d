//! Test helpers for registration-service integration tests.
//!
//! Drives the real router in-process against in-memory stores.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use registration_service::{
    build_router,
    config::RegistrationConfig,
    services::{InMemoryFlowStore, InMemoryIdentityStore, InMemorySessionStore, UnresolvedGeoLocator},
    AppState,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_IP: &str = "192.0.2.43";
pub const TEST_USER_AGENT: &str = "pro-n-hub";
pub const TEST_EMAIL: &str = "test@example.com";
pub const TEST_TIMEZONE: &str = "America/New_York";
pub const TEST_PASSWORD: &str = "Password1!";
pub const TEST_CSRF_SECRET: &str = "integration-test-csrf-secret-0123456789";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub sessions: Arc<InMemorySessionStore>,
    pub flows: Arc<InMemoryFlowStore>,
    pub identities: Arc<InMemoryIdentityStore>,
}

/// A started flow as seen by a browser.
#[derive(Debug, Clone)]
pub struct StartedFlow {
    pub name: String,
    pub flow_id: String,
    pub session_id: String,
    pub csrf_token: String,
    pub body: serde_json::Value,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(&[])
    }

    /// Spawn with extra configuration variables on top of the test defaults.
    pub fn spawn_with(overrides: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = [
            ("CSRF_SECRET", TEST_CSRF_SECRET),
            ("SERVICE_NAME", "registration-service-test"),
            ("ARGON2_MEMORY_KIB", "1024"),
            ("ARGON2_ITERATIONS", "1"),
            ("ARGON2_PARALLELISM", "1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in overrides {
            vars.insert(k.to_string(), v.to_string());
        }

        let config = RegistrationConfig::from_lookup(
            service_core::config::Config::default(),
            |key| vars.get(key).cloned(),
        )
        .expect("Failed to build test config");

        let sessions = Arc::new(InMemorySessionStore::new());
        let flows = Arc::new(InMemoryFlowStore::new());
        let identities = Arc::new(InMemoryIdentityStore::new());

        let state = AppState::new(
            config,
            sessions.clone(),
            flows.clone(),
            identities.clone(),
            Arc::new(UnresolvedGeoLocator),
        )
        .expect("Failed to build app state");

        Self {
            router: build_router(state.clone()),
            state,
            sessions,
            flows,
            identities,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    pub fn create_flow_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/registrationFlows")
            .header(header::USER_AGENT, TEST_USER_AGENT)
            .header("x-forwarded-for", TEST_IP)
            .body(Body::empty())
            .expect("Failed to build request")
    }

    /// Start a flow and collect what a browser would keep from the response.
    pub async fn start_flow(&self) -> StartedFlow {
        let response = self.send(Self::create_flow_request()).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let cookies = set_cookies(&response);
        let body = body_json(response).await;

        StartedFlow {
            name: body["name"].as_str().expect("name").to_string(),
            flow_id: body["flow_id"].as_str().expect("flow_id").to_string(),
            session_id: cookies["session_id"].clone(),
            csrf_token: cookies["csrf_token"].clone(),
            body,
        }
    }

    pub fn complete_request(
        flow: &StartedFlow,
        email: &str,
        password: &str,
        ip: &str,
    ) -> Request<Body> {
        let body = serde_json::json!({
            "name": flow.name,
            "traits": { "email": email, "timezone": TEST_TIMEZONE },
            "password": password,
        });

        Request::builder()
            .method("POST")
            .uri("/registrationFlows/complete")
            .header(header::USER_AGENT, TEST_USER_AGENT)
            .header("x-forwarded-for", ip)
            .header(header::CONTENT_TYPE, "application/json")
            .header(
                header::COOKIE,
                format!(
                    "session_id={}; csrf_token={}",
                    flow.session_id, flow.csrf_token
                ),
            )
            .header("x-csrf-token", flow.csrf_token.as_str())
            .body(Body::from(body.to_string()))
            .expect("Failed to build request")
    }

    pub async fn complete_flow(&self, flow: &StartedFlow, email: &str, password: &str) -> Response {
        self.send(Self::complete_request(flow, email, password, TEST_IP))
            .await
    }
}

/// Cookie name to value for every `Set-Cookie` header.
pub fn set_cookies(response: &Response) -> HashMap<String, String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Raw `Set-Cookie` header for `name`.
pub fn set_cookie_header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{}=", name)))
        .map(str::to_string)
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Failed to parse response")
}
