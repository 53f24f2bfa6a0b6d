//! Storage and lookup collaborators.
//!
//! The registration core talks to persistence only through these traits, so
//! it can run against the in-memory stores in tests and in the binary.

use async_trait::async_trait;
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

use super::error::RegistrationError;
use crate::models::{Device, Flow, Identity, Session};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session with exactly one device. Assigns the session
    /// and device ids and stamps `issued_at`/`expires_at`.
    async fn create_session(&self, session: Session) -> Result<Session, StoreError>;

    /// Session by id, with its devices.
    async fn query_session(&self, session_id: &str) -> Result<Session, StoreError>;

    /// Attach `device` to the session named by `device.session_id`.
    async fn insert_device(&self, device: Device) -> Result<Device, StoreError>;
}

#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Persist a new flow. Assigns `flow_id` and stamps the expiry window.
    async fn create_flow(&self, flow: Flow) -> Result<Flow, StoreError>;

    async fn query_flow(&self, flow_id: &str) -> Result<Flow, StoreError>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn email_exists(&self, value: &str) -> Result<bool, StoreError>;

    /// Persist a new identity with its emails. Fails with
    /// [`StoreError::Constraint`] when any email is already taken.
    async fn create_identity(&self, identity: Identity) -> Result<Identity, StoreError>;
}

/// Resolves a human-readable location for a client address.
#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn locate(&self, ip_address: IpAddr) -> String;
}

/// Placeholder locator used until a resolver is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnresolvedGeoLocator;

impl UnresolvedGeoLocator {
    pub const LOCATION: &'static str = "(unresolved)";
}

#[async_trait]
impl GeoLocator for UnresolvedGeoLocator {
    async fn locate(&self, _ip_address: IpAddr) -> String {
        Self::LOCATION.to_string()
    }
}

/// Upper bound on a single store call.
///
/// An elapsed deadline drops the call future, aborting the in-flight
/// operation, and surfaces as [`RegistrationError::Cancelled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreDeadline(Duration);

impl StoreDeadline {
    pub fn new(timeout: Duration) -> Self {
        Self(timeout)
    }

    pub async fn run<T, F>(&self, call: F) -> Result<T, RegistrationError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.0, call).await {
            Ok(result) => result.map_err(RegistrationError::from),
            Err(_) => {
                tracing::warn!(timeout_ms = self.0.as_millis() as u64, "Store call exceeded deadline");
                Err(RegistrationError::Cancelled)
            }
        }
    }
}

impl Default for StoreDeadline {
    fn default() -> Self {
        Self(Duration::from_secs(5))
    }
}
