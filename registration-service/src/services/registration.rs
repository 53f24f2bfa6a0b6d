//! Registration flow state machine.
//!
//! A flow is created together with an anonymous session and completed at
//! most once. Nothing is held in memory between the two calls; every piece
//! of state crosses the store boundary.
//!
//! Completion is not atomic across stores. If the identity is created but
//! the upgraded session is not, the identity is left without a session.

use chrono::Duration;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::instrument;

use super::error::RegistrationError;
use super::identity::IdentityService;
use super::policy::PasswordPolicy;
use super::session::SessionService;
use super::store::{FlowStore, GeoLocator, IdentityStore, SessionStore, StoreDeadline};
use crate::models::{flow_id_from_name, Expiring, Flow, RegistrationDraft, Session};
use crate::utils::HashingParams;

/// Expiry windows, store deadline and hashing cost for the flow.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationSettings {
    pub session_expiry: Duration,
    pub flow_expiry: Duration,
    pub store_timeout: std::time::Duration,
    pub hashing: HashingParams,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            session_expiry: Duration::minutes(120),
            flow_expiry: Duration::minutes(60),
            store_timeout: std::time::Duration::from_secs(5),
            hashing: HashingParams::default(),
        }
    }
}

#[derive(Clone)]
pub struct RegistrationService {
    sessions: SessionService,
    identities: IdentityService,
    flows: Arc<dyn FlowStore>,
    deadline: StoreDeadline,
    settings: RegistrationSettings,
}

impl RegistrationService {
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        flow_store: Arc<dyn FlowStore>,
        identity_store: Arc<dyn IdentityStore>,
        geo: Arc<dyn GeoLocator>,
        settings: RegistrationSettings,
    ) -> Self {
        let deadline = StoreDeadline::new(settings.store_timeout);
        Self {
            sessions: SessionService::new(session_store, geo, deadline),
            identities: IdentityService::new(identity_store, settings.hashing, deadline),
            flows: flow_store,
            deadline,
            settings,
        }
    }

    /// Start a flow: an anonymous session seeded with the caller's device,
    /// and a flow bound to it.
    #[instrument(skip(self, user_agent), fields(ip_address = %ip_address))]
    pub async fn create_registration_flow(
        &self,
        ip_address: IpAddr,
        user_agent: &str,
    ) -> Result<(Flow, Session), RegistrationError> {
        let session = self
            .sessions
            .create_session(ip_address, user_agent, None, self.settings.session_expiry)
            .await?;

        let flow = Flow::new(session.id.clone(), self.settings.flow_expiry);
        let flow = self.deadline.run(self.flows.create_flow(flow)).await?;

        tracing::info!(
            flow_id = %flow.flow_id,
            session_id = %session.id,
            "Registration flow created"
        );
        Ok((flow, session))
    }

    /// Complete the flow named by `flow_name` and return the new
    /// authenticated session, bound to a freshly provisioned identity.
    ///
    /// Steps run in a fixed order and the first failure aborts the rest.
    #[instrument(skip(self, draft, user_agent), fields(flow_name = %flow_name, ip_address = %ip_address))]
    pub async fn complete_registration_flow(
        &self,
        draft: RegistrationDraft,
        flow_name: &str,
        ip_address: IpAddr,
        user_agent: &str,
    ) -> Result<Session, RegistrationError> {
        let flow_id = flow_id_from_name(flow_name)
            .ok_or_else(|| RegistrationError::unauthenticated("malformed flow name"))?;

        let flow = self.deadline.run(self.flows.query_flow(flow_id)).await?;
        if flow.is_expired() {
            tracing::debug!(flow_id = %flow.flow_id, "Flow expired");
            return Err(RegistrationError::FlowExpired);
        }

        if flow.session_id != draft.session_id {
            tracing::warn!(flow_id = %flow.flow_id, "Session does not own flow");
            return Err(RegistrationError::unauthenticated("session does not own flow"));
        }

        let mut pre_auth = self.sessions.query_session(&flow.session_id).await?;
        if pre_auth.is_expired() {
            return Err(RegistrationError::SessionExpired);
        }
        if !pre_auth.active {
            return Err(RegistrationError::unauthenticated("session is not active"));
        }

        self.sessions
            .trust_device(&mut pre_auth, ip_address, user_agent)
            .await?;

        if self.identities.email_exists(&draft.email).await? {
            return Err(RegistrationError::EmailExists);
        }

        let password = draft.password.as_str();
        if !PasswordPolicy::is_secure(password) {
            return Err(RegistrationError::InsecurePassword {
                missing: PasswordPolicy::missing_classes(password),
            });
        }

        let mut identity = draft.to_identity();
        identity.password_hash = Some(self.identities.hash_password(&draft.password).await?);
        let identity = self.identities.create_identity(identity).await?;

        let session = self
            .sessions
            .create_session(
                ip_address,
                user_agent,
                Some(Arc::new(identity)),
                self.settings.session_expiry,
            )
            .await?;

        tracing::info!(
            flow_id = %flow.flow_id,
            session_id = %session.id,
            "Registration flow completed"
        );
        Ok(session)
    }
}
