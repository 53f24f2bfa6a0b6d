use chrono::{Duration, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::instrument;

use super::error::RegistrationError;
use super::store::{GeoLocator, SessionStore, StoreDeadline};
use crate::models::{Device, DeviceTrust, Identity, Session};

/// Session lifecycle: creation, lookup and device trust.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    geo: Arc<dyn GeoLocator>,
    deadline: StoreDeadline,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        geo: Arc<dyn GeoLocator>,
        deadline: StoreDeadline,
    ) -> Self {
        Self {
            store,
            geo,
            deadline,
        }
    }

    /// Persist a new session seeded with the caller's device.
    ///
    /// Without an identity the session is anonymous (AAL 0); with one it is
    /// password-authenticated (AAL 1) and bound to it.
    #[instrument(skip(self, user_agent, identity), fields(ip_address = %ip_address, authenticated = identity.is_some()))]
    pub async fn create_session(
        &self,
        ip_address: IpAddr,
        user_agent: &str,
        identity: Option<Arc<Identity>>,
        expiry_interval: Duration,
    ) -> Result<Session, RegistrationError> {
        let geo_location = self.geo.locate(ip_address).await;
        let device = Device::new(ip_address, user_agent, geo_location, DeviceTrust::Known);

        let session = match identity {
            Some(identity) => {
                Session::authenticated(identity, device, expiry_interval, Utc::now())
            }
            None => Session::anonymous(device, expiry_interval),
        };

        let session = self.deadline.run(self.store.create_session(session)).await?;
        tracing::debug!(session_id = %session.id, aal = session.aal.0, "Session created");
        Ok(session)
    }

    pub async fn query_session(&self, session_id: &str) -> Result<Session, RegistrationError> {
        self.deadline.run(self.store.query_session(session_id)).await
    }

    /// Trust the caller's device for `session` if it is not known yet.
    ///
    /// Unknown devices are added as [`DeviceTrust::Provisional`] without any
    /// challenge. Returns whether a device was added.
    #[instrument(skip(self, session, user_agent), fields(session_id = %session.id, ip_address = %ip_address))]
    pub async fn trust_device(
        &self,
        session: &mut Session,
        ip_address: IpAddr,
        user_agent: &str,
    ) -> Result<bool, RegistrationError> {
        let mut candidate = Device::new(ip_address, user_agent, "", DeviceTrust::Provisional);
        if session.device_exists(&candidate) {
            return Ok(false);
        }

        candidate.geo_location = self.geo.locate(ip_address).await;
        candidate.session_id = session.id.clone();

        let device = self.deadline.run(self.store.insert_device(candidate)).await?;
        tracing::info!(device_id = %device.id, "New device trusted provisionally");
        session.devices.push(device);
        Ok(true)
    }
}
