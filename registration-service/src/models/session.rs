//! Session model - pre-auth and authenticated sessions with trusted devices.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::OnceCell;
use std::net::IpAddr;
use std::sync::Arc;

use super::{Expiring, Identity};
use crate::utils::CsrfToken;

/// Authenticator assurance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Aal(pub u8);

impl Aal {
    /// Pre-authentication: the holder has proven nothing yet.
    pub const ANONYMOUS: Aal = Aal(0);
    /// The holder presented a password.
    pub const PASSWORD: Aal = Aal(1);
}

/// How a device came to be trusted for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceTrust {
    /// Seed device recorded when the session was created.
    Known,
    /// Added later on first sight within an active session, without a challenge.
    Provisional,
}

/// An (IP address, user agent) fingerprint trusted for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub ip_address: IpAddr,
    pub geo_location: String,
    pub user_agent: String,
    pub session_id: String,
    pub trust: DeviceTrust,
}

impl Device {
    pub fn new(
        ip_address: IpAddr,
        user_agent: impl Into<String>,
        geo_location: impl Into<String>,
        trust: DeviceTrust,
    ) -> Self {
        Self {
            id: String::new(),
            ip_address,
            geo_location: geo_location.into(),
            user_agent: user_agent.into(),
            session_id: String::new(),
            trust,
        }
    }

    /// Geolocation is descriptive only and does not take part in identity.
    pub fn is_same_device(&self, other: &Device) -> bool {
        self.ip_address == other.ip_address && self.user_agent == other.user_agent
    }
}

/// Bearer-token-equivalent authentication context.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub active: bool,
    pub aal: Aal,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub authenticated_at: Option<DateTime<Utc>>,
    pub devices: Vec<Device>,
    pub identity: Option<Arc<Identity>>,
    pub expiry_interval: Duration,
    csrf_token: OnceCell<CsrfToken>,
}

impl Session {
    /// Unpersisted anonymous session seeded with one device.
    pub fn anonymous(device: Device, expiry_interval: Duration) -> Self {
        Self {
            id: String::new(),
            active: true,
            aal: Aal::ANONYMOUS,
            issued_at: None,
            expires_at: None,
            authenticated_at: None,
            devices: vec![device],
            identity: None,
            expiry_interval,
            csrf_token: OnceCell::new(),
        }
    }

    /// Unpersisted password-authenticated session bound to `identity`.
    pub fn authenticated(
        identity: Arc<Identity>,
        device: Device,
        expiry_interval: Duration,
        authenticated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            aal: Aal::PASSWORD,
            authenticated_at: Some(authenticated_at),
            identity: Some(identity),
            ..Self::anonymous(device, expiry_interval)
        }
    }

    /// True iff a known device matches `candidate` on IP address and user agent.
    pub fn device_exists(&self, candidate: &Device) -> bool {
        self.devices.iter().any(|device| device.is_same_device(candidate))
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some() && self.aal >= Aal::PASSWORD
    }

    pub(crate) fn csrf_cell(&self) -> &OnceCell<CsrfToken> {
        &self.csrf_token
    }
}

impl Expiring for Session {
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}
