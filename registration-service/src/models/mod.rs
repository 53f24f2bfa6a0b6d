//! Domain model for registration flows, sessions and identities.

pub mod flow;
pub mod identity;
pub mod session;

pub use flow::{flow_id_from_name, Flow, RegistrationDraft, FLOW_COLLECTION};
pub use identity::{Email, Identity, IdentityState};
pub use session::{Aal, Device, DeviceTrust, Session};

use chrono::{DateTime, Utc};

/// Entities bounded by an expiry instant.
///
/// Expiry is boundary-inclusive: an entity whose `expires_at` equals `now`
/// is already expired. An entity with no expiry assigned yet (never
/// persisted) counts as expired.
pub trait Expiring {
    fn expires_at(&self) -> Option<DateTime<Utc>>;

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires_at) => now >= expires_at,
            None => true,
        }
    }

    fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
