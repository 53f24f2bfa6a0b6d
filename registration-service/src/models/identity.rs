//! Identity model - provisioned accounts and their email addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::PasswordHashString;

/// Identity lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityState {
    Active,
    Suspended,
}

impl IdentityState {
    /// Stable numeric code used by fingerprints.
    pub fn code(&self) -> u8 {
        match self {
            IdentityState::Active => 1,
            IdentityState::Suspended => 2,
        }
    }
}

/// Contact address owned by exactly one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Email {
    pub value: String,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl Email {
    /// A fresh, unverified address. Timestamps are assigned by the store.
    pub fn unverified(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Provisioned account.
///
/// `id` and the timestamps are empty until the identity store persists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub state: IdentityState,
    pub full_name: String,
    pub display_name: String,
    pub avatar_url: String,
    pub emails: Vec<Email>,
    pub timezone: String,
    pub password_hash: Option<PasswordHashString>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    pub state_update_time: Option<DateTime<Utc>>,
}

impl Identity {
    /// Build an unpersisted identity from registration traits.
    pub fn new(email: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            state: IdentityState::Active,
            full_name: String::new(),
            display_name: String::new(),
            avatar_url: String::new(),
            emails: vec![Email::unverified(email)],
            timezone: timezone.into(),
            password_hash: None,
            create_time: None,
            update_time: None,
            state_update_time: None,
        }
    }

    /// Resource name exposed to API callers.
    pub fn name(&self) -> String {
        format!("identities/{}", self.id)
    }

    /// Resource name of one of this identity's addresses.
    pub fn address_name(&self, email: &Email) -> String {
        format!("identities/{}/addresses/{}", self.id, email.value)
    }
}
