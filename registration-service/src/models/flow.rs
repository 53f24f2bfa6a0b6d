//! Registration flow model.

use chrono::{DateTime, Duration, Utc};

use super::{Expiring, Identity};
use crate::utils::Password;

/// Collection prefix of flow resource names.
pub const FLOW_COLLECTION: &str = "registrationFlows";

/// Time-boxed, single-use registration transaction.
///
/// Persisted fields only; the submitted credentials travel separately in a
/// [`RegistrationDraft`] and are never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    pub flow_id: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub session_id: String,
    pub interval: Duration,
}

impl Flow {
    /// Unpersisted flow owned by `session_id`. The store assigns the id and
    /// stamps `issued_at`/`expires_at` from `interval`.
    pub fn new(session_id: impl Into<String>, interval: Duration) -> Self {
        Self {
            flow_id: String::new(),
            issued_at: None,
            expires_at: None,
            session_id: session_id.into(),
            interval,
        }
    }

    pub fn name(&self) -> String {
        format!("{}/{}", FLOW_COLLECTION, self.flow_id)
    }
}

impl Expiring for Flow {
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

/// Extract the flow id: the non-empty suffix after the last `/`.
pub fn flow_id_from_name(name: &str) -> Option<&str> {
    name.rsplit_once('/')
        .map(|(_, flow_id)| flow_id)
        .filter(|flow_id| !flow_id.is_empty())
}

/// What a caller submits to complete a flow.
///
/// `session_id` comes from the caller's session cookie, not the body.
#[derive(Debug, Clone)]
pub struct RegistrationDraft {
    pub session_id: String,
    pub password: Password,
    pub email: String,
    pub timezone: String,
}

impl RegistrationDraft {
    pub(crate) fn to_identity(&self) -> Identity {
        Identity::new(self.email.clone(), self.timezone.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_id_is_suffix_after_last_separator() {
        assert_eq!(
            flow_id_from_name("registrationFlows/0dc909cb"),
            Some("0dc909cb")
        );
        assert_eq!(flow_id_from_name("a/b/c"), Some("c"));
    }

    #[test]
    fn flow_name_without_separator_is_rejected() {
        assert_eq!(flow_id_from_name("0dc909cb"), None);
        assert_eq!(flow_id_from_name(""), None);
        assert_eq!(flow_id_from_name("registrationFlows/"), None);
    }

    #[test]
    fn name_round_trips_through_parser() {
        let mut flow = Flow::new("session-1", Duration::minutes(60));
        flow.flow_id = "987654321".to_string();

        assert_eq!(flow.name(), "registrationFlows/987654321");
        assert_eq!(flow_id_from_name(&flow.name()), Some("987654321"));
    }

    #[test]
    fn flow_expiry_is_boundary_inclusive() {
        let now = Utc::now();
        let mut flow = Flow::new("session-1", Duration::minutes(60));

        flow.expires_at = Some(now);
        assert!(flow.is_expired_at(now));
        flow.expires_at = Some(now + Duration::milliseconds(1));
        assert!(!flow.is_expired_at(now));
    }
}
