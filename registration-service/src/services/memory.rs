//! In-memory stores backed by `DashMap`.
//!
//! They assign identifiers and timestamps the way a database-backed store
//! would, so the registration core behaves the same against either.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

use super::store::{FlowStore, IdentityStore, SessionStore, StoreError};
use crate::models::{Device, Email, Flow, Identity, Session};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn expiry_from(now: DateTime<Utc>, interval: Duration) -> Result<DateTime<Utc>, StoreError> {
    now.checked_add_signed(interval).ok_or_else(|| {
        StoreError::Constraint(format!("expiry interval {} is out of range", interval))
    })
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Overwrite a stored session as-is, e.g. to age it in tests.
    pub fn put(&self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, mut session: Session) -> Result<Session, StoreError> {
        if session.devices.len() != 1 {
            return Err(StoreError::Constraint(format!(
                "session must be created with exactly one device, got {}",
                session.devices.len()
            )));
        }

        let now = Utc::now();
        session.id = new_id();
        session.issued_at = Some(now);
        session.expires_at = Some(expiry_from(now, session.expiry_interval)?);
        for device in &mut session.devices {
            device.id = new_id();
            device.session_id = session.id.clone();
        }

        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn query_session(&self, session_id: &str) -> Result<Session, StoreError> {
        self.sessions
            .get(session_id)
            .map(|session| session.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn insert_device(&self, mut device: Device) -> Result<Device, StoreError> {
        let mut session = self
            .sessions
            .get_mut(&device.session_id)
            .ok_or(StoreError::NotFound)?;

        device.id = new_id();
        session.devices.push(device.clone());
        Ok(device)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFlowStore {
    flows: DashMap<String, Flow>,
}

impl InMemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Overwrite a stored flow as-is, e.g. to age it in tests.
    pub fn put(&self, flow: Flow) {
        self.flows.insert(flow.flow_id.clone(), flow);
    }
}

#[async_trait]
impl FlowStore for InMemoryFlowStore {
    async fn create_flow(&self, mut flow: Flow) -> Result<Flow, StoreError> {
        if flow.session_id.is_empty() {
            return Err(StoreError::Constraint(
                "flow must reference a session".to_string(),
            ));
        }

        let now = Utc::now();
        flow.flow_id = new_id();
        flow.issued_at = Some(now);
        flow.expires_at = Some(expiry_from(now, flow.interval)?);

        self.flows.insert(flow.flow_id.clone(), flow.clone());
        Ok(flow)
    }

    async fn query_flow(&self, flow_id: &str) -> Result<Flow, StoreError> {
        self.flows
            .get(flow_id)
            .map(|flow| flow.value().clone())
            .ok_or(StoreError::NotFound)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    identities: DashMap<String, Identity>,
    /// Email value to owning identity id.
    emails: DashMap<String, String>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn get(&self, identity_id: &str) -> Option<Identity> {
        self.identities
            .get(identity_id)
            .map(|identity| identity.value().clone())
    }

    /// Claim every address for `identity_id`, or none of them.
    fn claim_emails(&self, identity_id: &str, emails: &[Email]) -> Result<(), StoreError> {
        let mut claimed: Vec<&str> = Vec::with_capacity(emails.len());

        for email in emails {
            // The entry guard locks its shard; release it before rolling back.
            let vacant = match self.emails.entry(email.value.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(identity_id.to_string());
                    true
                }
                Entry::Occupied(_) => false,
            };

            if !vacant {
                for value in claimed {
                    self.emails.remove(value);
                }
                return Err(StoreError::Constraint(format!(
                    "duplicate key value violates unique constraint on email {}",
                    email.value
                )));
            }
            claimed.push(&email.value);
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn email_exists(&self, value: &str) -> Result<bool, StoreError> {
        Ok(self.emails.contains_key(value))
    }

    async fn create_identity(&self, mut identity: Identity) -> Result<Identity, StoreError> {
        if identity.emails.is_empty() {
            return Err(StoreError::Constraint(
                "identity must have at least one email".to_string(),
            ));
        }
        if identity.emails.iter().any(|email| email.value.is_empty()) {
            return Err(StoreError::Constraint("email value must be set".to_string()));
        }

        let id = new_id();
        self.claim_emails(&id, &identity.emails)?;

        let now = Utc::now();
        identity.id = id;
        identity.create_time = Some(now);
        identity.update_time = Some(now);
        identity.state_update_time = Some(now);
        for email in &mut identity.emails {
            email.create_time = Some(now);
            email.update_time = Some(now);
        }

        self.identities
            .insert(identity.id.clone(), identity.clone());
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceTrust, Expiring};

    fn device(ip: &str, ua: &str) -> Device {
        Device::new(ip.parse().unwrap(), ua, "(unresolved)", DeviceTrust::Known)
    }

    #[tokio::test]
    async fn create_session_assigns_ids_and_expiry() {
        let store = InMemorySessionStore::new();
        let session = Session::anonymous(device("192.0.2.43", "pro-n-hub"), Duration::hours(2));

        let created = store.create_session(session).await.unwrap();

        assert!(!created.id.is_empty());
        assert_eq!(
            created.expires_at.unwrap() - created.issued_at.unwrap(),
            Duration::hours(2)
        );
        assert!(!created.is_expired());
        assert_eq!(created.devices.len(), 1);
        assert!(!created.devices[0].id.is_empty());
        assert_eq!(created.devices[0].session_id, created.id);

        let queried = store.query_session(&created.id).await.unwrap();
        assert_eq!(queried.devices, created.devices);
    }

    #[tokio::test]
    async fn create_session_requires_exactly_one_device() {
        let store = InMemorySessionStore::new();
        let mut session = Session::anonymous(device("192.0.2.43", "pro-n-hub"), Duration::hours(2));
        session.devices.push(device("192.0.2.44", "pro-n-hub"));

        let result = store.create_session(session).await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn insert_device_appends_to_session() {
        let store = InMemorySessionStore::new();
        let created = store
            .create_session(Session::anonymous(
                device("192.0.2.43", "pro-n-hub"),
                Duration::hours(2),
            ))
            .await
            .unwrap();

        let mut extra = device("198.51.100.7", "pro-n-hub");
        extra.session_id = created.id.clone();
        let inserted = store.insert_device(extra).await.unwrap();
        assert!(!inserted.id.is_empty());

        let queried = store.query_session(&created.id).await.unwrap();
        assert_eq!(queried.devices.len(), 2);
        assert!(queried.device_exists(&inserted));
    }

    #[tokio::test]
    async fn insert_device_for_unknown_session_is_not_found() {
        let store = InMemorySessionStore::new();
        let mut orphan = device("198.51.100.7", "pro-n-hub");
        orphan.session_id = "missing".to_string();

        assert!(matches!(
            store.insert_device(orphan).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn flow_window_matches_interval() {
        let store = InMemoryFlowStore::new();
        let created = store
            .create_flow(Flow::new("session-1", Duration::minutes(60)))
            .await
            .unwrap();

        assert_eq!(
            created.expires_at.unwrap() - created.issued_at.unwrap(),
            Duration::minutes(60)
        );
        assert_eq!(store.query_flow(&created.flow_id).await.unwrap(), created);
        assert!(matches!(
            store.query_flow("unknown").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn out_of_range_interval_is_a_constraint_violation() {
        let huge = Duration::days(365 * 1_000_000);

        let sessions = InMemorySessionStore::new();
        let result = sessions
            .create_session(Session::anonymous(device("192.0.2.43", "pro-n-hub"), huge))
            .await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
        assert!(sessions.is_empty());

        let flows = InMemoryFlowStore::new();
        let result = flows.create_flow(Flow::new("session-1", huge)).await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
        assert!(flows.is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_constraint_violation() {
        let store = InMemoryIdentityStore::new();
        let first = store
            .create_identity(Identity::new("test@example.com", "America/New_York"))
            .await
            .unwrap();

        assert!(store.email_exists("test@example.com").await.unwrap());
        assert!(!store.email_exists("other@example.com").await.unwrap());

        let second = store
            .create_identity(Identity::new("test@example.com", "UTC"))
            .await;
        assert!(matches!(second, Err(StoreError::Constraint(_))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&first.id), Some(first));
    }

    #[tokio::test]
    async fn rejected_identity_releases_claimed_emails() {
        let store = InMemoryIdentityStore::new();
        store
            .create_identity(Identity::new("taken@example.com", "UTC"))
            .await
            .unwrap();

        let mut identity = Identity::new("fresh@example.com", "UTC");
        identity.emails.push(Email::unverified("taken@example.com"));
        assert!(store.create_identity(identity).await.is_err());

        assert!(!store.email_exists("fresh@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn create_identity_stamps_times() {
        let store = InMemoryIdentityStore::new();
        let created = store
            .create_identity(Identity::new("test@example.com", "America/New_York"))
            .await
            .unwrap();

        assert!(!created.id.is_empty());
        assert!(created.create_time.is_some());
        assert!(created.emails[0].create_time.is_some());
        assert_eq!(store.get(&created.id), Some(created));
    }
}
