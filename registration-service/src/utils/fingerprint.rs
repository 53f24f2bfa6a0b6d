//! Weak validators ("ETags") for domain entities.
//!
//! Each entity lists its fingerprinted fields under fixed integer tags in a
//! CBOR map. Field order and presence depend only on the tag table below,
//! never on struct layout, so equal field values always encode to equal
//! bytes. The encoded bytes are checksummed with CRC-32 (IEEE) and rendered
//! as `W/"<hex>"`. This is a change detector for optimistic concurrency,
//! not an integrity check.

use chrono::{DateTime, Utc};
use ciborium::value::{Integer, Value};
use std::net::IpAddr;
use thiserror::Error;

use crate::models::{Device, DeviceTrust, Email, Flow, Identity, Session};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FingerprintError {
    #[error("{entity} {field} must be set")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("failed to encode {entity}: {reason}")]
    Encoding { entity: &'static str, reason: String },
}

/// Entities that expose a weak validator.
pub trait Fingerprint {
    const ENTITY: &'static str;

    /// Reject entities whose required fields are unset.
    fn check_required(&self) -> Result<(), FingerprintError>;

    /// Canonical integer-tagged representation of the fingerprinted fields.
    fn canonical(&self) -> Value;

    fn fingerprint(&self) -> Result<String, FingerprintError> {
        self.check_required()?;

        let mut buffer = Vec::new();
        ciborium::ser::into_writer(&self.canonical(), &mut buffer).map_err(|e| {
            FingerprintError::Encoding {
                entity: Self::ENTITY,
                reason: e.to_string(),
            }
        })?;

        Ok(format!("W/\"{:x}\"", crc32fast::hash(&buffer)))
    }
}

fn missing(entity: &'static str, field: &'static str) -> FingerprintError {
    FingerprintError::MissingField { entity, field }
}

fn tagged<const N: usize>(fields: [(u8, Value); N]) -> Value {
    Value::Map(
        fields
            .into_iter()
            .map(|(tag, value)| (Value::Integer(Integer::from(tag)), value))
            .collect(),
    )
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn uint(value: u8) -> Value {
    Value::Integer(Integer::from(value))
}

fn timestamp(value: Option<DateTime<Utc>>) -> Value {
    match value {
        Some(at) => Value::Array(vec![
            Value::Integer(Integer::from(at.timestamp())),
            Value::Integer(Integer::from(at.timestamp_subsec_nanos())),
        ]),
        None => Value::Null,
    }
}

fn ip(value: &IpAddr) -> Value {
    match value {
        IpAddr::V4(v4) => Value::Bytes(v4.octets().to_vec()),
        IpAddr::V6(v6) => Value::Bytes(v6.octets().to_vec()),
    }
}

impl Fingerprint for Email {
    const ENTITY: &'static str = "email";

    fn check_required(&self) -> Result<(), FingerprintError> {
        if self.value.is_empty() {
            return Err(missing(Self::ENTITY, "value"));
        }
        if self.create_time.is_none() {
            return Err(missing(Self::ENTITY, "create_time"));
        }
        Ok(())
    }

    fn canonical(&self) -> Value {
        tagged([
            (1, text(&self.value)),
            (2, Value::Bool(self.verified)),
            (3, timestamp(self.verified_at)),
            (4, timestamp(self.create_time)),
            (5, timestamp(self.update_time)),
        ])
    }
}

impl Fingerprint for Identity {
    const ENTITY: &'static str = "identity";

    fn check_required(&self) -> Result<(), FingerprintError> {
        if self.id.is_empty() {
            return Err(missing(Self::ENTITY, "id"));
        }
        if self.create_time.is_none() {
            return Err(missing(Self::ENTITY, "create_time"));
        }
        if self.emails.is_empty() {
            return Err(missing(Self::ENTITY, "emails"));
        }
        self.emails.iter().try_for_each(Email::check_required)
    }

    // The password hash is credential material, not resource state.
    fn canonical(&self) -> Value {
        tagged([
            (1, text(&self.id)),
            (2, uint(self.state.code())),
            (3, text(&self.full_name)),
            (4, text(&self.display_name)),
            (5, text(&self.avatar_url)),
            (
                6,
                Value::Array(self.emails.iter().map(Email::canonical).collect()),
            ),
            (7, text(&self.timezone)),
            (8, timestamp(self.create_time)),
            (9, timestamp(self.update_time)),
            (10, timestamp(self.state_update_time)),
        ])
    }
}

impl Fingerprint for Device {
    const ENTITY: &'static str = "device";

    fn check_required(&self) -> Result<(), FingerprintError> {
        if self.id.is_empty() {
            return Err(missing(Self::ENTITY, "id"));
        }
        if self.session_id.is_empty() {
            return Err(missing(Self::ENTITY, "session_id"));
        }
        Ok(())
    }

    fn canonical(&self) -> Value {
        let trust = match self.trust {
            DeviceTrust::Known => 1,
            DeviceTrust::Provisional => 2,
        };
        tagged([
            (1, text(&self.id)),
            (2, ip(&self.ip_address)),
            (3, text(&self.geo_location)),
            (4, text(&self.user_agent)),
            (5, text(&self.session_id)),
            (6, uint(trust)),
        ])
    }
}

impl Fingerprint for Session {
    const ENTITY: &'static str = "session";

    fn check_required(&self) -> Result<(), FingerprintError> {
        if self.id.is_empty() {
            return Err(missing(Self::ENTITY, "id"));
        }
        if self.issued_at.is_none() {
            return Err(missing(Self::ENTITY, "issued_at"));
        }
        if self.expires_at.is_none() {
            return Err(missing(Self::ENTITY, "expires_at"));
        }
        if self.devices.is_empty() {
            return Err(missing(Self::ENTITY, "devices"));
        }
        Ok(())
    }

    fn canonical(&self) -> Value {
        let identity_id = self
            .identity
            .as_ref()
            .map(|identity| text(&identity.id))
            .unwrap_or(Value::Null);
        tagged([
            (1, text(&self.id)),
            (2, Value::Bool(self.active)),
            (3, uint(self.aal.0)),
            (4, timestamp(self.expires_at)),
            (
                5,
                Value::Array(self.devices.iter().map(Device::canonical).collect()),
            ),
            (6, timestamp(self.issued_at)),
            (7, timestamp(self.authenticated_at)),
            (8, identity_id),
        ])
    }
}

impl Fingerprint for Flow {
    const ENTITY: &'static str = "flow";

    fn check_required(&self) -> Result<(), FingerprintError> {
        if self.session_id.is_empty() {
            return Err(missing(Self::ENTITY, "session_id"));
        }
        if self.expires_at.is_none() {
            return Err(missing(Self::ENTITY, "expires_at"));
        }
        Ok(())
    }

    fn canonical(&self) -> Value {
        tagged([
            (1, text(&self.flow_id)),
            (2, timestamp(self.issued_at)),
            (3, timestamp(self.expires_at)),
            (4, text(&self.session_id)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Aal, IdentityState};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn at(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 2, 28, 11, 6, 39).unwrap()
    }

    fn email() -> Email {
        Email {
            value: "test@example.com".to_string(),
            verified: true,
            verified_at: Some(at(2069)),
            create_time: Some(at(1969)),
            update_time: Some(at(2070)),
        }
    }

    fn identity() -> Identity {
        Identity {
            id: "c935b23d-6cb4-448a-814e-b42aec9ef6cf".to_string(),
            state: IdentityState::Suspended,
            full_name: "John Doe".to_string(),
            display_name: "John".to_string(),
            avatar_url: "https://example.com/avatar.jpg".to_string(),
            emails: vec![email()],
            timezone: "America/New_York".to_string(),
            password_hash: None,
            create_time: Some(at(1969)),
            update_time: Some(at(2070)),
            state_update_time: Some(at(2069)),
        }
    }

    fn device(id: &str, ip: &str) -> Device {
        Device {
            id: id.to_string(),
            ip_address: ip.parse().unwrap(),
            geo_location: "New York, USA".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string(),
            session_id: "c935b23d-6cb4-448a-814e-b42aec9ef6cf".to_string(),
            trust: DeviceTrust::Known,
        }
    }

    fn session() -> Session {
        let mut session = Session::anonymous(device("device-12345", "192.0.2.1"), Duration::hours(2));
        session.id = "c935b23d-6cb4-448a-814e-b42aec9ef6cf".to_string();
        session.aal = Aal(2);
        session.issued_at = Some(at(1969));
        session.expires_at = Some(at(2069) + Duration::hours(24));
        session.authenticated_at = Some(at(2069));
        session.identity = Some(Arc::new(identity()));
        session
    }

    fn flow() -> Flow {
        let mut flow = Flow::new("c2e577de-2fbc-4fa4-8dcd-321a960ebb36", Duration::hours(24));
        flow.flow_id = "0dc909cb-8c0f-4dc8-98b9-e82d77eb9d79".to_string();
        flow.issued_at = Some(at(2069));
        flow.expires_at = Some(at(2069) + Duration::hours(24));
        flow
    }

    #[test]
    fn fingerprint_is_weak_validator() {
        let etag = session().fingerprint().unwrap();
        assert!(etag.starts_with("W/\""));
        assert!(etag.ends_with('"'));
        let hex = &etag[3..etag.len() - 1];
        assert!(!hex.is_empty());
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn equal_fields_give_equal_fingerprints() {
        assert_eq!(email().fingerprint(), email().fingerprint());
        assert_eq!(identity().fingerprint(), identity().fingerprint());
        assert_eq!(session().fingerprint(), session().fingerprint());
        assert_eq!(flow().fingerprint(), flow().fingerprint());
    }

    #[test]
    fn email_verified_flag_changes_fingerprint() {
        let mut unverified = email();
        unverified.verified = false;
        assert_ne!(email().fingerprint(), unverified.fingerprint());

        let mut changed = identity();
        changed.emails[0].verified = false;
        assert_ne!(identity().fingerprint(), changed.fingerprint());
    }

    #[test]
    fn identity_email_membership_changes_fingerprint() {
        let mut more = identity();
        more.emails.push(Email {
            value: "second@example.com".to_string(),
            ..email()
        });
        assert_ne!(identity().fingerprint(), more.fingerprint());
    }

    #[test]
    fn session_device_membership_changes_fingerprint() {
        let mut more = session();
        more.devices.push(device("device-67890", "192.0.2.2"));
        assert_ne!(session().fingerprint(), more.fingerprint());

        let mut provisional = session();
        provisional.devices[0].trust = DeviceTrust::Provisional;
        assert_ne!(session().fingerprint(), provisional.fingerprint());
    }

    #[test]
    fn single_field_changes_are_detected() {
        let mut renamed = identity();
        renamed.display_name = "Johnny".to_string();
        assert_ne!(identity().fingerprint(), renamed.fingerprint());

        let mut later = flow();
        later.expires_at = Some(at(2070));
        assert_ne!(flow().fingerprint(), later.fingerprint());

        let mut inactive = session();
        inactive.active = false;
        assert_ne!(session().fingerprint(), inactive.fingerprint());
    }

    #[test]
    fn password_hash_is_not_fingerprinted() {
        let mut hashed = identity();
        hashed.password_hash = Some(crate::utils::PasswordHashString::new(
            "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".to_string(),
        ));
        assert_eq!(identity().fingerprint(), hashed.fingerprint());
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut no_value = email();
        no_value.value.clear();
        assert_eq!(
            no_value.fingerprint(),
            Err(FingerprintError::MissingField {
                entity: "email",
                field: "value"
            })
        );

        let mut no_create_time = identity();
        no_create_time.create_time = None;
        assert!(no_create_time.fingerprint().is_err());

        let mut no_emails = identity();
        no_emails.emails.clear();
        assert!(no_emails.fingerprint().is_err());

        let mut no_id = identity();
        no_id.id.clear();
        assert!(no_id.fingerprint().is_err());

        let mut no_devices = session();
        no_devices.devices.clear();
        assert!(no_devices.fingerprint().is_err());

        let mut no_session_id = session();
        no_session_id.id.clear();
        assert!(no_session_id.fingerprint().is_err());

        let mut no_owner = flow();
        no_owner.session_id.clear();
        assert!(no_owner.fingerprint().is_err());
    }

    #[test]
    fn identity_rejects_unpersisted_email() {
        let mut draft_email = identity();
        draft_email.emails[0].create_time = None;
        assert_eq!(
            draft_email.fingerprint(),
            Err(FingerprintError::MissingField {
                entity: "email",
                field: "create_time"
            })
        );
    }
}
