use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Email, Flow, Identity, IdentityState};
use crate::utils::{Fingerprint, FingerprintError};

#[derive(Debug, Serialize)]
pub struct RegistrationFlowResponse {
    pub name: String,
    pub flow_id: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub etag: String,
    pub csrf_token: String,
}

impl RegistrationFlowResponse {
    pub fn new(flow: &Flow, csrf_token: String) -> Result<Self, FingerprintError> {
        Ok(Self {
            name: flow.name(),
            flow_id: flow.flow_id.clone(),
            issued_at: flow.issued_at,
            expires_at: flow.expires_at,
            etag: flow.fingerprint()?,
            csrf_token,
        })
    }
}

/// Not `Debug`: carries the plaintext password.
#[derive(Deserialize, Validate)]
pub struct CompleteRegistrationFlowRequest {
    /// Checked by the flow lookup; a missing or malformed name is unauthenticated.
    #[serde(default)]
    pub name: String,

    #[validate(nested)]
    pub traits: TraitsRequest,

    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TraitsRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default = "default_timezone")]
    #[validate(length(min = 1, max = 64, message = "Timezone is required"))]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Serialize)]
pub struct CompleteRegistrationFlowResponse {
    pub identity: IdentityResponse,
}

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub name: String,
    pub identity_id: String,
    pub state: IdentityState,
    pub addresses: Vec<AddressResponse>,
    pub etag: String,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    pub state_update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub name: String,
    pub identity: String,
    pub value: String,
    pub via: &'static str,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub etag: String,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl AddressResponse {
    fn new(identity: &Identity, email: &Email) -> Result<Self, FingerprintError> {
        Ok(Self {
            name: identity.address_name(email),
            identity: identity.id.clone(),
            value: email.value.clone(),
            via: "email",
            verified: email.verified,
            verified_at: email.verified_at,
            etag: email.fingerprint()?,
            create_time: email.create_time,
            update_time: email.update_time,
        })
    }
}

impl TryFrom<&Identity> for IdentityResponse {
    type Error = FingerprintError;

    fn try_from(identity: &Identity) -> Result<Self, Self::Error> {
        let addresses = identity
            .emails
            .iter()
            .map(|email| AddressResponse::new(identity, email))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: identity.name(),
            identity_id: identity.id.clone(),
            state: identity.state,
            addresses,
            etag: identity.fingerprint()?,
            create_time: identity.create_time,
            update_time: identity.update_time,
            state_update_time: identity.state_update_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn request(email: &str, password: &str) -> CompleteRegistrationFlowRequest {
        CompleteRegistrationFlowRequest {
            name: "registrationFlows/987654321".to_string(),
            traits: TraitsRequest {
                email: email.to_string(),
                timezone: "America/New_York".to_string(),
            },
            password: password.to_string(),
        }
    }

    #[test]
    fn request_validation_checks_nested_traits() {
        assert!(request("test@example.com", "Password1!").validate().is_ok());
        assert!(request("not-an-email", "Password1!").validate().is_err());
        assert!(request("test@example.com", "short").validate().is_err());
        assert!(request("test@example.com", &"a".repeat(129)).validate().is_err());
    }

    #[test]
    fn missing_flow_name_passes_body_validation() {
        let body = r#"{"traits":{"email":"test@example.com"},"password":"Password1!"}"#;
        let request: CompleteRegistrationFlowRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.name, "");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn timezone_defaults_to_utc() {
        let body = r#"{"name":"registrationFlows/1","traits":{"email":"test@example.com"},"password":"Password1!"}"#;
        let request: CompleteRegistrationFlowRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.traits.timezone, "UTC");
    }

    #[test]
    fn unpersisted_identity_has_no_response() {
        let identity = Identity::new("test@example.com", "UTC");
        assert!(IdentityResponse::try_from(&identity).is_err());
    }

    #[test]
    fn identity_response_names_addresses() {
        let now = Utc::now();
        let mut identity = Identity::new("test@example.com", "UTC");
        identity.id = "987654321".to_string();
        identity.create_time = Some(now);
        identity.emails[0].create_time = Some(now);

        let response = IdentityResponse::try_from(&identity).unwrap();
        assert_eq!(response.name, "identities/987654321");
        assert_eq!(
            response.addresses[0].name,
            "identities/987654321/addresses/test@example.com"
        );
        assert!(response.etag.starts_with("W/\""));
        assert_ne!(response.etag, response.addresses[0].etag);
    }
}
