use axum::http::StatusCode;
use service_core::error::AppError;
use thiserror::Error;

use super::policy::CharClass;
use super::store::StoreError;
use crate::utils::{CsrfError, FingerprintError};

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("flow expired")]
    FlowExpired,

    #[error("session expired")]
    SessionExpired,

    #[error("email already exists")]
    EmailExists,

    #[error("insecure password")]
    InsecurePassword { missing: Vec<CharClass> },

    #[error("validation error: {0}")]
    Validation(#[from] FingerprintError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("operation cancelled: store deadline exceeded")]
    Cancelled,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RegistrationError {
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        RegistrationError::Unauthenticated(reason.into())
    }
}

impl From<CsrfError> for RegistrationError {
    fn from(err: CsrfError) -> Self {
        match err {
            CsrfError::Malformed => RegistrationError::unauthenticated("malformed csrf token"),
            other => RegistrationError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Unauthenticated(reason) => {
                AppError::Unauthorized(anyhow::anyhow!(reason))
            }
            RegistrationError::FlowExpired => AppError::Rejected {
                status: StatusCode::UNAUTHORIZED,
                error: "flow expired".to_string(),
                resource: "flow",
                description: "The registration flow has expired. Please refresh the page."
                    .to_string(),
            },
            RegistrationError::SessionExpired => AppError::Rejected {
                status: StatusCode::UNAUTHORIZED,
                error: "session expired".to_string(),
                resource: "session",
                description: "The user session has expired. Please log in again.".to_string(),
            },
            RegistrationError::EmailExists => AppError::Rejected {
                status: StatusCode::CONFLICT,
                error: "email exist".to_string(),
                resource: "email",
                description: "The email address is already registered.".to_string(),
            },
            RegistrationError::InsecurePassword { missing } => AppError::Rejected {
                status: StatusCode::BAD_REQUEST,
                error: "insecure password".to_string(),
                resource: "password",
                description: insecure_password_description(&missing),
            },
            RegistrationError::Cancelled => AppError::ServiceUnavailable,
            e @ (RegistrationError::Validation(_) | RegistrationError::Store(_)) => {
                AppError::InternalError(anyhow::Error::new(e))
            }
            RegistrationError::Internal(e) => AppError::InternalError(e),
        }
    }
}

fn insecure_password_description(missing: &[CharClass]) -> String {
    let base = "The password is not strong enough.";
    if missing.is_empty() {
        return base.to_string();
    }
    let classes: Vec<String> = missing.iter().map(ToString::to_string).collect();
    format!("{} Add at least one: {}.", base, classes.join(", "))
}
