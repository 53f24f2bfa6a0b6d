pub mod registration;

use serde::Serialize;

pub use registration::{
    AddressResponse, CompleteRegistrationFlowRequest, CompleteRegistrationFlowResponse,
    IdentityResponse, RegistrationFlowResponse, TraitsRequest,
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: String,
}
