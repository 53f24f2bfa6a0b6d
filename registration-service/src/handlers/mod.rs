//! HTTP handlers for registration-service.

pub mod cookies;
pub mod registration;

pub use registration::*;
