//! Services layer for registration-service.
//!
//! Business logic for the registration flow, sessions and identities, plus
//! the store contracts it runs against.

pub mod error;
mod identity;
pub mod memory;
mod policy;
mod registration;
mod session;
pub mod store;

pub use error::RegistrationError;
pub use identity::IdentityService;
pub use memory::{InMemoryFlowStore, InMemoryIdentityStore, InMemorySessionStore};
pub use policy::{CharClass, PasswordPolicy};
pub use registration::{RegistrationService, RegistrationSettings};
pub use session::SessionService;
pub use store::{
    FlowStore, GeoLocator, IdentityStore, SessionStore, StoreDeadline, StoreError,
    UnresolvedGeoLocator,
};
