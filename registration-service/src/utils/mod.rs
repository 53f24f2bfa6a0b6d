pub mod csrf;
pub mod fingerprint;
pub mod password;
pub mod validation;

pub use csrf::{CsrfError, CsrfToken, CsrfTokenizer};
pub use fingerprint::{Fingerprint, FingerprintError};
pub use password::{hash_password, HashingParams, Password, PasswordHashString};
pub use validation::ValidatedJson;
