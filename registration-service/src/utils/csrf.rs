//! Session-bound anti-forgery tokens (double-submit pattern).
//!
//! Token layout: `<HMAC-SHA256(message)>.<message>` where
//! `message = <session id>!<hex random>`. The MAC is raw binary and may
//! contain `.`, so the token is split on the last `.`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::models::Session;

type HmacSha256 = Hmac<Sha256>;

const MAC_SEPARATOR: u8 = b'.';
const SESSION_SEPARATOR: u8 = b'!';

#[derive(Debug, Error)]
pub enum CsrfError {
    #[error("invalid CSRF signing key: {0}")]
    InvalidKey(String),

    #[error("cannot mint a CSRF token for a session without an id")]
    MissingSessionId,

    #[error("malformed CSRF token")]
    Malformed,
}

/// Raw token bytes. Transported as unpadded URL-safe base64.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(Vec<u8>);

impl CsrfToken {
    /// `(mac, message)`, split on the last separator.
    pub fn split(&self) -> Option<(&[u8], &[u8])> {
        let at = self.0.iter().rposition(|b| *b == MAC_SEPARATOR)?;
        Some((&self.0[..at], &self.0[at + 1..]))
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.0)
    }

    pub fn decode(encoded: &str) -> Result<Self, CsrfError> {
        URL_SAFE_NO_PAD
            .decode(encoded)
            .map(CsrfToken)
            .map_err(|_| CsrfError::Malformed)
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken([REDACTED])")
    }
}

/// Mints and verifies CSRF tokens with a server-held HMAC key.
#[derive(Clone)]
pub struct CsrfTokenizer {
    mac: HmacSha256,
}

impl fmt::Debug for CsrfTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfTokenizer").finish_non_exhaustive()
    }
}

impl CsrfTokenizer {
    pub fn new(secret: &SecretString) -> Result<Self, CsrfError> {
        let mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| CsrfError::InvalidKey(e.to_string()))?;
        Ok(Self { mac })
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }

    /// Token for `session`, minted on first call and cached on the session
    /// object for its in-memory lifetime.
    pub fn get_token<'s>(&self, session: &'s Session) -> Result<&'s CsrfToken, CsrfError> {
        if session.id.is_empty() {
            return Err(CsrfError::MissingSessionId);
        }
        Ok(session.csrf_cell().get_or_init(|| self.mint(&session.id)))
    }

    /// Fresh token for `session_id` with 64 bits of OS randomness.
    pub fn mint(&self, session_id: &str) -> CsrfToken {
        let nonce = OsRng.next_u64().to_be_bytes();
        let message = format!("{}!{}", session_id, hex::encode(nonce));

        let mut token = self.sign(message.as_bytes());
        token.push(MAC_SEPARATOR);
        token.extend_from_slice(message.as_bytes());
        CsrfToken(token)
    }

    /// Recompute the MAC over `message` and compare in constant time.
    pub fn verify(&self, message: &[u8], mac: &[u8]) -> bool {
        let expected = self.sign(message);
        if expected.len() != mac.len() {
            return false;
        }
        expected.ct_eq(mac).into()
    }

    /// Verify `token` and check that it was minted for `session_id`.
    pub fn verify_for_session(&self, session_id: &str, token: &CsrfToken) -> bool {
        let Some((mac, message)) = token.split() else {
            return false;
        };
        let bound_session = message
            .iter()
            .rposition(|b| *b == SESSION_SEPARATOR)
            .map(|at| &message[..at]);

        let mac_ok = self.verify(message, mac);
        mac_ok && bound_session == Some(session_id.as_bytes())
    }
}
