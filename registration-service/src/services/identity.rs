use std::sync::Arc;
use tracing::instrument;

use super::error::RegistrationError;
use super::store::{IdentityStore, StoreDeadline};
use crate::models::{Identity, IdentityState};
use crate::utils::{hash_password, FingerprintError, HashingParams, Password, PasswordHashString};

/// Identity provisioning against the identity store.
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn IdentityStore>,
    hashing: HashingParams,
    deadline: StoreDeadline,
}

impl IdentityService {
    pub fn new(store: Arc<dyn IdentityStore>, hashing: HashingParams, deadline: StoreDeadline) -> Self {
        Self {
            store,
            hashing,
            deadline,
        }
    }

    pub async fn email_exists(&self, value: &str) -> Result<bool, RegistrationError> {
        self.deadline.run(self.store.email_exists(value)).await
    }

    /// Argon2id hash of `password`, computed off the async workers.
    pub async fn hash_password(
        &self,
        password: &Password,
    ) -> Result<PasswordHashString, RegistrationError> {
        let password = password.clone();
        let params = self.hashing;

        let hash = tokio::task::spawn_blocking(move || hash_password(&password, &params))
            .await
            .map_err(|e| anyhow::anyhow!("password hashing task failed: {}", e))??;
        Ok(hash)
    }

    /// Persist `identity` as Active.
    ///
    /// The identity must carry at least one email and an already computed
    /// password hash.
    #[instrument(skip(self, identity), fields(emails = identity.emails.len()))]
    pub async fn create_identity(
        &self,
        mut identity: Identity,
    ) -> Result<Identity, RegistrationError> {
        if identity.emails.is_empty() {
            return Err(FingerprintError::MissingField {
                entity: "Identity",
                field: "emails",
            }
            .into());
        }
        if identity.password_hash.is_none() {
            return Err(FingerprintError::MissingField {
                entity: "Identity",
                field: "password_hash",
            }
            .into());
        }

        identity.state = IdentityState::Active;
        let identity = self.deadline.run(self.store.create_identity(identity)).await?;
        tracing::info!(identity_id = %identity.id, "Identity created");
        Ok(identity)
    }
}
