// Per-user provider credentials

use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::errors::{DispatchError, Result};
use crate::records::{new_id, UserCredential};
use crate::store::{self, Collection, RecordStore};

#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn RecordStore>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn all(&self) -> Result<Vec<UserCredential>> {
        store::load_all(self.store.as_ref(), Collection::UserApiProviders)
    }

    /// API key `user_id` registered for `provider_id`
    pub fn resolve(&self, user_id: &str, provider_id: &str) -> Result<String> {
        let credential = self
            .all()?
            .into_iter()
            .find(|c| c.user_id == user_id && c.provider_id == provider_id)
            .ok_or_else(|| {
                tracing::warn!(user_id = %user_id, provider_id = %provider_id, "No credential registered");
                DispatchError::CredentialNotFound {
                    user_id: user_id.to_string(),
                    provider_id: provider_id.to_string(),
                }
            })?;

        tracing::debug!(
            user_id = %user_id,
            provider_id = %provider_id,
            key = %fingerprint(&credential.api_key),
            "Resolved credential"
        );
        Ok(credential.api_key)
    }

    /// Store a key; one per (user, provider) pair
    pub fn register(&self, user_id: &str, provider_id: &str, api_key: &str) -> Result<UserCredential> {
        if user_id.is_empty() || provider_id.is_empty() || api_key.is_empty() {
            return Err(DispatchError::Validation(
                "userId, providerId and apiKey are required".to_string(),
            ));
        }

        let created = store::modify(
            self.store.as_ref(),
            Collection::UserApiProviders,
            |credentials: &mut Vec<UserCredential>| {
                if credentials
                    .iter()
                    .any(|c| c.user_id == user_id && c.provider_id == provider_id)
                {
                    return Err(DispatchError::Conflict(
                        "ProviderId already exists for this userId".to_string(),
                    ));
                }
                let credential = UserCredential {
                    id: new_id(),
                    user_id: user_id.to_string(),
                    provider_id: provider_id.to_string(),
                    api_key: api_key.to_string(),
                };
                credentials.push(credential.clone());
                Ok(credential)
            },
        )?;

        tracing::info!(
            credential_id = %created.id,
            user_id = %user_id,
            provider_id = %provider_id,
            key = %fingerprint(api_key),
            "Credential registered"
        );
        Ok(created)
    }

    pub fn get(&self, id: &str) -> Result<UserCredential> {
        self.all()?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| not_found(id))
    }

    pub fn list(&self) -> Result<Vec<UserCredential>> {
        self.all()
    }

    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<UserCredential>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|c| c.user_id == user_id)
            .collect())
    }

    /// Rotate the key of an existing credential
    pub fn replace_key(&self, id: &str, api_key: &str) -> Result<UserCredential> {
        if api_key.is_empty() {
            return Err(DispatchError::Validation("apiKey is required".to_string()));
        }
        store::modify(
            self.store.as_ref(),
            Collection::UserApiProviders,
            |credentials: &mut Vec<UserCredential>| {
                let credential = credentials
                    .iter_mut()
                    .find(|c| c.id == id)
                    .ok_or_else(|| not_found(id))?;
                credential.api_key = api_key.to_string();
                Ok(credential.clone())
            },
        )
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        store::modify(
            self.store.as_ref(),
            Collection::UserApiProviders,
            |credentials: &mut Vec<UserCredential>| {
                let before = credentials.len();
                credentials.retain(|c| c.id != id);
                if credentials.len() == before {
                    return Err(not_found(id));
                }
                Ok(())
            },
        )
    }

    /// Drop every user's key for `provider_id`; returns how many went
    pub fn remove_for_provider(&self, provider_id: &str) -> Result<usize> {
        let removed = store::modify(
            self.store.as_ref(),
            Collection::UserApiProviders,
            |credentials: &mut Vec<UserCredential>| {
                let before = credentials.len();
                credentials.retain(|c| c.provider_id != provider_id);
                match before - credentials.len() {
                    0 => Err(DispatchError::RecordNotFound {
                        collection: "credential",
                        id: provider_id.to_string(),
                    }),
                    n => Ok(n),
                }
            },
        )?;

        tracing::info!(provider_id = %provider_id, removed, "Credentials removed for provider");
        Ok(removed)
    }
}

fn not_found(id: &str) -> DispatchError {
    DispatchError::RecordNotFound {
        collection: "credential",
        id: id.to_string(),
    }
}

/// Short, non-reversible identifier for a key, safe to log
pub fn fingerprint(api_key: &str) -> String {
    let digest = Sha256::digest(api_key.as_bytes());
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}
