use std::sync::Arc;

use super::{CredentialSlot, CredentialStore};
use crate::auth::CredentialPair;
use crate::error::StoreError;

/// Typed view over the credential store
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn CredentialStore>,
}

impl TokenService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(CredentialSlot::AccessToken).await
    }

    pub async fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(CredentialSlot::RefreshToken).await
    }

    /// Current credential pair, if an access credential is stored
    pub async fn pair(&self) -> Result<Option<CredentialPair>, StoreError> {
        let Some(access) = self.access_token().await? else {
            return Ok(None);
        };
        let refresh = self.refresh_token().await?;
        Ok(Some(CredentialPair { access, refresh }))
    }

    /// Persist a freshly issued pair.
    ///
    /// Without a refresh credential the session is non-renewable, so any
    /// refresh credential left over from an earlier session is removed.
    pub async fn save_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError> {
        self.store
            .set(CredentialSlot::AccessToken, access_token)
            .await?;
        match refresh_token {
            Some(refresh_token) => {
                self.store
                    .set(CredentialSlot::RefreshToken, refresh_token)
                    .await
            }
            None => self.store.delete(CredentialSlot::RefreshToken).await,
        }
    }

    pub async fn save_access_token(&self, access_token: &str) -> Result<(), StoreError> {
        self.store
            .set(CredentialSlot::AccessToken, access_token)
            .await
    }

    pub async fn save_refresh_token(&self, refresh_token: &str) -> Result<(), StoreError> {
        self.store
            .set(CredentialSlot::RefreshToken, refresh_token)
            .await
    }

    /// Remove both credentials. Both deletions are attempted; the first
    /// failure is reported.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let access = self.store.delete(CredentialSlot::AccessToken).await;
        let refresh = self.store.delete(CredentialSlot::RefreshToken).await;
        access.and(refresh)
    }
}
