use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CredentialSlot, CredentialStore};
use crate::error::StoreError;

/// In-process credential store; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<CredentialSlot, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a credential pair
    pub fn with_tokens(access_token: &str, refresh_token: Option<&str>) -> Self {
        let mut slots = HashMap::new();
        slots.insert(CredentialSlot::AccessToken, access_token.to_string());
        if let Some(refresh_token) = refresh_token {
            slots.insert(CredentialSlot::RefreshToken, refresh_token.to_string());
        }
        Self {
            slots: RwLock::new(slots),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, slot: CredentialSlot) -> Result<Option<String>, StoreError> {
        Ok(self.slots.read().await.get(&slot).cloned())
    }

    async fn set(&self, slot: CredentialSlot, value: &str) -> Result<(), StoreError> {
        self.slots.write().await.insert(slot, value.to_string());
        Ok(())
    }

    async fn delete(&self, slot: CredentialSlot) -> Result<(), StoreError> {
        self.slots.write().await.remove(&slot);
        Ok(())
    }
}
