// Credential storage
// Secure key-value slots for the access and refresh credentials

mod file;
mod memory;
mod tokens;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use tokens::TokenService;

use async_trait::async_trait;

use crate::error::StoreError;

/// The two secret slots the client persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialSlot {
    AccessToken,
    RefreshToken,
}

impl CredentialSlot {
    /// Key under which the slot is persisted
    pub fn key(self) -> &'static str {
        match self {
            CredentialSlot::AccessToken => "access_token",
            CredentialSlot::RefreshToken => "refresh_token",
        }
    }
}

/// Durable key-value capability for credentials.
///
/// Every call is a suspension point and may fail with an I/O error.
/// Implementations must never log the stored values.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, slot: CredentialSlot) -> Result<Option<String>, StoreError>;

    async fn set(&self, slot: CredentialSlot, value: &str) -> Result<(), StoreError>;

    /// Deleting an empty slot is not an error
    async fn delete(&self, slot: CredentialSlot) -> Result<(), StoreError>;
}
