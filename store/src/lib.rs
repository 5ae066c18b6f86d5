//! Secret store boundary.
//!
//! The engine never touches platform keychains directly; it speaks this
//! trait, keyed by a small closed set of data kinds. Implementations wrap
//! whatever the platform provides (keychain, keystore, encrypted file). The
//! in-memory implementation here backs tests and embedders that manage
//! persistence themselves.
//!
//! A missing item is a valid outcome (`Ok(None)`), never an error - "no
//! credentials stored" is ordinary state for a fresh install.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;

use gatehouse_types::StoreError;

/// The closed set of data kinds the store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// The bearer-token bundle (tokens plus sign-in metadata).
    BearerTokens,
    /// Identity id and identity-pool credentials.
    IdentityPoolCredentials,
    /// Device fingerprint id, kept across sign-outs.
    DeviceAsfId,
    /// Present once legacy-store migration has run.
    LegacyStoreMarker,
}

impl KeyKind {
    /// Stable storage key. Changing one of these orphans persisted data.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::BearerTokens => "gatehouse.bearer_tokens",
            Self::IdentityPoolCredentials => "gatehouse.identity_credentials",
            Self::DeviceAsfId => "gatehouse.device_asf_id",
            Self::LegacyStoreMarker => "gatehouse.legacy_migrated",
        }
    }
}

/// A key-value secret store holding serialized blobs.
///
/// Implementations must be safe to call from concurrent tasks; the engine
/// serializes all access through the credential-store machine anyway, but
/// the trait makes no ordering assumptions.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, kind: KeyKind) -> Result<Option<String>, StoreError>;
    async fn store(&self, kind: KeyKind, value: String) -> Result<(), StoreError>;
    async fn clear(&self, kind: KeyKind) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::KeyKind;

    #[test]
    fn storage_keys_are_distinct() {
        let keys = [
            KeyKind::BearerTokens.key(),
            KeyKind::IdentityPoolCredentials.key(),
            KeyKind::DeviceAsfId.key(),
            KeyKind::LegacyStoreMarker.key(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
