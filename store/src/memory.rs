//! In-memory secret store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use gatehouse_types::StoreError;

use crate::{KeyKind, SecretStore};

/// A process-local store: a mutex-guarded map.
///
/// Used by tests and by embedders that keep credentials out of durable
/// storage on purpose (e.g. ephemeral CI identities).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: Mutex<HashMap<KeyKind, String>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value, bypassing the trait. Test convenience.
    pub fn seed(&self, kind: KeyKind, value: impl Into<String>) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(kind, value.into());
    }
}

#[async_trait]
impl SecretStore for InMemoryStore {
    async fn fetch(&self, kind: KeyKind) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(&kind).cloned())
    }

    async fn store(&self, kind: KeyKind, value: String) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(kind, value);
        Ok(())
    }

    async fn clear(&self, kind: KeyKind) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(&kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryStore, KeyKind, SecretStore};

    #[tokio::test]
    async fn fetch_of_missing_item_is_none_not_error() {
        let store = InMemoryStore::new();
        let value = store.fetch(KeyKind::BearerTokens).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn store_then_fetch_round_trips() {
        let store = InMemoryStore::new();
        store
            .store(KeyKind::DeviceAsfId, "device-1".into())
            .await
            .unwrap();
        let value = store.fetch(KeyKind::DeviceAsfId).await.unwrap();
        assert_eq!(value.as_deref(), Some("device-1"));
    }

    #[tokio::test]
    async fn clear_removes_the_item() {
        let store = InMemoryStore::new();
        store
            .store(KeyKind::BearerTokens, "blob".into())
            .await
            .unwrap();
        store.clear(KeyKind::BearerTokens).await.unwrap();
        assert!(store.fetch(KeyKind::BearerTokens).await.unwrap().is_none());
    }
}
