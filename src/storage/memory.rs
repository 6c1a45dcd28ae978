//! In-memory token storage.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::TokenResult;
use crate::storage::TokenStorage;
use crate::types::Entry;

/// In-memory token storage implementation.
///
/// Entries are cloned on the way in and out, so callers never alias the map.
#[derive(Default)]
pub struct InMemoryTokenStorage {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryTokenStorage {
    /// Create new in-memory token storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn store(&self, entry: Entry) -> TokenResult<()> {
        entry.validate()?;
        self.entries
            .write()
            .insert(entry.resource().to_string(), entry);
        Ok(())
    }

    async fn lookup(&self, resource: &str) -> TokenResult<Option<Entry>> {
        Ok(self.entries.read().get(resource).cloned())
    }

    async fn delete(&self, resource: &str) -> TokenResult<bool> {
        Ok(self.entries.write().remove(resource).is_some())
    }

    async fn list(&self) -> TokenResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StorageError, TokenLifecycleError};
    use crate::types::TokenSet;
    use chrono::{Duration, Utc};

    fn create_test_entry(resource: &str) -> Entry {
        Entry::new(
            resource,
            TokenSet::new("test-access-token", Utc::now() + Duration::hours(1))
                .with_refresh_token("test-refresh-token")
                .with_scope("openid profile"),
        )
    }

    #[tokio::test]
    async fn test_store_and_lookup() {
        let storage = InMemoryTokenStorage::new();
        let entry = create_test_entry("user1");

        storage.store(entry.clone()).await.unwrap();

        let found = storage.lookup("user1").await.unwrap();
        assert_eq!(found, Some(entry));
    }

    #[tokio::test]
    async fn test_lookup_missing_is_none() {
        let storage = InMemoryTokenStorage::new();
        assert!(storage.lookup("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_replaces() {
        let storage = InMemoryTokenStorage::new();
        storage.store(create_test_entry("user1")).await.unwrap();

        let replacement = Entry::new(
            "user1",
            TokenSet::new("second", Utc::now() + Duration::hours(2)),
        );
        storage.store(replacement).await.unwrap();

        let found = storage.lookup("user1").await.unwrap().unwrap();
        assert_eq!(found.access_token(), "second");
        assert_eq!(found.refresh_token(), None);
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_store_rejects_empty_resource() {
        let storage = InMemoryTokenStorage::new();
        let result = storage.store(create_test_entry("")).await;

        assert!(matches!(
            result,
            Err(TokenLifecycleError::Storage(StorageError::InvalidEntry { .. }))
        ));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let storage = InMemoryTokenStorage::new();
        storage.store(create_test_entry("user1")).await.unwrap();

        assert!(storage.delete("user1").await.unwrap());
        assert!(!storage.delete("user1").await.unwrap());
        assert!(!storage.exists("user1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list() {
        let storage = InMemoryTokenStorage::new();
        storage.store(create_test_entry("user1")).await.unwrap();
        storage.store(create_test_entry("user2")).await.unwrap();

        let mut keys = storage.list().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["user1".to_string(), "user2".to_string()]);
    }
}
