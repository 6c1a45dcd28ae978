//! Mock token storage for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{StorageError, TokenLifecycleError, TokenResult};
use crate::storage::TokenStorage;
use crate::types::Entry;

/// Mock token storage with call history and failure injection.
#[derive(Default)]
pub struct MockTokenStorage {
    entries: Mutex<HashMap<String, Entry>>,
    store_history: Mutex<Vec<Entry>>,
    lookup_history: Mutex<Vec<String>>,
    delete_history: Mutex<Vec<String>>,
    next_error: Mutex<Option<TokenLifecycleError>>,
    fail_stores: Mutex<bool>,
    should_fail: Mutex<bool>,
}

impl MockTokenStorage {
    /// Create new mock token storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set next error to return.
    pub fn set_next_error(&self, error: TokenLifecycleError) -> &Self {
        *self.next_error.lock() = Some(error);
        self
    }

    /// Set storage to fail all operations.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *self.should_fail.lock() = should_fail;
        self
    }

    /// Set storage to fail writes only.
    pub fn set_fail_stores(&self, fail_stores: bool) -> &Self {
        *self.fail_stores.lock() = fail_stores;
        self
    }

    /// Pre-populate an entry without recording history.
    pub fn add_entry(&self, entry: Entry) -> &Self {
        self.entries
            .lock()
            .insert(entry.resource().to_string(), entry);
        self
    }

    /// Get store history.
    pub fn get_store_history(&self) -> Vec<Entry> {
        self.store_history.lock().clone()
    }

    /// Get lookup history.
    pub fn get_lookup_history(&self) -> Vec<String> {
        self.lookup_history.lock().clone()
    }

    /// Get delete history.
    pub fn get_delete_history(&self) -> Vec<String> {
        self.delete_history.lock().clone()
    }

    fn check_error(&self) -> TokenResult<()> {
        if *self.should_fail.lock() {
            return Err(StorageError::Unavailable {
                message: "Mock storage failure".to_string(),
            }
            .into());
        }

        if let Some(error) = self.next_error.lock().take() {
            return Err(error);
        }

        Ok(())
    }
}

#[async_trait]
impl TokenStorage for MockTokenStorage {
    async fn store(&self, entry: Entry) -> TokenResult<()> {
        self.check_error()?;
        if *self.fail_stores.lock() {
            return Err(StorageError::Unavailable {
                message: "Mock storage write failure".to_string(),
            }
            .into());
        }
        entry.validate()?;

        self.store_history.lock().push(entry.clone());
        self.entries
            .lock()
            .insert(entry.resource().to_string(), entry);
        Ok(())
    }

    async fn lookup(&self, resource: &str) -> TokenResult<Option<Entry>> {
        self.check_error()?;

        self.lookup_history.lock().push(resource.to_string());
        Ok(self.entries.lock().get(resource).cloned())
    }

    async fn delete(&self, resource: &str) -> TokenResult<bool> {
        self.check_error()?;

        self.delete_history.lock().push(resource.to_string());
        Ok(self.entries.lock().remove(resource).is_some())
    }

    async fn list(&self) -> TokenResult<Vec<String>> {
        self.check_error()?;
        Ok(self.entries.lock().keys().cloned().collect())
    }
}
