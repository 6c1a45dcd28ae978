//! Token Storage
//!
//! Backends holding one [`Entry`] per resource key.
//!
//! - **In-memory**: volatile map, suitable for single-process caches and tests
//! - **File**: one JSON file per resource, written atomically
//! - **Mock**: call recording and failure injection for tests

pub mod file;
pub mod memory;
pub mod mock;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::TokenResult;
use crate::types::{Entry, StorageConfig};

pub use file::FileTokenStorage;
pub use memory::InMemoryTokenStorage;
pub use mock::MockTokenStorage;

/// Token storage interface.
///
/// Implementations must tolerate arbitrary interleavings of concurrent calls.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Insert or replace the entry for `entry.resource()`.
    ///
    /// Entries with an empty resource key or access token are rejected with
    /// [`StorageError::InvalidEntry`](crate::error::StorageError::InvalidEntry).
    async fn store(&self, entry: Entry) -> TokenResult<()>;

    /// Look up the entry for a resource. Absence is `Ok(None)`, not an error.
    async fn lookup(&self, resource: &str) -> TokenResult<Option<Entry>>;

    /// Delete the entry for a resource, returning whether one existed.
    async fn delete(&self, resource: &str) -> TokenResult<bool>;

    /// List all stored resource keys in unspecified order.
    async fn list(&self) -> TokenResult<Vec<String>>;

    /// Check if an entry exists for a resource.
    async fn exists(&self, resource: &str) -> TokenResult<bool> {
        Ok(self.lookup(resource).await?.is_some())
    }
}

/// Open the backend described by `config`.
pub fn open_storage(config: &StorageConfig) -> TokenResult<Arc<dyn TokenStorage>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(InMemoryTokenStorage::new())),
        StorageConfig::File { directory } => Ok(Arc::new(FileTokenStorage::new(directory)?)),
    }
}

/// Create in-memory token storage.
pub fn create_in_memory_token_storage() -> InMemoryTokenStorage {
    InMemoryTokenStorage::new()
}

/// Create mock token storage for testing.
pub fn create_mock_token_storage() -> MockTokenStorage {
    MockTokenStorage::new()
}
