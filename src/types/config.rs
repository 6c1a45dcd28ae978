//! Configuration Types
//!
//! Token manager policy and storage backend selection.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default lead time before expiry at which a token is refreshed proactively.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// Default per-resource deadline for refreshes issued by the background sweep.
pub const DEFAULT_BACKGROUND_TIMEOUT: Duration = Duration::from_secs(30);

/// Token manager policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenManagerConfig {
    /// Refresh tokens expiring within this window.
    pub refresh_threshold: Duration,
    /// Deadline for each refresh issued by the background sweep.
    pub background_timeout: Duration,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            background_timeout: DEFAULT_BACKGROUND_TIMEOUT,
        }
    }
}

/// Storage backend selection.
///
/// Deserializes from `{"type": "memory"}` or
/// `{"type": "file", "directory": "/var/lib/tokens"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Volatile in-process map.
    #[default]
    Memory,
    /// One file per resource under `directory`.
    File {
        /// Base directory, created on demand.
        directory: PathBuf,
    },
}
