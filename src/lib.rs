//! Token Lifecycle Integration Module
//!
//! Caches access tokens per resource, refreshes them before they expire, and keeps
//! at most one refresh in flight per resource no matter how many callers ask.
//!
//! # Features
//!
//! - Pluggable storage: in-memory map or one JSON file per resource
//! - Proactive refresh inside a configurable threshold before expiry
//! - Single-flight refresh per resource, with per-resource locks
//! - Fallback to the cached token when refresh fails before expiry
//! - Background sweep refreshing every stored token that is about to expire
//! - `tracing` events and a metrics hook for refresh outcomes
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use token_lifecycle::{token_manager, Entry, TokenSet};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = token_manager()
//!         .file_storage("/var/lib/myapp/tokens")
//!         .refresh_handler(Arc::new(MyProviderRefresher::new()))
//!         .refresh_threshold(Duration::from_secs(300))
//!         .build()?;
//!
//!     manager
//!         .store_token(Entry::new(
//!             "user-42",
//!             TokenSet::new("access", chrono::Utc::now() + chrono::Duration::hours(1))
//!                 .with_refresh_token("refresh"),
//!         ))
//!         .await?;
//!
//!     let background = manager.start_background_refresh(Duration::from_secs(60))?;
//!
//!     let token = manager.get_access_token("user-42").await?;
//!     println!("Authorization: {}", token.authorization_header());
//!
//!     background.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: token sets, stored entries, refresh responses, and configuration
//! - `error`: error hierarchy
//! - `storage`: storage trait with memory, file, and mock backends
//! - `refresh`: refresh handler trait and a scriptable mock
//! - `manager`: token manager, refresh locks, and background sweep
//! - `builders`: fluent builder for the manager
//! - `telemetry`: metrics and logging setup

pub mod builders;
pub mod error;
pub mod manager;
pub mod refresh;
pub mod storage;
pub mod telemetry;
pub mod types;

// Re-export builders
pub use builders::{token_manager, TokenManagerBuilder};

// Re-export manager
pub use manager::{BackgroundRefresh, SweepReport, TokenManager};

// Re-export error types
pub use error::{
    ConfigurationError, RefreshError, StorageError, TokenError, TokenLifecycleError, TokenResult,
};

// Re-export core types
pub use types::{
    AccessToken, Entry, StorageConfig, TokenManagerConfig, TokenResponse, TokenSet, TokenState,
    DEFAULT_BACKGROUND_TIMEOUT, DEFAULT_REFRESH_THRESHOLD,
};

// Re-export storage
pub use storage::{
    create_in_memory_token_storage, open_storage, FileTokenStorage, InMemoryTokenStorage,
    MockTokenStorage, TokenStorage,
};

// Re-export refresh
pub use refresh::{create_mock_refresh_handler, MockRefreshHandler, RefreshHandler};

// Re-export telemetry
pub use telemetry::{
    init_logging, InMemoryMetrics, LogFormat, LogLevel, LoggingConfig, NoOpMetrics,
    RefreshOutcome, TokenMetrics,
};
