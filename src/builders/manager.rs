//! Token Manager Builder
//!
//! Fluent builder for [`TokenManager`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigurationError, TokenLifecycleError, TokenResult};
use crate::manager::TokenManager;
use crate::refresh::RefreshHandler;
use crate::storage::{open_storage, TokenStorage};
use crate::telemetry::{NoOpMetrics, TokenMetrics};
use crate::types::{StorageConfig, TokenManagerConfig};

/// Where the built manager gets its storage from.
enum StorageSource {
    Instance(Arc<dyn TokenStorage>),
    Config(StorageConfig),
}

/// Token manager builder.
pub struct TokenManagerBuilder {
    storage: StorageSource,
    refresh_handler: Option<Arc<dyn RefreshHandler>>,
    config: TokenManagerConfig,
    metrics: Option<Arc<dyn TokenMetrics>>,
}

impl Default for TokenManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenManagerBuilder {
    /// Create new builder with in-memory storage and default policy.
    pub fn new() -> Self {
        Self {
            storage: StorageSource::Config(StorageConfig::Memory),
            refresh_handler: None,
            config: TokenManagerConfig::default(),
            metrics: None,
        }
    }

    /// Use an existing storage backend.
    pub fn storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.storage = StorageSource::Instance(storage);
        self
    }

    /// Use a fresh in-memory backend.
    pub fn memory_storage(mut self) -> Self {
        self.storage = StorageSource::Config(StorageConfig::Memory);
        self
    }

    /// Use a file backend rooted at `directory`.
    pub fn file_storage(mut self, directory: impl Into<PathBuf>) -> Self {
        self.storage = StorageSource::Config(StorageConfig::File {
            directory: directory.into(),
        });
        self
    }

    /// Use the backend described by `config`.
    pub fn storage_config(mut self, config: StorageConfig) -> Self {
        self.storage = StorageSource::Config(config);
        self
    }

    /// Set refresh handler.
    pub fn refresh_handler(mut self, handler: Arc<dyn RefreshHandler>) -> Self {
        self.refresh_handler = Some(handler);
        self
    }

    /// Set refresh threshold.
    pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
        self.config.refresh_threshold = threshold;
        self
    }

    /// Set per-resource deadline for background refreshes.
    pub fn background_timeout(mut self, timeout: Duration) -> Self {
        self.config.background_timeout = timeout;
        self
    }

    /// Replace the whole policy.
    pub fn config(mut self, config: TokenManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set metrics sink.
    pub fn metrics(mut self, metrics: Arc<dyn TokenMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the token manager, opening storage if needed.
    pub fn build(self) -> TokenResult<TokenManager> {
        let refresh_handler = self.refresh_handler.ok_or_else(|| {
            TokenLifecycleError::Configuration(ConfigurationError::MissingRequired {
                field: "refresh_handler".to_string(),
            })
        })?;

        if self.config.background_timeout.is_zero() {
            return Err(TokenLifecycleError::Configuration(
                ConfigurationError::InvalidValue {
                    field: "background_timeout".to_string(),
                    message: "must be greater than zero".to_string(),
                },
            ));
        }

        let storage = match self.storage {
            StorageSource::Instance(storage) => storage,
            StorageSource::Config(config) => open_storage(&config)?,
        };
        let metrics = self.metrics.unwrap_or_else(|| Arc::new(NoOpMetrics));

        Ok(TokenManager::from_parts(
            storage,
            refresh_handler,
            self.config,
            metrics,
        ))
    }
}

/// Create a new token manager builder.
pub fn token_manager() -> TokenManagerBuilder {
    TokenManagerBuilder::new()
}
