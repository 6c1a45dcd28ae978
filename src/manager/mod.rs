//! Token Manager
//!
//! Serves cached tokens, refreshes them ahead of expiry, and guarantees at most
//! one refresh in flight per resource.
//!
//! # Refresh policy
//!
//! - A token whose remaining lifetime exceeds the refresh threshold is served as is.
//! - A token without a refresh token is served as is, even once expired.
//! - Otherwise the token is refreshed. If the refresh fails while the cached token
//!   is still valid, the cached token is served; if it has already expired, the
//!   error is returned.
//! - A resource deleted while a refresh was pending is reported as not found.

mod background;
mod locks;

pub use background::{BackgroundRefresh, SweepReport};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::builders::TokenManagerBuilder;
use crate::error::{RefreshError, TokenError, TokenLifecycleError, TokenResult};
use crate::refresh::RefreshHandler;
use crate::storage::TokenStorage;
use crate::telemetry::{RefreshOutcome, TokenMetrics};
use crate::types::{AccessToken, Entry, TokenManagerConfig, TokenResponse, TokenSet};
use locks::RefreshLocks;

/// Token lifecycle manager.
///
/// Cheap to clone; clones share storage, refresh locks, and metrics.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    storage: Arc<dyn TokenStorage>,
    refresh_handler: Arc<dyn RefreshHandler>,
    config: TokenManagerConfig,
    metrics: Arc<dyn TokenMetrics>,
    locks: RefreshLocks,
}

/// Result of the locked section of a refresh.
pub(crate) enum Refreshed {
    /// The handler issued a new token.
    Issued(Entry),
    /// Another caller refreshed the token first.
    Coalesced(Entry),
    /// The current record has no refresh token; nothing was done.
    Unchanged(Entry),
}

impl Refreshed {
    pub(crate) fn into_entry(self) -> Entry {
        match self {
            Self::Issued(entry) | Self::Coalesced(entry) | Self::Unchanged(entry) => entry,
        }
    }
}

impl TokenManager {
    pub(crate) fn from_parts(
        storage: Arc<dyn TokenStorage>,
        refresh_handler: Arc<dyn RefreshHandler>,
        config: TokenManagerConfig,
        metrics: Arc<dyn TokenMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                storage,
                refresh_handler,
                config,
                metrics,
                locks: RefreshLocks::new(),
            }),
        }
    }

    /// Start building a token manager.
    pub fn builder() -> TokenManagerBuilder {
        TokenManagerBuilder::new()
    }

    /// Active policy.
    pub fn config(&self) -> &TokenManagerConfig {
        &self.inner.config
    }

    /// Underlying storage.
    pub fn storage(&self) -> &Arc<dyn TokenStorage> {
        &self.inner.storage
    }

    /// Get a usable token for `resource`, refreshing it if it is near expiry.
    pub async fn get_token(&self, resource: &str) -> TokenResult<Entry> {
        let entry = match self.inner.storage.lookup(resource).await? {
            Some(entry) => entry.normalized(),
            None => {
                self.inner.metrics.record_lookup(resource, false);
                return Err(TokenError::NotFound {
                    resource: resource.to_string(),
                }
                .into());
            }
        };
        self.inner.metrics.record_lookup(resource, true);

        let threshold = self.inner.config.refresh_threshold;
        if !entry.token().needs_refresh(threshold) {
            debug!(resource = %resource, "serving fresh token");
            return Ok(entry);
        }

        if !entry.token().can_refresh() {
            debug!(
                resource = %resource,
                expired = entry.token().is_expired(),
                "token has no refresh token, serving cached value"
            );
            return Ok(entry);
        }

        match self.refresh(resource, &entry).await {
            Ok(refreshed) => Ok(refreshed.into_entry()),
            Err(e) if is_recoverable(&e) && !entry.token().is_expired() => {
                warn!(
                    resource = %resource,
                    error = %e,
                    "token refresh failed, serving still-valid cached token"
                );
                self.inner
                    .metrics
                    .record_refresh(resource, RefreshOutcome::Fallback);
                Ok(entry)
            }
            Err(e) => Err(e),
        }
    }

    /// [`get_token`](Self::get_token), abandoned when `cancel` fires.
    ///
    /// An in-flight refresh is dropped, which releases the resource's refresh lock.
    pub async fn get_token_with_cancellation(
        &self,
        resource: &str,
        cancel: &CancellationToken,
    ) -> TokenResult<Entry> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TokenError::Cancelled.into()),
            result = self.get_token(resource) => result,
        }
    }

    /// [`get_token`](Self::get_token) bounded by `timeout`.
    pub async fn get_token_with_timeout(
        &self,
        resource: &str,
        timeout: Duration,
    ) -> TokenResult<Entry> {
        tokio::time::timeout(timeout, self.get_token(resource))
            .await
            .map_err(|_| TokenError::Timeout { timeout })?
    }

    /// Get the access token for `resource` as a redacting wrapper.
    pub async fn get_access_token(&self, resource: &str) -> TokenResult<AccessToken> {
        let entry = self.get_token(resource).await?;
        Ok(AccessToken::from(&entry))
    }

    /// Store a freshly obtained token. No refresh logic is applied.
    pub async fn store_token(&self, entry: Entry) -> TokenResult<()> {
        self.inner.storage.store(entry).await
    }

    /// Read the stored entry without refreshing it.
    pub async fn lookup_token(&self, resource: &str) -> TokenResult<Option<Entry>> {
        Ok(self
            .inner
            .storage
            .lookup(resource)
            .await?
            .map(Entry::normalized))
    }

    /// Delete the stored entry, returning whether one existed.
    ///
    /// Waits for an in-flight refresh of `resource` so its write-back cannot
    /// resurrect the entry.
    pub async fn delete_token(&self, resource: &str) -> TokenResult<bool> {
        let _guard = self.inner.locks.acquire(resource).await;
        self.inner.storage.delete(resource).await
    }

    /// List all stored resource keys.
    pub async fn list_resources(&self) -> TokenResult<Vec<String>> {
        self.inner.storage.list().await
    }

    /// Refresh `resource` now, regardless of its remaining lifetime.
    pub async fn force_refresh(&self, resource: &str) -> TokenResult<Entry> {
        let entry = self
            .lookup_token(resource)
            .await?
            .ok_or_else(|| TokenError::NotFound {
                resource: resource.to_string(),
            })?;

        if !entry.token().can_refresh() {
            return Err(TokenError::NoRefreshToken {
                resource: resource.to_string(),
            }
            .into());
        }

        match self.refresh(resource, &entry).await? {
            Refreshed::Unchanged(_) => Err(TokenError::NoRefreshToken {
                resource: resource.to_string(),
            }
            .into()),
            refreshed => Ok(refreshed.into_entry()),
        }
    }

    /// Refresh `resource` under its lock, given the entry the caller observed.
    pub(crate) async fn refresh(
        &self,
        resource: &str,
        observed: &Entry,
    ) -> TokenResult<Refreshed> {
        let _guard = self.inner.locks.acquire(resource).await;

        let result = self.refresh_locked(resource, observed).await;
        match &result {
            Ok(Refreshed::Issued(_)) => {
                self.inner
                    .metrics
                    .record_refresh(resource, RefreshOutcome::Success);
            }
            Ok(Refreshed::Coalesced(_)) => {
                self.inner
                    .metrics
                    .record_refresh(resource, RefreshOutcome::Coalesced);
            }
            Ok(Refreshed::Unchanged(_)) => {
                debug!(resource = %resource, "refresh token gone, leaving record unchanged");
            }
            Err(_) => {
                self.inner
                    .metrics
                    .record_refresh(resource, RefreshOutcome::Failure);
            }
        }
        result
    }

    async fn refresh_locked(&self, resource: &str, observed: &Entry) -> TokenResult<Refreshed> {
        let threshold = self.inner.config.refresh_threshold;

        let current = self
            .inner
            .storage
            .lookup(resource)
            .await?
            .ok_or_else(|| TokenError::NotFound {
                resource: resource.to_string(),
            })?
            .normalized();

        if current.access_token() != observed.access_token()
            && !current.token().needs_refresh(threshold)
        {
            debug!(resource = %resource, "token already refreshed by another caller");
            return Ok(Refreshed::Coalesced(current));
        }

        let refresh_token = match current.refresh_token() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => return Ok(Refreshed::Unchanged(current)),
        };

        let response = self
            .inner
            .refresh_handler
            .refresh_token(&refresh_token)
            .await?;
        let refreshed = build_refreshed_entry(&current, response, Utc::now())?;
        self.inner.storage.store(refreshed.clone()).await?;

        info!(
            resource = %resource,
            expires_at = %refreshed.expires_at(),
            rotated = refreshed.refresh_token() != Some(refresh_token.as_str()),
            "refreshed token"
        );
        Ok(Refreshed::Issued(refreshed))
    }
}

/// Refresh failures that still allow serving an unexpired cached token.
///
/// Handler and storage failures qualify; a resource deleted mid-refresh does not.
fn is_recoverable(error: &TokenLifecycleError) -> bool {
    matches!(
        error,
        TokenLifecycleError::Refresh(_) | TokenLifecycleError::Storage(_)
    )
}

/// Build the replacement entry for `previous` from a handler response.
///
/// A response without a refresh token keeps the previous one; a response without
/// a scope keeps the previous scope.
fn build_refreshed_entry(
    previous: &Entry,
    response: TokenResponse,
    now: DateTime<Utc>,
) -> TokenResult<Entry> {
    if response.access_token.is_empty() {
        return Err(RefreshError::InvalidResponse {
            message: "response has no access token".to_string(),
        }
        .into());
    }

    let expires_at = response
        .resolve_expiry(now)
        .ok_or_else(|| RefreshError::InvalidResponse {
            message: "response has neither expires_at nor expires_in".to_string(),
        })?;

    let refresh_token = response
        .refresh_token
        .filter(|t| !t.is_empty())
        .or_else(|| previous.refresh_token().map(str::to_string));
    let scope = response
        .scope
        .filter(|s| !s.is_empty())
        .or_else(|| previous.scope().map(str::to_string));

    let token = TokenSet {
        access_token: response.access_token,
        refresh_token,
        expires_at,
        scope,
        resource_id: previous.resource().to_string(),
    };
    Ok(Entry::new(previous.resource(), token))
}
