//! Background refresh sweep.

use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ConfigurationError, TokenResult};
use crate::manager::{Refreshed, TokenManager};
use crate::types::Entry;

/// Upper bound on refreshes a single sweep runs concurrently.
const MAX_CONCURRENT_SWEEP_REFRESHES: usize = 8;

/// Summary of one background sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Resources listed by storage.
    pub scanned: usize,
    /// Resources now holding a fresh token.
    pub refreshed: usize,
    /// Resources left alone: fresh, unrefreshable, or gone.
    pub skipped: usize,
    /// Resources whose lookup or refresh failed.
    pub failed: usize,
}

/// What one sweep did for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepOutcome {
    Refreshed,
    Skipped,
    Failed,
}

/// Handle to a running background refresh loop.
///
/// Dropping the handle stops the loop.
#[derive(Debug)]
pub struct BackgroundRefresh {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundRefresh {
    /// Signal the loop to stop. Safe to call any number of times.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Check if stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Check if the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }

    /// Stop the loop and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "background token refresh task failed");
            }
        }
    }
}

impl Drop for BackgroundRefresh {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl TokenManager {
    /// Spawn a task that calls [`refresh_expiring`](Self::refresh_expiring) every
    /// `interval`, starting one interval from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_background_refresh(&self, interval: Duration) -> TokenResult<BackgroundRefresh> {
        if interval.is_zero() {
            return Err(ConfigurationError::InvalidValue {
                field: "interval".to_string(),
                message: "must be greater than zero".to_string(),
            }
            .into());
        }

        let cancel = CancellationToken::new();
        let manager = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { manager.run_background_refresh(interval, token).await });

        info!(interval_ms = interval.as_millis() as u64, "background token refresh started");
        Ok(BackgroundRefresh {
            cancel,
            handle: Some(handle),
        })
    }

    async fn run_background_refresh(self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.refresh_expiring() => {
                    if let Err(e) = result {
                        warn!(error = %e, "background token sweep failed");
                    }
                }
            }
        }

        info!("background token refresh stopped");
    }

    /// Refresh every stored token that can be refreshed and is expired or within
    /// the refresh threshold.
    ///
    /// Per-resource failures are logged and counted, never returned; only a failure
    /// to list storage is an error.
    pub async fn refresh_expiring(&self) -> TokenResult<SweepReport> {
        let threshold = self.inner.config.refresh_threshold;
        let resources = self.inner.storage.list().await?;

        let mut report = SweepReport {
            scanned: resources.len(),
            ..Default::default()
        };

        let mut candidates = Vec::new();
        for resource in resources {
            match self.inner.storage.lookup(&resource).await {
                Ok(Some(entry)) => {
                    let entry = entry.normalized();
                    if entry.token().can_refresh() && entry.token().needs_refresh(threshold) {
                        candidates.push(entry);
                    } else {
                        report.skipped += 1;
                    }
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    warn!(resource = %resource, error = %e, "background lookup failed");
                    report.failed += 1;
                }
            }
        }

        let outcomes: Vec<SweepOutcome> = stream::iter(candidates)
            .map(|entry| async move { self.refresh_with_deadline(&entry).await })
            .buffer_unordered(MAX_CONCURRENT_SWEEP_REFRESHES)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                SweepOutcome::Refreshed => report.refreshed += 1,
                SweepOutcome::Skipped => report.skipped += 1,
                SweepOutcome::Failed => report.failed += 1,
            }
        }

        self.inner.metrics.record_sweep(&report);
        debug!(
            scanned = report.scanned,
            refreshed = report.refreshed,
            skipped = report.skipped,
            failed = report.failed,
            "background token sweep finished"
        );
        Ok(report)
    }

    async fn refresh_with_deadline(&self, entry: &Entry) -> SweepOutcome {
        let timeout = self.inner.config.background_timeout;
        let resource = entry.resource();

        match tokio::time::timeout(timeout, self.refresh(resource, entry)).await {
            Ok(Ok(Refreshed::Issued(_) | Refreshed::Coalesced(_))) => SweepOutcome::Refreshed,
            Ok(Ok(Refreshed::Unchanged(_))) => SweepOutcome::Skipped,
            Ok(Err(e)) => {
                warn!(resource = %resource, error = %e, "background token refresh failed");
                SweepOutcome::Failed
            }
            Err(_) => {
                warn!(
                    resource = %resource,
                    timeout_ms = timeout.as_millis() as u64,
                    "background token refresh timed out"
                );
                SweepOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::MockRefreshHandler;
    use crate::storage::{InMemoryTokenStorage, MockTokenStorage, TokenStorage};
    use crate::telemetry::{InMemoryMetrics, NoOpMetrics};
    use crate::types::{TokenManagerConfig, TokenSet};
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::Arc;

    fn entry(resource: &str, secs: i64, refresh_token: Option<&str>) -> Entry {
        let mut token = TokenSet::new(
            format!("{}-access", resource),
            Utc::now() + ChronoDuration::seconds(secs),
        );
        if let Some(rt) = refresh_token {
            token = token.with_refresh_token(rt);
        }
        Entry::new(resource, token)
    }

    fn manager(storage: Arc<dyn TokenStorage>, handler: Arc<MockRefreshHandler>) -> TokenManager {
        TokenManager::from_parts(
            storage,
            handler,
            TokenManagerConfig {
                refresh_threshold: Duration::from_secs(60),
                background_timeout: Duration::from_millis(200),
            },
            Arc::new(NoOpMetrics),
        )
    }

    #[tokio::test]
    async fn test_sweep_counts() {
        let storage = Arc::new(InMemoryTokenStorage::new());
        let handler = Arc::new(MockRefreshHandler::new());
        let manager = manager(storage.clone(), handler.clone());

        storage.store(entry("expired", -60, Some("rt-1"))).await.unwrap();
        storage.store(entry("stale", 30, Some("rt-2"))).await.unwrap();
        storage.store(entry("fresh", 3600, Some("rt-3"))).await.unwrap();
        storage.store(entry("static", -60, None)).await.unwrap();

        let report = manager.refresh_expiring().await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                scanned: 4,
                refreshed: 2,
                skipped: 2,
                failed: 0,
            }
        );
        assert_eq!(handler.call_count(), 2);

        let static_entry = storage.lookup("static").await.unwrap().unwrap();
        assert_eq!(static_entry.access_token(), "static-access");
    }

    #[tokio::test]
    async fn test_sweep_swallows_refresh_failures() {
        let storage = Arc::new(InMemoryTokenStorage::new());
        let handler = Arc::new(MockRefreshHandler::new());
        handler.set_always_fail(Some(crate::error::RefreshError::Network {
            message: "down".to_string(),
        }));
        let manager = manager(storage.clone(), handler.clone());

        storage.store(entry("expired", -60, Some("rt"))).await.unwrap();

        let report = manager.refresh_expiring().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.refreshed, 0);
    }

    #[tokio::test]
    async fn test_sweep_times_out_slow_refresh() {
        let storage = Arc::new(InMemoryTokenStorage::new());
        let handler = Arc::new(MockRefreshHandler::new());
        handler.set_latency(Duration::from_secs(5));
        let manager = manager(storage.clone(), handler.clone());

        storage.store(entry("slow", -60, Some("rt"))).await.unwrap();

        let report = manager.refresh_expiring().await.unwrap();
        assert_eq!(report.failed, 1);

        let unchanged = storage.lookup("slow").await.unwrap().unwrap();
        assert_eq!(unchanged.access_token(), "slow-access");
    }

    #[tokio::test]
    async fn test_sweep_list_failure_is_error() {
        let storage = Arc::new(MockTokenStorage::new());
        storage.set_should_fail(true);
        let manager = manager(storage, Arc::new(MockRefreshHandler::new()));

        assert!(manager.refresh_expiring().await.is_err());
    }

    #[tokio::test]
    async fn test_sweep_records_metrics() {
        let storage = Arc::new(InMemoryTokenStorage::new());
        let metrics = Arc::new(InMemoryMetrics::new());
        let manager = TokenManager::from_parts(
            storage.clone(),
            Arc::new(MockRefreshHandler::new()),
            TokenManagerConfig::default(),
            metrics.clone(),
        );
        storage.store(entry("expired", -60, Some("rt"))).await.unwrap();

        manager.refresh_expiring().await.unwrap();

        let refreshed = metrics.get_entries_by_name("token_sweep_refreshed");
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].value, 1.0);
    }

    #[tokio::test]
    async fn test_sweep_skips_record_that_lost_refresh_token() {
        let storage = Arc::new(InMemoryTokenStorage::new());
        let handler = Arc::new(MockRefreshHandler::new());
        let manager = manager(storage.clone(), handler.clone());

        let observed = entry("user1", -60, Some("rt"));
        storage.store(entry("user1", -60, None)).await.unwrap();

        let outcome = manager.refresh_with_deadline(&observed).await;

        assert_eq!(outcome, SweepOutcome::Skipped);
        assert_eq!(handler.call_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let manager = manager(
            Arc::new(InMemoryTokenStorage::new()),
            Arc::new(MockRefreshHandler::new()),
        );
        assert!(manager.start_background_refresh(Duration::ZERO).is_err());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let manager = manager(
            Arc::new(InMemoryTokenStorage::new()),
            Arc::new(MockRefreshHandler::new()),
        );
        let background = manager
            .start_background_refresh(Duration::from_secs(3600))
            .unwrap();

        background.stop();
        background.stop();
        assert!(background.is_stopped());

        tokio::time::timeout(Duration::from_secs(1), background.shutdown())
            .await
            .unwrap();
    }
}
