//! Refresh Handler
//!
//! Boundary to the remote authority that exchanges a refresh token for a new
//! token pair. The manager never performs network I/O itself; callers inject an
//! implementation (typically their OAuth2 client).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::RefreshError;
use crate::types::TokenResponse;

/// Refresh capability supplied by the caller.
#[async_trait]
pub trait RefreshHandler: Send + Sync {
    /// Exchange `refresh_token` for a new token response.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError>;
}

/// Mock refresh handler for testing.
///
/// Without scripted responses every call returns a distinct access token
/// (`refreshed-access-token-<n>`) valid for one hour and no rotated refresh token.
#[derive(Default)]
pub struct MockRefreshHandler {
    calls: AtomicUsize,
    history: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<Result<TokenResponse, RefreshError>>>,
    always_fail: Mutex<Option<RefreshError>>,
    latency: Mutex<Option<Duration>>,
}

impl MockRefreshHandler {
    /// Create new mock refresh handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next unscripted call.
    pub fn push_response(&self, response: TokenResponse) -> &Self {
        self.responses.lock().push_back(Ok(response));
        self
    }

    /// Queue an error for the next unscripted call.
    pub fn push_error(&self, error: RefreshError) -> &Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Fail every call with `error`; `None` restores normal behavior.
    pub fn set_always_fail(&self, error: Option<RefreshError>) -> &Self {
        *self.always_fail.lock() = error;
        self
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) -> &Self {
        *self.latency.lock() = Some(latency);
        self
    }

    /// Number of calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens received, in call order.
    pub fn get_history(&self) -> Vec<String> {
        self.history.lock().clone()
    }
}

#[async_trait]
impl RefreshHandler for MockRefreshHandler {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.history.lock().push(refresh_token.to_string());

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self.always_fail.lock().clone() {
            return Err(error);
        }

        if let Some(scripted) = self.responses.lock().pop_front() {
            return scripted;
        }

        Ok(TokenResponse::new(format!("refreshed-access-token-{}", call))
            .with_expires_in(Duration::from_secs(3600)))
    }
}

/// Create mock refresh handler for testing.
pub fn create_mock_refresh_handler() -> MockRefreshHandler {
    MockRefreshHandler::new()
}
