//! Token Types
//!
//! Cached credential value objects and the refresh response shape.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::StorageError;

/// Lifecycle state of a token relative to a refresh threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Valid and further from expiry than the threshold.
    Fresh,
    /// Valid but within the threshold.
    Stale,
    /// Past its expiry.
    Expired,
}

/// Access/refresh token pair with expiry and scope metadata.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Bearer token value.
    pub access_token: String,
    /// Refresh token; `None` means the token cannot be refreshed.
    pub refresh_token: Option<String>,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
    /// Space-delimited scopes, advisory only.
    pub scope: Option<String>,
    /// Key of the entry owning this token set.
    pub resource_id: String,
}

impl TokenSet {
    /// Create a token set with no refresh token and no scope.
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at,
            scope: None,
            resource_id: String::new(),
        }
    }

    /// Set the refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Set the scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Check if the token carries a usable refresh token.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }

    /// Check if token is expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check if token is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Time left until expiry, `None` once expired.
    pub fn remaining_lifetime(&self) -> Option<Duration> {
        self.remaining_lifetime_at(Utc::now())
    }

    fn remaining_lifetime_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now)
            .to_std()
            .ok()
            .filter(|d| !d.is_zero())
    }

    /// Check if the token is expired or expires within `threshold`.
    pub fn needs_refresh(&self, threshold: Duration) -> bool {
        self.state(threshold) != TokenState::Fresh
    }

    /// Classify the token relative to `threshold`.
    pub fn state(&self, threshold: Duration) -> TokenState {
        let now = Utc::now();
        match self.remaining_lifetime_at(now) {
            None => TokenState::Expired,
            Some(remaining) if remaining <= threshold => TokenState::Stale,
            Some(_) => TokenState::Fresh,
        }
    }

    fn normalize(mut self) -> Self {
        if self.refresh_token.as_deref() == Some("") {
            self.refresh_token = None;
        }
        if self.scope.as_deref() == Some("") {
            self.scope = None;
        }
        self
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("resource_id", &self.resource_id)
            .finish()
    }
}

/// Storage record: one token set owned by a resource key.
///
/// The resource key and `token.resource_id` always agree; the only way to build an
/// entry is [`Entry::new`] or deserialization, both of which enforce it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "EntryRecord", try_from = "EntryRecord")]
pub struct Entry {
    resource: String,
    token: TokenSet,
}

impl Entry {
    /// Create an entry for `resource`.
    pub fn new(resource: impl Into<String>, token: TokenSet) -> Self {
        let resource = resource.into();
        let mut token = token.normalize();
        token.resource_id = resource.clone();
        Self { resource, token }
    }

    /// Resource key.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Token set.
    pub fn token(&self) -> &TokenSet {
        &self.token
    }

    /// Consume the entry, returning its token set.
    pub fn into_token(self) -> TokenSet {
        self.token
    }

    /// Access token value.
    pub fn access_token(&self) -> &str {
        &self.token.access_token
    }

    /// Refresh token value, if any.
    pub fn refresh_token(&self) -> Option<&str> {
        self.token.refresh_token.as_deref()
    }

    /// Absolute expiry.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.token.expires_at
    }

    /// Granted scope, if any.
    pub fn scope(&self) -> Option<&str> {
        self.token.scope.as_deref()
    }

    /// Reject entries that may not be stored.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.resource.is_empty() {
            return Err(StorageError::invalid_entry("resource key is empty"));
        }
        if self.token.access_token.is_empty() {
            return Err(StorageError::invalid_entry(format!(
                "access token for {} is empty",
                self.resource
            )));
        }
        Ok(())
    }

    /// Re-derive the token set's denormalized fields from the entry key.
    pub(crate) fn normalized(self) -> Self {
        Self::new(self.resource, self.token)
    }
}

/// On-disk shape of an [`Entry`]; the token set is flattened here only.
#[derive(Serialize, Deserialize)]
struct EntryRecord {
    resource: String,
    access_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    refresh_token: String,
    expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    scope: String,
}

impl From<Entry> for EntryRecord {
    fn from(entry: Entry) -> Self {
        let token = entry.token;
        Self {
            resource: entry.resource,
            access_token: token.access_token,
            refresh_token: token.refresh_token.unwrap_or_default(),
            expires_at: token.expires_at,
            scope: token.scope.unwrap_or_default(),
        }
    }
}

impl TryFrom<EntryRecord> for Entry {
    type Error = String;

    fn try_from(record: EntryRecord) -> Result<Self, Self::Error> {
        if record.resource.is_empty() {
            return Err("missing resource".to_string());
        }
        if record.access_token.is_empty() {
            return Err(format!("missing access token for {}", record.resource));
        }
        let token = TokenSet {
            access_token: record.access_token,
            refresh_token: Some(record.refresh_token),
            expires_at: record.expires_at,
            scope: Some(record.scope),
            resource_id: String::new(),
        };
        Ok(Entry::new(record.resource, token))
    }
}

/// Token response returned by a refresh handler.
///
/// Mirrors the JSON body of an OAuth2 token endpoint; an absolute `expires_at`
/// takes precedence over the relative `expires_in`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    /// New access token.
    pub access_token: String,
    /// Rotated refresh token, if the authority issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Absolute expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Create a response carrying only an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    /// Set a relative lifetime.
    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in.as_secs());
        self
    }

    /// Set an absolute expiry.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the rotated refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Set the granted scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Absolute expiry of the response relative to `now`.
    pub fn resolve_expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(at) = self.expires_at {
            return Some(at);
        }
        self.expires_in.map(|secs| {
            i64::try_from(secs)
                .ok()
                .and_then(ChronoDuration::try_seconds)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }
}

/// Access token wrapper for safe handling.
#[derive(Clone)]
pub struct AccessToken {
    value: SecretString,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
    /// Associated scopes.
    pub scopes: Vec<String>,
}

impl AccessToken {
    /// Create new access token.
    pub fn new(value: String, expires_at: DateTime<Utc>, scopes: Vec<String>) -> Self {
        Self {
            value: SecretString::new(value),
            expires_at,
            scopes,
        }
    }

    /// Get token value.
    pub fn secret(&self) -> &str {
        self.value.expose_secret()
    }

    /// Check if token is expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.value.expose_secret())
    }
}

impl From<&Entry> for AccessToken {
    fn from(entry: &Entry) -> Self {
        let scopes = entry
            .scope()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        Self::new(entry.access_token().to_string(), entry.expires_at(), scopes)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_expiring_in(secs: i64) -> TokenSet {
        TokenSet::new("access", Utc::now() + ChronoDuration::seconds(secs))
    }

    #[test]
    fn test_token_state() {
        let threshold = Duration::from_secs(60);
        assert_eq!(token_expiring_in(3600).state(threshold), TokenState::Fresh);
        assert_eq!(token_expiring_in(30).state(threshold), TokenState::Stale);
        assert_eq!(token_expiring_in(-10).state(threshold), TokenState::Expired);

        assert!(!token_expiring_in(3600).needs_refresh(threshold));
        assert!(token_expiring_in(30).needs_refresh(threshold));
        assert!(token_expiring_in(-10).is_expired());
    }

    #[test]
    fn test_can_refresh_ignores_empty_token() {
        assert!(!token_expiring_in(60).can_refresh());
        assert!(!token_expiring_in(60).with_refresh_token("").can_refresh());
        assert!(token_expiring_in(60).with_refresh_token("rt").can_refresh());
    }

    #[test]
    fn test_entry_keeps_resource_in_sync() {
        let mut token = token_expiring_in(60);
        token.resource_id = "someone-else".to_string();

        let entry = Entry::new("user-1", token);
        assert_eq!(entry.resource(), "user-1");
        assert_eq!(entry.token().resource_id, "user-1");
    }

    #[test]
    fn test_entry_json_is_flat() {
        let expires_at = DateTime::parse_from_rfc3339("2030-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let entry = Entry::new("user-1", TokenSet::new("at", expires_at));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "resource": "user-1",
                "access_token": "at",
                "expires_at": "2030-01-02T03:04:05Z",
            })
        );

        let parsed: Entry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, entry);
        assert_eq!(parsed.refresh_token(), None);
        assert_eq!(parsed.token().resource_id, "user-1");
    }

    #[test]
    fn test_entry_json_rejects_missing_resource() {
        let json = r#"{"resource":"","access_token":"at","expires_at":"2030-01-02T03:04:05Z"}"#;
        assert!(serde_json::from_str::<Entry>(json).is_err());
    }

    #[test]
    fn test_validate() {
        let entry = Entry::new("", token_expiring_in(60));
        assert!(matches!(
            entry.validate(),
            Err(StorageError::InvalidEntry { .. })
        ));

        let entry = Entry::new("user-1", TokenSet::new("", Utc::now()));
        assert!(entry.validate().is_err());

        assert!(Entry::new("user-1", token_expiring_in(60)).validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token = token_expiring_in(60).with_refresh_token("super-secret");
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_token_response_parsing() {
        let json = r#"{
            "access_token": "new-token",
            "expires_in": 3600,
            "scope": "read write"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "new-token");
        assert_eq!(response.expires_in, Some(3600));
        assert!(response.refresh_token.is_none());

        let now = Utc::now();
        assert_eq!(
            response.resolve_expiry(now),
            Some(now + ChronoDuration::seconds(3600))
        );
    }

    #[test]
    fn test_absolute_expiry_wins() {
        let now = Utc::now();
        let at = now + ChronoDuration::seconds(10);
        let response = TokenResponse::new("t")
            .with_expires_in(Duration::from_secs(3600))
            .with_expires_at(at);
        assert_eq!(response.resolve_expiry(now), Some(at));
        assert_eq!(TokenResponse::new("t").resolve_expiry(now), None);
    }

    #[test]
    fn test_access_token_authorization_header() {
        let entry = Entry::new(
            "user-1",
            token_expiring_in(60).with_scope("openid profile"),
        );
        let token = AccessToken::from(&entry);
        assert_eq!(token.authorization_header(), "Bearer access");
        assert_eq!(token.scopes, vec!["openid", "profile"]);
        assert!(!format!("{:?}", token).contains("access\""));
    }
}
