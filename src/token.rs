use crate::config::Config;
use crate::errors::RelayError;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use moka::future::Cache;
use moka::Expiry;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Bearer-token lifecycle for the remote API.
///
/// One token slot, shared process-wide: `ABSENT -> VALID -> (near expiry or
/// explicit invalidation) -> ABSENT`. Concurrent tasks may both observe an
/// expired slot and both log in; that is tolerated rather than locked, since
/// login is cheap and the later write simply wins.

/// Renewal lifetimes are clamped to this range regardless of what the server
/// reports, so a buggy or malicious remote can neither make us cache a token
/// forever nor thrash logins.
const MIN_TOKEN_TTL_SECS: i64 = 60;
const MAX_TOKEN_TTL_SECS: i64 = 3 * 24 * 60 * 60;

/// Renew this many seconds before nominal expiry.
const EXPIRY_BUFFER_SECS: i64 = 60;

const TOKEN_KEY: &str = "bearer";

/// A cached token with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Storage seam for the token slot.
///
/// Injected into the manager explicitly (no hidden singleton) so production
/// can use a process-wide moka cache while tests and embedders use a plain
/// in-memory slot, or a shared store when workers are distributed.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self) -> Option<CachedToken>;
    async fn put(&self, token: CachedToken);
    async fn clear(&self);
}

/// Default process-wide store backed by moka, entries expiring with the
/// token itself.
pub struct MokaTokenStore {
    cache: Cache<String, CachedToken>,
}

struct TokenTtl;

impl Expiry<String, CachedToken> for TokenTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedToken,
        _created_at: Instant,
    ) -> Option<Duration> {
        let remaining = (value.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        Some(remaining)
    }
}

impl MokaTokenStore {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(4)
                .expire_after(TokenTtl)
                .build(),
        }
    }
}

impl Default for MokaTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for MokaTokenStore {
    async fn get(&self) -> Option<CachedToken> {
        self.cache.get(TOKEN_KEY).await
    }

    async fn put(&self, token: CachedToken) {
        self.cache.insert(TOKEN_KEY.to_string(), token).await;
    }

    async fn clear(&self) {
        self.cache.invalidate(TOKEN_KEY).await;
    }
}

/// Plain in-memory slot, used by tests and single-process embedders.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<CachedToken>>,
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self) -> Option<CachedToken> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn put(&self, token: CachedToken) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    async fn clear(&self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Obtains, caches and invalidates the API bearer token.
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    client: reqwest::Client,
    login_url: String,
    email: String,
    password: String,
}

impl TokenManager {
    pub fn new(store: Arc<dyn TokenStore>, config: &Config) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| {
                RelayError::Transport(format!("Failed to create login HTTP client: {}", e))
            })?;

        Ok(Self {
            store,
            client,
            login_url: config.endpoint_url(&config.login_path),
            email: config.api_email.clone(),
            password: config.api_password.clone(),
        })
    }

    /// Returns a valid token, logging in when the cached one is absent or
    /// within the renewal buffer of its expiry.
    pub async fn get_token(&self) -> Result<String, RelayError> {
        if let Some(cached) = self.store.get().await {
            if Utc::now() + ChronoDuration::seconds(EXPIRY_BUFFER_SECS) < cached.expires_at {
                tracing::debug!("Using cached API token");
                return Ok(cached.value);
            }
        }

        tracing::debug!("No valid cached token, attempting API login");
        self.login().await
    }

    /// Logs into the remote API and caches the returned token.
    ///
    /// Any failure clears the cached slot and comes back as `Auth`, which is
    /// retryable: the queue's next attempt starts from a clean login.
    pub async fn login(&self) -> Result<String, RelayError> {
        let response = self
            .client
            .post(&self.login_url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&json!({ "email": self.email, "password": self.password }))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.store.clear().await;
                return Err(RelayError::Auth(format!("Login request failed: {}", e)));
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            self.store.clear().await;
            return Err(RelayError::Auth(format!(
                "Login failed with status {}: {}",
                status, body
            )));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                self.store.clear().await;
                return Err(RelayError::Auth(format!(
                    "Login response was not valid JSON: {}",
                    e
                )));
            }
        };

        let token = body.get("token").and_then(|v| v.as_str());
        let expires_in = body.get("expires_in").and_then(|v| v.as_i64());
        let (Some(token), Some(expires_in)) = (token, expires_in) else {
            self.store.clear().await;
            return Err(RelayError::Auth(
                "Login response missing 'token' or 'expires_in'".to_string(),
            ));
        };

        let ttl = clamp_expiry(expires_in);
        let expires_at = Utc::now() + ChronoDuration::seconds(ttl);
        self.store
            .put(CachedToken {
                value: token.to_string(),
                expires_at,
            })
            .await;

        tracing::info!("Login successful, token cached for {}s", ttl);
        Ok(token.to_string())
    }

    /// Drops the cached token; the next `get_token` call logs in afresh.
    ///
    /// Called by the delivery engine when the remote answers 401.
    pub async fn invalidate(&self) {
        tracing::info!("Invalidating cached API token");
        self.store.clear().await;
    }
}

/// Clamps a server-reported token lifetime to the accepted range.
pub fn clamp_expiry(expires_in: i64) -> i64 {
    expires_in.clamp(MIN_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_clamped_to_bounds() {
        assert_eq!(clamp_expiry(30), 60);
        assert_eq!(clamp_expiry(60), 60);
        assert_eq!(clamp_expiry(3600), 3600);
        assert_eq!(clamp_expiry(999_999_999), 3 * 24 * 60 * 60);
        assert_eq!(clamp_expiry(0), 60);
        assert_eq!(clamp_expiry(-5), 60);
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryTokenStore::default();
        assert!(store.get().await.is_none());

        store
            .put(CachedToken {
                value: "tok".to_string(),
                expires_at: Utc::now() + ChronoDuration::seconds(300),
            })
            .await;
        assert_eq!(store.get().await.map(|t| t.value), Some("tok".to_string()));

        store.clear().await;
        assert!(store.get().await.is_none());
    }

    #[tokio::test]
    async fn moka_store_round_trips() {
        let store = MokaTokenStore::new();
        assert!(store.get().await.is_none());

        store
            .put(CachedToken {
                value: "tok".to_string(),
                expires_at: Utc::now() + ChronoDuration::seconds(300),
            })
            .await;
        assert_eq!(store.get().await.map(|t| t.value), Some("tok".to_string()));

        store.clear().await;
        assert!(store.get().await.is_none());
    }
}
