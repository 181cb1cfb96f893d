use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::{Authenticator, KvStore, TokenCacheInfo, UpstreamCredential};
use crate::config::UpstreamConfig;
use crate::error::BridgeError;
use crate::util::{iso8601_from_millis, unix_now_millis};

/// A cached token must stay valid at least this long to be handed out.
const TOKEN_VALIDITY_MARGIN_MS: u64 = 5 * 60 * 1000;

/// Token entry stored in the KV store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    /// Unix milliseconds.
    pub expiry_date: u64,
    /// Unix milliseconds.
    pub cached_at: u64,
}

/// Serves the upstream bearer token from the KV cache, seeding it from the
/// configured static token when the cache is empty or about to expire.
pub struct TokenAuthenticator {
    store: Arc<dyn KvStore>,
    cache_key: String,
    static_token: Option<String>,
    ttl_ms: u64,
}

impl TokenAuthenticator {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, config: &UpstreamConfig) -> Self {
        Self {
            store,
            cache_key: config.token_cache_key.clone(),
            static_token: config.access_token.clone(),
            ttl_ms: config.token_ttl_secs.saturating_mul(1000),
        }
    }

    async fn cached_token(&self) -> Result<Option<CachedToken>, BridgeError> {
        let Some(value) = self.store.get(&self.cache_key).await? else {
            return Ok(None);
        };
        match serde_json::from_value::<CachedToken>(value) {
            Ok(token) => Ok(Some(token)),
            Err(err) => {
                tracing::warn!(error = %err, key = %self.cache_key, "ignoring malformed cached token");
                Ok(None)
            }
        }
    }

    async fn authenticate_inner(&self) -> Result<UpstreamCredential, BridgeError> {
        let now = unix_now_millis();
        if let Some(token) = self.cached_token().await? {
            if token.expiry_date.saturating_sub(now) > TOKEN_VALIDITY_MARGIN_MS {
                tracing::debug!("using cached upstream token");
                return Ok(UpstreamCredential {
                    access_token: token.access_token,
                });
            }
            tracing::info!("cached upstream token expired or expiring soon");
        }

        let Some(static_token) = self.static_token.as_ref() else {
            return Err(BridgeError::Auth(
                "no valid access token: cached token is missing or expired and upstream.access_token is not set"
                    .to_string(),
            ));
        };
        let entry = CachedToken {
            access_token: static_token.clone(),
            expiry_date: now.saturating_add(self.ttl_ms),
            cached_at: now,
        };
        let value = serde_json::to_value(&entry)
            .map_err(|err| BridgeError::Internal(format!("failed to encode token entry: {err}")))?;
        if let Err(err) = self.store.put(&self.cache_key, value).await {
            tracing::warn!(error = %err, "failed to cache upstream token");
        }
        Ok(UpstreamCredential {
            access_token: entry.access_token,
        })
    }

    async fn token_cache_info_inner(&self) -> Result<TokenCacheInfo, BridgeError> {
        let Some(token) = self.cached_token().await? else {
            return Ok(TokenCacheInfo {
                cached: false,
                cached_at: None,
                expires_at: None,
                time_until_expiry_seconds: None,
                is_expired: None,
                message: "No token found in cache".to_string(),
            });
        };
        let now = i64::try_from(unix_now_millis()).unwrap_or(i64::MAX);
        let expiry = i64::try_from(token.expiry_date).unwrap_or(i64::MAX);
        let remaining_ms = expiry.saturating_sub(now);
        Ok(TokenCacheInfo {
            cached: true,
            cached_at: Some(iso8601_from_millis(token.cached_at)),
            expires_at: Some(iso8601_from_millis(token.expiry_date)),
            time_until_expiry_seconds: Some(remaining_ms / 1000),
            is_expired: Some(remaining_ms < 0),
            message: "Token found in cache".to_string(),
        })
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self) -> BoxFuture<'_, Result<UpstreamCredential, BridgeError>> {
        Box::pin(self.authenticate_inner())
    }

    fn token_cache_info(&self) -> BoxFuture<'_, Result<TokenCacheInfo, BridgeError>> {
        Box::pin(self.token_cache_info_inner())
    }
}
