//! Collaborators the completion pipeline consumes, and the concrete
//! implementations the binary wires in.

pub mod http_source;
pub mod kv;
pub mod models;
pub mod token;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde::Serialize;

use crate::error::BridgeError;
use crate::protocol::openai_chat::ChatMessage;
use crate::protocol::upstream::UpstreamEvent;
use crate::shaping::GenerationConfig;

pub use http_source::HttpEventSource;
pub use kv::{FileKvStore, MemoryKvStore};
pub use models::StaticModelRegistry;
pub use token::TokenAuthenticator;

/// Upstream events in arrival order. The stream ends normally or with one
/// `Err`; nothing is read after an error.
pub type UpstreamEventStream = BoxStream<'static, Result<UpstreamEvent, BridgeError>>;

/// Bearer credential accepted by the upstream service.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamCredential {
    pub access_token: String,
}

impl std::fmt::Debug for UpstreamCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamCredential")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Token cache status reported by the debug endpoint. Never carries the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenCacheInfo {
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_until_expiry_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_expired: Option<bool>,
    pub message: String,
}

/// Everything the upstream needs to start one generation.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub generation_config: GenerationConfig,
}

pub trait Authenticator: Send + Sync {
    /// Produce a credential for one completion request.
    fn authenticate(&self) -> BoxFuture<'_, Result<UpstreamCredential, BridgeError>>;

    fn token_cache_info(&self) -> BoxFuture<'_, Result<TokenCacheInfo, BridgeError>>;
}

pub trait UpstreamSource: Send + Sync {
    /// Start a generation. Errors before the first event (connect failure,
    /// non-2xx status) surface here; later failures arrive in the stream.
    fn open<'a>(
        &'a self,
        credential: &'a UpstreamCredential,
        request: UpstreamRequest,
    ) -> BoxFuture<'a, Result<UpstreamEventStream, BridgeError>>;
}

pub trait ModelRegistry: Send + Sync {
    fn exists(&self, model: &str) -> bool;

    fn supports_images(&self, model: &str) -> bool;

    /// Model ids in registry order.
    fn list_model_ids(&self) -> Vec<String>;
}

/// JSON key-value store, opened once per process.
pub trait KvStore: Send + Sync {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, BridgeError>>;

    fn put<'a>(
        &'a self,
        key: &'a str,
        value: serde_json::Value,
    ) -> BoxFuture<'a, Result<(), BridgeError>>;

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), BridgeError>>;
}
