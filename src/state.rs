use std::sync::Arc;

use crate::auth::{authenticate, build_allowed_key_set, AllowedClientKeys};
use crate::config::AppConfig;
use crate::error::ClientKeyError;
use crate::shaping::ReasoningDefaults;
use crate::upstream::{
    Authenticator, FileKvStore, HttpEventSource, KvStore, ModelRegistry, StaticModelRegistry,
    TokenAuthenticator, UpstreamSource,
};

/// External collaborators the completion pipeline depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub authenticator: Arc<dyn Authenticator>,
    pub upstream: Arc<dyn UpstreamSource>,
    pub models: Arc<dyn ModelRegistry>,
}

impl Collaborators {
    /// Concrete collaborators for `config`, sharing the given KV store.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Transport` when the upstream HTTP client cannot be built.
    pub fn from_config(
        config: &AppConfig,
        kv: Arc<dyn KvStore>,
    ) -> Result<Self, crate::error::BridgeError> {
        Ok(Self {
            authenticator: Arc::new(TokenAuthenticator::new(kv, &config.upstream)),
            upstream: Arc::new(HttpEventSource::new(&config.upstream, &config.server)?),
            models: Arc::new(StaticModelRegistry::new(&config.models)),
        })
    }
}

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub collaborators: Collaborators,
    pub reasoning: ReasoningDefaults,
    allowed_client_keys: AllowedClientKeys,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        let allowed_client_keys = build_allowed_key_set(&config);
        let reasoning = ReasoningDefaults::from_features(&config.features);
        Self {
            config,
            collaborators,
            reasoning,
            allowed_client_keys,
        }
    }

    /// Open the file-backed token cache and build the concrete collaborators.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Transport` when the upstream HTTP client cannot be built.
    pub fn from_config(config: AppConfig) -> Result<Self, crate::error::BridgeError> {
        let kv: Arc<dyn KvStore> = Arc::new(FileKvStore::open(&config.upstream.token_cache_path));
        let collaborators = Collaborators::from_config(&config, kv)?;
        Ok(Self::new(config, collaborators))
    }

    /// Authenticate a client request using the prebuilt key index.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientKeyError`] when the API key is missing, malformed or unknown.
    pub fn authenticate_client(&self, headers: &http::HeaderMap) -> Result<(), ClientKeyError> {
        authenticate(headers, &self.allowed_client_keys)
    }

    #[must_use]
    pub fn client_auth_required(&self) -> bool {
        !self.allowed_client_keys.is_open()
    }

    #[must_use]
    pub fn authenticator(&self) -> &dyn Authenticator {
        self.collaborators.authenticator.as_ref()
    }

    #[must_use]
    pub fn upstream(&self) -> &dyn UpstreamSource {
        self.collaborators.upstream.as_ref()
    }

    #[must_use]
    pub fn models(&self) -> &dyn ModelRegistry {
        self.collaborators.models.as_ref()
    }
}
