use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;

use super::{UpstreamCredential, UpstreamEventStream, UpstreamRequest, UpstreamSource};
use crate::config::{ServerConfig, UpstreamConfig};
use crate::error::BridgeError;
use crate::stream::upstream_event_stream;

/// Longest upstream error body echoed back in `BridgeError::Upstream`.
const MAX_ERROR_BODY_CHARS: usize = 1024;

/// Upstream source speaking SSE over HTTP: one `POST` per generation, the
/// response body carrying `{"type", "data"}` event frames.
pub struct HttpEventSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEventSource {
    /// Build the client for `upstream`.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Transport` when the HTTP client cannot be built.
    pub fn new(upstream: &UpstreamConfig, server: &ServerConfig) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(server.timeout))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|err| {
                BridgeError::Transport(format!("Failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            client,
            endpoint: stream_endpoint(&upstream.base_url, &upstream.stream_path),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn open_inner(
        &self,
        credential: &UpstreamCredential,
        request: UpstreamRequest,
    ) -> Result<UpstreamEventStream, BridgeError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            messages = request.messages.len(),
            "opening upstream stream"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&credential.access_token)
            .header(http::header::ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|err| BridgeError::Transport(format!("upstream request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            tracing::warn!(status = status.as_u16(), "upstream rejected stream request");
            return Err(BridgeError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        Ok(upstream_event_stream(response.bytes_stream()).boxed())
    }
}

impl UpstreamSource for HttpEventSource {
    fn open<'a>(
        &'a self,
        credential: &'a UpstreamCredential,
        request: UpstreamRequest,
    ) -> BoxFuture<'a, Result<UpstreamEventStream, BridgeError>> {
        Box::pin(self.open_inner(credential, request))
    }
}

fn stream_endpoint(base_url: &str, stream_path: &str) -> String {
    let mut endpoint = base_url.trim_end_matches('/').to_string();
    endpoint.push_str(stream_path);
    endpoint
}
