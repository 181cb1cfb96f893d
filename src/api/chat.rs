use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use futures_util::StreamExt;
use tracing::{info, warn};

use crate::error::{into_axum_response, BridgeError, ErrorCategory};
use crate::observability::log_request_complete;
use crate::protocol::error_shapes::openai_error_payload;
use crate::protocol::openai_chat::stream::{encode_chunk_sse, StreamRecord};
use crate::protocol::openai_chat::ChatCompletionRequest;
use crate::shaping::{build_generation_config, split_messages, validate_request_messages};
use crate::state::AppState;
use crate::stream::{ChatStreamTranscoder, CompletionAccumulator};
use crate::upstream::{
    UpstreamCredential, UpstreamEventStream, UpstreamRequest, UpstreamSource,
};

/// `POST /v1/chat/completions`.
pub async fn handler(State(state): State<Arc<AppState>>, body: bytes::Bytes) -> Response {
    match handler_inner(state, body).await {
        Ok(response) => response,
        Err(err) => into_axum_response(&err),
    }
}

async fn handler_inner(state: Arc<AppState>, body: bytes::Bytes) -> Result<Response, BridgeError> {
    let start_time = Instant::now();
    let request: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|err| BridgeError::InvalidRequest(format!("Invalid JSON body: {err}")))?;

    let model = request
        .model
        .clone()
        .filter(|model| !model.is_empty())
        .unwrap_or_else(|| state.config.features.default_model.clone());
    let stream = request.stream != Some(false);
    let generation_config = build_generation_config(&request, &model, &state.reasoning);
    info!(
        model = %model,
        stream,
        messages = request.messages.len(),
        include_reasoning = generation_config.include_reasoning,
        thinking_budget = generation_config.thinking_budget.as_wire_value(),
        tools = request.tools.as_ref().map_or(0, Vec::len),
        "chat completion request"
    );

    validate_request_messages(&model, &request.messages, state.models())?;
    let split = split_messages(request.messages);

    let credential = state
        .authenticator()
        .authenticate()
        .await
        .map_err(|err| match err {
            BridgeError::Auth(_) => err,
            other => BridgeError::Auth(other.to_string()),
        })?;

    let upstream_request = UpstreamRequest {
        model,
        system_prompt: split.system_prompt,
        messages: split.messages,
        generation_config,
    };

    if stream {
        Ok(stream_response(
            Arc::clone(&state.collaborators.upstream),
            credential,
            upstream_request,
            start_time,
        ))
    } else {
        Ok(complete(state.upstream(), &credential, upstream_request, start_time).await)
    }
}

fn stream_response(
    upstream: Arc<dyn UpstreamSource>,
    credential: UpstreamCredential,
    request: UpstreamRequest,
    start_time: Instant,
) -> Response {
    let relay = ChunkRelay::new(upstream, credential, request, start_time);
    let frames = futures_util::stream::unfold(relay, ChunkRelay::next_frame)
        .map(Ok::<bytes::Bytes, Infallible>);

    let mut response = Response::new(Body::from_stream(frames));
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}

/// Drives one downstream SSE body. The upstream is opened on the first poll
/// so an open failure still reaches the client as an inline error record.
/// Dropping the relay drops the upstream stream and its connection.
struct ChunkRelay {
    opening: Option<(Arc<dyn UpstreamSource>, UpstreamCredential, UpstreamRequest)>,
    events: Option<UpstreamEventStream>,
    transcoder: Option<ChatStreamTranscoder>,
    pending: VecDeque<String>,
    model: String,
    start_time: Instant,
}

impl ChunkRelay {
    fn new(
        upstream: Arc<dyn UpstreamSource>,
        credential: UpstreamCredential,
        request: UpstreamRequest,
        start_time: Instant,
    ) -> Self {
        let model = request.model.clone();
        Self {
            transcoder: Some(ChatStreamTranscoder::new(model.clone())),
            opening: Some((upstream, credential, request)),
            events: None,
            pending: VecDeque::with_capacity(2),
            model,
            start_time,
        }
    }

    async fn next_frame(mut self) -> Option<(bytes::Bytes, Self)> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some((bytes::Bytes::from(frame), self));
            }

            if let Some((upstream, credential, request)) = self.opening.take() {
                match upstream.open(&credential, request).await {
                    Ok(events) => self.events = Some(events),
                    Err(err) => self.fail(&err),
                }
                continue;
            }

            let next = self.events.as_mut()?.next().await;
            match next {
                Some(Ok(event)) => {
                    if let Some(chunk) = self
                        .transcoder
                        .as_mut()
                        .and_then(|transcoder| transcoder.consume(event))
                    {
                        self.pending.push_back(encode_chunk_sse(&chunk));
                    }
                }
                Some(Err(err)) => self.fail(&err),
                None => self.finish(),
            }
        }
    }

    fn finish(&mut self) {
        self.events = None;
        let Some(transcoder) = self.transcoder.take() else {
            return;
        };
        log_request_complete(&self.model, transcoder.usage(), self.start_time);
        for record in transcoder.finalize() {
            self.pending.push_back(record.to_sse_frame());
        }
    }

    fn fail(&mut self, err: &BridgeError) {
        warn!(model = %self.model, error = %err, "upstream stream failed");
        self.events = None;
        self.transcoder = None;
        self.pending
            .push_back(StreamRecord::Error(err.to_string()).to_sse_frame());
    }
}

async fn complete(
    upstream: &dyn UpstreamSource,
    credential: &UpstreamCredential,
    request: UpstreamRequest,
    start_time: Instant,
) -> Response {
    let model = request.model.clone();
    match drain(upstream, credential, request).await {
        Ok(accumulator) => {
            log_request_complete(&model, accumulator.usage(), start_time);
            Json(accumulator.into_response()).into_response()
        }
        Err(err) => {
            warn!(model = %model, error = %err, "non-streaming completion failed");
            (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(openai_error_payload(
                    ErrorCategory::ServerError,
                    &err.to_string(),
                    None,
                )),
            )
                .into_response()
        }
    }
}

async fn drain(
    upstream: &dyn UpstreamSource,
    credential: &UpstreamCredential,
    request: UpstreamRequest,
) -> Result<CompletionAccumulator, BridgeError> {
    let mut accumulator = CompletionAccumulator::new(request.model.clone());
    let mut events = upstream.open(credential, request).await?;
    while let Some(event) = events.next().await {
        accumulator.push(event?);
    }
    Ok(accumulator)
}
