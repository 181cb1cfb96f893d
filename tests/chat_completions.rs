use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use gemini_relay::config::parse_config;
use gemini_relay::error::BridgeError;
use gemini_relay::protocol::upstream::{FunctionCallPayload, UpstreamEvent, UsagePayload};
use gemini_relay::routing::dispatch::dispatch_request;
use gemini_relay::state::{AppState, Collaborators};
use gemini_relay::upstream::{
    Authenticator, StaticModelRegistry, TokenCacheInfo, UpstreamCredential, UpstreamEventStream,
    UpstreamRequest, UpstreamSource,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

const CONFIG: &str = r"
client_authentication:
  allowed_keys: [client-key]
upstream:
  base_url: http://127.0.0.1:9
  access_token: upstream-token
features:
  default_model: gemini-2.5-flash
models:
  - id: gemini-2.5-pro
    supports_images: true
  - id: gemini-2.5-flash
    supports_images: true
  - id: text-only
";

struct ScriptedAuthenticator {
    failure: Option<&'static str>,
}

impl Authenticator for ScriptedAuthenticator {
    fn authenticate(&self) -> BoxFuture<'_, Result<UpstreamCredential, BridgeError>> {
        let result = match self.failure {
            Some(reason) => Err(BridgeError::Auth(reason.to_string())),
            None => Ok(UpstreamCredential {
                access_token: "upstream-token".to_string(),
            }),
        };
        Box::pin(async move { result })
    }

    fn token_cache_info(&self) -> BoxFuture<'_, Result<TokenCacheInfo, BridgeError>> {
        let result = match self.failure {
            Some(reason) => Err(BridgeError::Storage(reason.to_string())),
            None => Ok(TokenCacheInfo {
                cached: true,
                cached_at: Some("2026-01-01T00:00:00.000Z".to_string()),
                expires_at: Some("2026-01-01T01:00:00.000Z".to_string()),
                time_until_expiry_seconds: Some(3600),
                is_expired: Some(false),
                message: "Token found in cache".to_string(),
            }),
        };
        Box::pin(async move { result })
    }
}

/// Replays a fixed script; `Err` entries become transport failures.
/// With `hold_open` the stream never ends after the script.
#[derive(Default)]
struct ScriptedUpstream {
    script: Vec<Result<UpstreamEvent, &'static str>>,
    open_failure: Option<&'static str>,
    hold_open: bool,
    opened: AtomicUsize,
    stream_dropped: Arc<AtomicBool>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

/// Flips its flag when the upstream stream holding it is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl UpstreamSource for ScriptedUpstream {
    fn open<'a>(
        &'a self,
        credential: &'a UpstreamCredential,
        request: UpstreamRequest,
    ) -> BoxFuture<'a, Result<UpstreamEventStream, BridgeError>> {
        Box::pin(async move {
            assert_eq!(credential.access_token, "upstream-token");
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push(request);
            if let Some(reason) = self.open_failure {
                return Err(BridgeError::Upstream {
                    status: 503,
                    message: reason.to_string(),
                });
            }
            let events: Vec<Result<UpstreamEvent, BridgeError>> = self
                .script
                .iter()
                .cloned()
                .map(|item| item.map_err(|reason| BridgeError::Transport(reason.to_string())))
                .collect();
            let guard = DropFlag(Arc::clone(&self.stream_dropped));
            let tail: BoxStream<'static, Result<UpstreamEvent, BridgeError>> = if self.hold_open {
                futures_util::stream::pending().boxed()
            } else {
                futures_util::stream::empty().boxed()
            };
            Ok(futures_util::stream::iter(events)
                .chain(tail)
                .map(move |item| {
                    let _held = &guard;
                    item
                })
                .boxed())
        })
    }
}

fn build_state(upstream: Arc<ScriptedUpstream>, auth_failure: Option<&'static str>) -> Arc<AppState> {
    let config = parse_config(CONFIG).expect("test config");
    let collaborators = Collaborators {
        authenticator: Arc::new(ScriptedAuthenticator {
            failure: auth_failure,
        }),
        upstream,
        models: Arc::new(StaticModelRegistry::new(&config.models)),
    };
    Arc::new(AppState::new(config, collaborators))
}

fn scripted(script: Vec<Result<UpstreamEvent, &'static str>>) -> Arc<ScriptedUpstream> {
    Arc::new(ScriptedUpstream {
        script,
        ..ScriptedUpstream::default()
    })
}

async fn send(state: Arc<AppState>, request: Request<Body>) -> Response {
    dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch")
}

async fn post_chat(state: Arc<AppState>, payload: &Value) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("authorization", "Bearer client-key")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build request");
    send(state, request).await
}

async fn body_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).expect("json body")
}

/// Split an SSE body into its `data:` payloads.
fn sse_payloads(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter(|record| !record.is_empty())
        .map(|record| {
            record
                .strip_prefix("data: ")
                .unwrap_or_else(|| panic!("not a data record: {record:?}"))
                .to_string()
        })
        .collect()
}

fn parse_chunk(payload: &str) -> Value {
    serde_json::from_str(payload).expect("chunk json")
}

fn user_message(text: &str) -> Value {
    json!([{ "role": "user", "content": text }])
}

#[tokio::test]
async fn test_streaming_text_response() {
    let upstream = scripted(vec![Ok(UpstreamEvent::Text("Hi".into()))]);
    let state = build_state(upstream, None);
    let response = post_chat(
        state,
        &json!({ "model": "gemini-2.5-pro", "messages": user_message("hello") }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["connection"], "keep-alive");

    let payloads = sse_payloads(&body_text(response).await);
    assert_eq!(payloads.len(), 3);

    let delta = parse_chunk(&payloads[0]);
    assert_eq!(delta["object"], "chat.completion.chunk");
    assert_eq!(delta["model"], "gemini-2.5-pro");
    assert_eq!(delta["choices"][0]["delta"]["role"], "assistant");
    assert_eq!(delta["choices"][0]["delta"]["content"], "Hi");
    assert!(delta["choices"][0]["finish_reason"].is_null());

    let terminal = parse_chunk(&payloads[1]);
    assert_eq!(terminal["id"], delta["id"]);
    assert_eq!(terminal["choices"][0]["finish_reason"], "stop");
    assert!(terminal.get("usage").is_none());

    assert_eq!(payloads[2], "[DONE]");
}

#[tokio::test]
async fn test_streaming_tool_call_with_usage() {
    let upstream = scripted(vec![
        Ok(UpstreamEvent::ToolCode(FunctionCallPayload {
            name: Some("f".into()),
            args: Some(json!({ "a": 1 })),
        })),
        Ok(UpstreamEvent::Usage(UsagePayload {
            input_tokens: Some(10),
            output_tokens: Some(5),
        })),
    ]);
    let state = build_state(upstream, None);
    let response = post_chat(
        state,
        &json!({ "model": "gemini-2.5-pro", "messages": user_message("call f"), "stream": true }),
    )
    .await;

    let payloads = sse_payloads(&body_text(response).await);
    assert_eq!(payloads.len(), 3);

    let delta = parse_chunk(&payloads[0]);
    let delta_body = &delta["choices"][0]["delta"];
    assert_eq!(delta_body["role"], "assistant");
    assert!(delta_body["content"].is_null());
    let call = &delta_body["tool_calls"][0];
    assert_eq!(call["index"], 0);
    assert_eq!(call["type"], "function");
    assert_eq!(call["function"]["name"], "f");
    assert_eq!(call["function"]["arguments"], r#"{"a":1}"#);
    assert!(call["id"].as_str().is_some_and(|id| id.starts_with("call_")));

    let terminal = parse_chunk(&payloads[1]);
    assert_eq!(terminal["choices"][0]["finish_reason"], "tool_calls");
    assert_eq!(
        terminal["usage"],
        json!({ "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 })
    );
    assert_eq!(payloads[2], "[DONE]");
}

#[tokio::test]
async fn test_stream_defaults_to_true_and_uses_default_model() {
    let upstream = scripted(vec![Ok(UpstreamEvent::Text("ok".into()))]);
    let state = build_state(Arc::clone(&upstream), None);
    let response = post_chat(state, &json!({ "messages": user_message("hi") })).await;

    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let payloads = sse_payloads(&body_text(response).await);
    assert_eq!(parse_chunk(&payloads[0])["model"], "gemini-2.5-flash");
    assert_eq!(upstream.requests.lock()[0].model, "gemini-2.5-flash");
}

#[tokio::test]
async fn test_stream_error_after_first_chunk() {
    let upstream = scripted(vec![
        Ok(UpstreamEvent::Text("Hi".into())),
        Err("connection reset"),
        Ok(UpstreamEvent::Text("never".into())),
    ]);
    let state = build_state(upstream, None);
    let response = post_chat(
        state,
        &json!({ "model": "gemini-2.5-pro", "messages": user_message("hello") }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payloads = sse_payloads(&body_text(response).await);
    assert_eq!(payloads.len(), 2);
    assert_eq!(
        parse_chunk(&payloads[0])["choices"][0]["delta"]["content"],
        "Hi"
    );
    let error = parse_chunk(&payloads[1]);
    assert_eq!(
        error["error"]["message"],
        "Transport error: connection reset"
    );
    assert!(payloads.iter().all(|payload| payload != "[DONE]"));
}

#[tokio::test]
async fn test_client_disconnect_releases_upstream() {
    let upstream = Arc::new(ScriptedUpstream {
        script: vec![Ok(UpstreamEvent::Text("Hel".into()))],
        hold_open: true,
        ..ScriptedUpstream::default()
    });
    let state = build_state(Arc::clone(&upstream), None);
    let response = post_chat(state, &json!({ "messages": user_message("hi") })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut frames = response.into_body().into_data_stream();
    let first = frames.next().await.expect("first frame").expect("frame bytes");
    let first = String::from_utf8(first.to_vec()).expect("utf-8 frame");
    assert!(first.contains("\"content\":\"Hel\""));
    assert_eq!(upstream.opened.load(Ordering::SeqCst), 1);
    assert!(!upstream.stream_dropped.load(Ordering::SeqCst));

    drop(frames);
    assert!(upstream.stream_dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_stream_open_failure_is_inline_error() {
    let upstream = Arc::new(ScriptedUpstream {
        open_failure: Some("overloaded"),
        ..ScriptedUpstream::default()
    });
    let state = build_state(upstream, None);
    let response = post_chat(
        state,
        &json!({ "model": "gemini-2.5-pro", "messages": user_message("hello") }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payloads = sse_payloads(&body_text(response).await);
    assert_eq!(payloads.len(), 1);
    let error = parse_chunk(&payloads[0]);
    assert!(error["error"]["message"]
        .as_str()
        .is_some_and(|message| message.contains("overloaded")));
}

#[tokio::test]
async fn test_non_streaming_aggregate() {
    let upstream = scripted(vec![
        Ok(UpstreamEvent::ThinkingContent("<thinking>".into())),
        Ok(UpstreamEvent::Text("Hel".into())),
        Ok(UpstreamEvent::RealThinking("hidden".into())),
        Ok(UpstreamEvent::Text("lo".into())),
        Ok(UpstreamEvent::Usage(UsagePayload {
            input_tokens: Some(3),
            output_tokens: Some(2),
        })),
    ]);
    let state = build_state(upstream, None);
    let response = post_chat(
        state,
        &json!({ "model": "gemini-2.5-pro", "messages": user_message("hello"), "stream": false }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["object"], "chat.completion");
    assert_eq!(payload["model"], "gemini-2.5-pro");
    assert!(payload["id"]
        .as_str()
        .is_some_and(|id| id.starts_with("chatcmpl-")));
    let choice = &payload["choices"][0];
    assert_eq!(choice["index"], 0);
    assert_eq!(choice["message"]["role"], "assistant");
    assert_eq!(choice["message"]["content"], "<thinking>Hello");
    assert_eq!(choice["finish_reason"], "stop");
    assert_eq!(payload["usage"]["total_tokens"], 5);
}

#[tokio::test]
async fn test_non_streaming_tool_calls() {
    let call = |name: &str| {
        Ok(UpstreamEvent::ToolCode(FunctionCallPayload {
            name: Some(name.into()),
            args: Some(json!({})),
        }))
    };
    let upstream = scripted(vec![call("a"), call("b")]);
    let state = build_state(upstream, None);
    let response = post_chat(
        state,
        &json!({ "model": "gemini-2.5-pro", "messages": user_message("go"), "stream": false }),
    )
    .await;

    let payload = body_json(response).await;
    let message = &payload["choices"][0]["message"];
    assert!(message["content"].is_null());
    assert_eq!(message["tool_calls"][0]["index"], 0);
    assert_eq!(message["tool_calls"][1]["index"], 1);
    assert_eq!(message["tool_calls"][1]["function"]["name"], "b");
    assert_ne!(message["tool_calls"][0]["id"], message["tool_calls"][1]["id"]);
    assert_eq!(payload["choices"][0]["finish_reason"], "tool_calls");
}

#[tokio::test]
async fn test_non_streaming_upstream_failure_is_500() {
    let upstream = scripted(vec![Ok(UpstreamEvent::Text("partial".into())), Err("eof")]);
    let state = build_state(upstream, None);
    let response = post_chat(
        state,
        &json!({ "model": "gemini-2.5-pro", "messages": user_message("hello"), "stream": false }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = body_json(response).await;
    assert_eq!(payload["error"]["message"], "Transport error: eof");
    assert!(payload.get("choices").is_none());
}

#[tokio::test]
async fn test_validation_errors_are_400() {
    let upstream = scripted(Vec::new());
    let state = build_state(Arc::clone(&upstream), None);

    let response = post_chat(Arc::clone(&state), &json!({ "model": "gemini-2.5-pro" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = body_json(response).await;
    assert_eq!(payload["error"]["message"], "messages is a required field");
    assert_eq!(payload["error"]["type"], "invalid_request_error");

    let response = post_chat(
        Arc::clone(&state),
        &json!({ "model": "nope", "messages": user_message("hi") }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Model 'nope' not found. Available models: gemini-2.5-pro, gemini-2.5-flash, text-only"
    );

    let image_message = json!([{
        "role": "user",
        "content": [
            { "type": "text", "text": "what is this" },
            { "type": "image_url", "image_url": { "url": "data:image/png;base64,AAAA" } }
        ]
    }]);
    let response = post_chat(
        Arc::clone(&state),
        &json!({ "model": "text-only", "messages": image_message }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]["message"]
        .as_str()
        .is_some_and(|message| message.starts_with("Model 'text-only' does not support image inputs.")));

    assert_eq!(upstream.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let state = build_state(scripted(Vec::new()), None);
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("authorization", "Bearer client-key")
        .body(Body::from("{not json"))
        .expect("build request");
    let response = send(state, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"]["type"],
        "invalid_request_error"
    );
}

#[tokio::test]
async fn test_client_key_rejections() {
    let state = build_state(scripted(Vec::new()), None);

    let request = Request::builder()
        .method("GET")
        .uri("/v1/models")
        .body(Body::empty())
        .expect("build request");
    let response = send(Arc::clone(&state), request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"]["code"],
        "missing_authorization"
    );

    let request = Request::builder()
        .method("GET")
        .uri("/v1/models")
        .header("authorization", "Bearer wrong-key")
        .body(Body::empty())
        .expect("build request");
    let response = send(Arc::clone(&state), request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "invalid_api_key");

    let request = Request::builder()
        .method("GET")
        .uri("/v1/models")
        .header("authorization", "Token client-key")
        .body(Body::empty())
        .expect("build request");
    let response = send(state, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"]["code"],
        "invalid_authorization_format"
    );
}

#[tokio::test]
async fn test_upstream_auth_failure_is_401_without_stream() {
    let upstream = scripted(vec![Ok(UpstreamEvent::Text("Hi".into()))]);
    let state = build_state(Arc::clone(&upstream), Some("token expired"));
    let response = post_chat(
        state,
        &json!({ "model": "gemini-2.5-pro", "messages": user_message("hello") }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Authentication failed: token expired"
    );
    assert_eq!(upstream.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upstream_request_shaping() {
    let upstream = scripted(vec![Ok(UpstreamEvent::Text("ok".into()))]);
    let state = build_state(Arc::clone(&upstream), None);
    let response = post_chat(
        state,
        &json!({
            "model": "gemini-2.5-pro",
            "stream": false,
            "reasoning_effort": "high",
            "temperature": 0.5,
            "messages": [
                { "role": "system", "content": "first" },
                { "role": "user", "content": "hi" },
                { "role": "system", "content": "second" },
                { "role": "assistant", "content": "hello" }
            ]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let requests = upstream.requests.lock();
    let request = &requests[0];
    assert_eq!(request.system_prompt, "second");
    let roles: Vec<&str> = request.messages.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, ["user", "assistant"]);

    let generation = serde_json::to_value(&request.generation_config).expect("generation json");
    assert_eq!(generation["include_reasoning"], true);
    assert_eq!(generation["thinking_budget"], 32768);
    assert_eq!(generation["temperature"], 0.5);
    assert!(generation.get("max_tokens").is_none());
}

#[tokio::test]
async fn test_models_list_in_registry_order() {
    let state = build_state(scripted(Vec::new()), None);
    let request = Request::builder()
        .method("GET")
        .uri("/v1/models")
        .header("authorization", "Bearer client-key")
        .body(Body::empty())
        .expect("build request");
    let response = send(state, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let payload = body_json(response).await;
    assert_eq!(payload["object"], "list");
    let data = payload["data"].as_array().expect("data array");
    let ids: Vec<&str> = data.iter().filter_map(|m| m["id"].as_str()).collect();
    assert_eq!(ids, ["gemini-2.5-pro", "gemini-2.5-flash", "text-only"]);
    for model in data {
        assert_eq!(model["object"], "model");
        assert_eq!(model["owned_by"], "google-gemini-cli");
        assert!(model["created"].as_u64().is_some());
    }
}

#[tokio::test]
async fn test_public_routes_and_cors() {
    let state = build_state(scripted(Vec::new()), None);

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .expect("build request");
    let response = send(Arc::clone(&state), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let info = body_json(response).await;
    assert_eq!(info["authentication"]["required"], true);
    assert_eq!(info["endpoints"]["chat_completions"], "/v1/chat/completions");

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build request");
    let response = send(Arc::clone(&state), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let health = body_json(response).await;
    assert_eq!(health["status"], "ok");
    assert!(health["timestamp"]
        .as_str()
        .is_some_and(|ts| ts.ends_with('Z') && ts.contains('T')));

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/v1/chat/completions")
        .body(Body::empty())
        .expect("build request");
    let response = send(state, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()["access-control-allow-methods"],
        "GET, POST, OPTIONS"
    );
    assert_eq!(
        response.headers()["access-control-allow-headers"],
        "Content-Type, Authorization"
    );
}

#[tokio::test]
async fn test_unknown_path_wrong_method_and_oversized_body() {
    let state = build_state(scripted(Vec::new()), None);

    let request = Request::builder()
        .method("GET")
        .uri("/nowhere")
        .body(Body::empty())
        .expect("build request");
    assert_eq!(
        send(Arc::clone(&state), request).await.status(),
        StatusCode::NOT_FOUND
    );

    let request = Request::builder()
        .method("GET")
        .uri("/v1/chat/completions")
        .header("authorization", "Bearer client-key")
        .body(Body::empty())
        .expect("build request");
    assert_eq!(
        send(Arc::clone(&state), request).await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("authorization", "Bearer client-key")
        .body(Body::from(vec![b' '; 2 * 1024 * 1024 + 1]))
        .expect("build request");
    assert_eq!(
        send(state, request).await.status(),
        StatusCode::PAYLOAD_TOO_LARGE
    );
}

#[tokio::test]
async fn test_base_path_prefix() {
    let state = build_state(scripted(Vec::new()), None);
    let request = Request::builder()
        .method("GET")
        .uri("/relay/health")
        .body(Body::empty())
        .expect("build request");
    let response = dispatch_request(Arc::clone(&state), Arc::<str>::from("/relay"), request)
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build request");
    let response = dispatch_request(state, Arc::<str>::from("/relay"), request)
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_debug_endpoints() {
    let state = build_state(scripted(Vec::new()), None);

    let request = Request::builder()
        .method("GET")
        .uri("/v1/debug/cache")
        .header("authorization", "Bearer client-key")
        .body(Body::empty())
        .expect("build request");
    let payload = body_json(send(Arc::clone(&state), request).await).await;
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["cached"], true);
    assert_eq!(payload["time_until_expiry_seconds"], 3600);

    for uri in ["/v1/token-test", "/v1/debug/token-test"] {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("authorization", "Bearer client-key")
            .body(Body::empty())
            .expect("build request");
        let payload = body_json(send(Arc::clone(&state), request).await).await;
        assert_eq!(payload["message"], "Token authentication successful");
    }

    let failing = build_state(scripted(Vec::new()), Some("no token"));
    let request = Request::builder()
        .method("POST")
        .uri("/v1/token-test")
        .header("authorization", "Bearer client-key")
        .body(Body::empty())
        .expect("build request");
    let response = send(failing, request).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = body_json(response).await;
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["message"], "Authentication failed: no token");
}
