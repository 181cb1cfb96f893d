use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{self, Body};
use axum::extract::State;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::{chat, debug, health, models};
use crate::error::into_axum_response;
use crate::observability::{log_request_finished, log_request_started};
use crate::state::AppState;

const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

enum RouteMatch {
    Info,
    Health,
    Models,
    ChatCompletions,
    DebugCache,
    TokenTest,
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching handler.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method;
    let path = parts.uri.path().to_owned();

    let mut response = if method == Method::OPTIONS {
        log_request_started(&method, &path, None);
        StatusCode::NO_CONTENT.into_response()
    } else {
        route_request(state, &base_path, &method, &path, &parts.headers, body).await
    };

    apply_cors_headers(&mut response);
    log_request_finished(&method, &path, response.status(), start.elapsed());
    Ok(response)
}

async fn route_request(
    state: Arc<AppState>,
    base_path: &str,
    method: &Method,
    path: &str,
    headers: &http::HeaderMap,
    body: Body,
) -> Response {
    let Some(route_path) = strip_base_path(path, base_path) else {
        log_request_started(method, path, None);
        return StatusCode::NOT_FOUND.into_response();
    };
    let route = match_route(method, route_path);

    let body_bytes = if matches!(route, RouteMatch::ChatCompletions) {
        match read_request_body(body).await {
            Ok(bytes) => bytes,
            Err(response) => {
                log_request_started(method, path, None);
                return response;
            }
        }
    } else {
        bytes::Bytes::new()
    };
    log_request_started(method, path, Some(&String::from_utf8_lossy(&body_bytes)));

    if route_path.starts_with("/v1/") {
        if let Err(err) = state.authenticate_client(headers) {
            tracing::warn!(path, error = %err, "client key rejected");
            return into_axum_response(&err.into());
        }
    }

    match route {
        RouteMatch::Info => health::info_handler(State(state)).into_response(),
        RouteMatch::Health => health::health_handler().into_response(),
        RouteMatch::Models => models::handler(State(state)).into_response(),
        RouteMatch::ChatCompletions => chat::handler(State(state), body_bytes).await,
        RouteMatch::DebugCache => debug::cache_handler(State(state)).await,
        RouteMatch::TokenTest => debug::token_test_handler(State(state)).await,
        RouteMatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}

#[must_use]
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("/{}", trimmed.trim_end_matches('/'))
    }
}

fn apply_cors_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        http::header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        http::header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
}

async fn read_request_body(body: Body) -> Result<bytes::Bytes, Response> {
    body::to_bytes(body, DEFAULT_BODY_LIMIT_BYTES)
        .await
        .map_err(|_| {
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large (max 2MiB)",
            )
                .into_response()
        })
}

fn match_route(method: &Method, path: &str) -> RouteMatch {
    let (route, allowed) = match path {
        "/" => (RouteMatch::Info, Method::GET),
        "/health" | "/v1/health" => (RouteMatch::Health, Method::GET),
        "/v1/models" => (RouteMatch::Models, Method::GET),
        "/v1/chat/completions" => (RouteMatch::ChatCompletions, Method::POST),
        "/v1/debug/cache" => (RouteMatch::DebugCache, Method::GET),
        "/v1/token-test" | "/v1/debug/token-test" => (RouteMatch::TokenTest, Method::POST),
        _ => return RouteMatch::NotFound,
    };
    if *method == allowed {
        route
    } else {
        RouteMatch::MethodNotAllowed
    }
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(path);
    }

    let remainder = path.strip_prefix(base_path)?;
    if remainder.is_empty() {
        Some("/")
    } else if remainder.starts_with('/') {
        Some(remainder)
    } else {
        None
    }
}
