use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;
use crate::util::iso8601_now;

/// Service info served at the root path.
pub fn info_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let requires_auth = state.client_auth_required();
    Json(json!({
        "name": "gemini-relay-rs",
        "description": "OpenAI-compatible API for Gemini models",
        "version": env!("CARGO_PKG_VERSION"),
        "authentication": {
            "required": requires_auth,
            "type": if requires_auth { "Bearer token in Authorization header" } else { "None" },
        },
        "endpoints": {
            "chat_completions": "/v1/chat/completions",
            "models": "/v1/models",
            "health": "/health",
            "debug": {
                "cache": "/v1/debug/cache",
                "token_test": "/v1/token-test",
            }
        }
    }))
}

/// Health check handler.
pub fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": iso8601_now(),
    }))
}
