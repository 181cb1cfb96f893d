use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::{info, warn};

use crate::error::BridgeError;
use crate::state::AppState;

/// Token cache status without any token material.
pub async fn cache_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.authenticator().token_cache_info().await {
        Ok(info) => {
            let mut body = serde_json::Map::new();
            body.insert("status".to_string(), json!("ok"));
            if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(&info) {
                body.extend(fields);
            }
            Json(serde_json::Value::Object(body)).into_response()
        }
        Err(err) => debug_error(&err),
    }
}

/// Run upstream authentication only.
pub async fn token_test_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.authenticator().authenticate().await {
        Ok(_) => {
            info!("token test passed");
            Json(json!({
                "status": "ok",
                "message": "Token authentication successful",
            }))
            .into_response()
        }
        Err(err) => debug_error(&err),
    }
}

fn debug_error(err: &BridgeError) -> Response {
    warn!(error = %err, "debug endpoint failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "status": "error",
            "message": err.to_string(),
        })),
    )
        .into_response()
}
