use crate::protocol::error_shapes::openai_error_payload;

/// Why a client API key was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClientKeyError {
    #[error("Missing Authorization header")]
    Missing,
    #[error("Invalid Authorization header format. Expected: Bearer <token>")]
    BadFormat,
    #[error("Invalid API key")]
    Invalid,
}

impl ClientKeyError {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            ClientKeyError::Missing => "missing_authorization",
            ClientKeyError::BadFormat => "invalid_authorization_format",
            ClientKeyError::Invalid => "invalid_api_key",
        }
    }
}

/// Error type shared by every module of the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    ClientKey(#[from] ClientKeyError),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    ServerError,
}

impl BridgeError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            BridgeError::ClientKey(_) | BridgeError::Auth(_) => ErrorCategory::Authentication,
            BridgeError::Upstream { .. }
            | BridgeError::Transport(_)
            | BridgeError::Storage(_)
            | BridgeError::Internal(_) => ErrorCategory::ServerError,
        }
    }

    fn code_override(&self) -> Option<&'static str> {
        match self {
            BridgeError::ClientKey(key_err) => Some(key_err.code()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Category -> HTTP status code
// ---------------------------------------------------------------------------

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error as an `OpenAI` error body, returning (`status_code`, JSON body).
#[must_use]
pub fn format_error(err: &BridgeError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    let status = http_status_for_category(cat);
    let message = err.to_string();
    let body = openai_error_payload(cat, &message, err.code_override());
    (status, body)
}

// ---------------------------------------------------------------------------
// Axum integration
// ---------------------------------------------------------------------------

/// Convert a `BridgeError` into an axum response.
#[must_use]
pub fn into_axum_response(err: &BridgeError) -> axum::response::Response {
    use axum::response::IntoResponse;
    let (status, body) = format_error(err);
    (status, axum::Json(body)).into_response()
}

impl axum::response::IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        into_axum_response(&self)
    }
}
