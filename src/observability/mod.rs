use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex_lite::Regex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::protocol::openai_chat::OpenAiUsage;

/// Longest request body prefix written to the request log.
pub const MAX_LOGGED_BODY_CHARS: usize = 500;

static SENSITIVE_FIELD: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?i)"(api_?key|token|authorization)":\s*"[^"]*""#).ok()
});

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
pub fn init_tracing(log_level: &str) {
    let level = log_level.to_uppercase();

    if level == "DISABLED" {
        return;
    }

    let tracing_level = match level.as_str() {
        "WARNING" => "WARN",
        "CRITICAL" => "ERROR",
        other => other,
    };

    let filter = EnvFilter::try_new(tracing_level).unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Body text safe for the request log: truncated, with credential-looking
/// string fields replaced by `***`.
#[must_use]
pub fn redact_body_for_log(body: &str) -> String {
    let truncated = match body.char_indices().nth(MAX_LOGGED_BODY_CHARS) {
        Some((cut, _)) => {
            let mut head = body[..cut].to_string();
            head.push_str("...");
            head
        }
        None => body.to_string(),
    };
    match SENSITIVE_FIELD.as_ref() {
        Some(re) => re.replace_all(&truncated, r#""$1": "***""#).into_owned(),
        None => truncated,
    }
}

pub fn log_request_started(method: &http::Method, path: &str, body: Option<&str>) {
    match body {
        Some(body) if !body.is_empty() => info!(
            %method,
            path,
            body = %redact_body_for_log(body),
            "request started"
        ),
        _ => info!(%method, path, "request started"),
    }
}

pub fn log_request_finished(
    method: &http::Method,
    path: &str,
    status: http::StatusCode,
    elapsed: Duration,
) {
    info!(
        %method,
        path,
        status = status.as_u16(),
        duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "request completed"
    );
}

/// Log token usage for a completed completion, computing duration from start time.
pub fn log_request_complete(model: &str, usage: Option<OpenAiUsage>, start_time: Instant) {
    let duration_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
    match usage {
        Some(usage) => info!(
            model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            duration_ms,
            "completion finished"
        ),
        None => info!(model, duration_ms, "completion finished without usage"),
    }
}
