//! Event vocabulary of the upstream generation service.
//!
//! Every event arrives as `{"type": "<tag>", "data": <payload>}`. Decoding is
//! lenient at the field level (payload fields are optional) so the transcoder
//! can decide what a usable event is, but strict at the shape level: an event
//! with an unknown tag or a payload of the wrong JSON kind does not decode.

use serde::{Deserialize, Deserializer, Serialize};

/// One upstream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum UpstreamEvent {
    Text(String),
    ThinkingContent(String),
    RealThinking(String),
    Reasoning(ReasoningPayload),
    ToolCode(FunctionCallPayload),
    NativeTool(serde_json::Value),
    GroundingMetadata(serde_json::Value),
    Usage(UsagePayload),
}

/// Synthesized reasoning narrative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(
        default,
        rename = "toolCode",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_code: Option<serde_json::Value>,
}

/// A function-call request from the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `Some(Value::Null)` when the key is present with a null value.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub args: Option<serde_json::Value>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// Token accounting reported at the end of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePayload {
    #[serde(
        default,
        rename = "inputTokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_tokens: Option<u64>,
    #[serde(
        default,
        rename = "outputTokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub output_tokens: Option<u64>,
}

impl UpstreamEvent {
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            UpstreamEvent::Text(_) => "text",
            UpstreamEvent::ThinkingContent(_) => "thinking_content",
            UpstreamEvent::RealThinking(_) => "real_thinking",
            UpstreamEvent::Reasoning(_) => "reasoning",
            UpstreamEvent::ToolCode(_) => "tool_code",
            UpstreamEvent::NativeTool(_) => "native_tool",
            UpstreamEvent::GroundingMetadata(_) => "grounding_metadata",
            UpstreamEvent::Usage(_) => "usage",
        }
    }
}

/// Whether a `native_tool` payload has the `{type, data}` shape.
#[must_use]
pub fn is_native_tool_payload(payload: &serde_json::Value) -> bool {
    payload
        .as_object()
        .is_some_and(|obj| obj.contains_key("type") && obj.contains_key("data"))
}

/// Whether an opaque payload carries anything worth forwarding.
#[must_use]
pub fn is_present_payload(payload: &serde_json::Value) -> bool {
    match payload {
        serde_json::Value::Null | serde_json::Value::Bool(false) => false,
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Number(n) => n.as_f64() != Some(0.0),
        serde_json::Value::Array(_)
        | serde_json::Value::Object(_)
        | serde_json::Value::Bool(true) => true,
    }
}

/// Decode one SSE `data:` payload into an upstream event.
///
/// Returns `None` when the payload is not a recognizable event; the caller
/// drops it.
#[must_use]
pub fn decode_upstream_event(data: &str) -> Option<UpstreamEvent> {
    match serde_json::from_str::<UpstreamEvent>(data) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::debug!(error = %err, "dropping undecodable upstream event");
            None
        }
    }
}
