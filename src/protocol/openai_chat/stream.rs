use crate::protocol::error_shapes::openai_stream_error_payload;
use crate::stream::sse::openai_sse_frame;

use super::ChatCompletionChunk;

pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// One record of the downstream SSE body.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    Chunk(ChatCompletionChunk),
    Error(String),
    Done,
}

impl StreamRecord {
    /// Encode the record as one `data: ...\n\n` SSE frame.
    #[must_use]
    pub fn to_sse_frame(&self) -> String {
        match self {
            StreamRecord::Chunk(chunk) => encode_chunk_sse(chunk),
            StreamRecord::Error(message) => encode_error_sse(message),
            StreamRecord::Done => DONE_FRAME.to_owned(),
        }
    }
}

/// Encode a chunk as an SSE frame.
#[must_use]
pub fn encode_chunk_sse(chunk: &ChatCompletionChunk) -> String {
    match serde_json::to_string(chunk) {
        Ok(json) => openai_sse_frame(&json),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize stream chunk");
            encode_error_sse("failed to serialize stream chunk")
        }
    }
}

/// Best-effort inline error record written when the upstream fails
/// mid-stream.
fn encode_error_sse(message: &str) -> String {
    openai_sse_frame(&openai_stream_error_payload(message).to_string())
}
