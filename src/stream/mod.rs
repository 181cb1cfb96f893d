pub mod aggregate;
pub mod sse;
pub mod transcoder;

pub use aggregate::CompletionAccumulator;
pub use sse::{openai_sse_frame, upstream_event_stream, SseEvent, SseParser};
pub use transcoder::ChatStreamTranscoder;
