//! SSE (Server-Sent Events) parsing for the upstream body and framing for the
//! downstream body.
//!
//! The parser buffers partial lines across arbitrary chunk boundaries and
//! follows the field rules of the
//! [SSE specification](https://html.spec.whatwg.org/multipage/server-sent-events.html).
use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use memchr::memchr_iter;

use crate::error::BridgeError;
use crate::protocol::upstream::{decode_upstream_event, UpstreamEvent};

const DONE_MARKER: &str = "[DONE]";

/// One dispatched SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub data: String,
}

impl SseEvent {
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data.trim() == DONE_MARKER
    }
}

/// Incremental SSE line parser.
///
/// Feed it text chunks and it yields fully-assembled [`SseEvent`] frames.
pub struct SseParser {
    buffer: String,
    read_offset: usize,
    data_buffer: String,
    has_data: bool,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            read_offset: 0,
            data_buffer: String::new(),
            has_data: false,
        }
    }

    /// Feed raw text and append complete events into a caller-provided buffer.
    ///
    /// - `data:` appends to the data buffer (one leading space stripped);
    ///   multiple `data:` lines are joined with `\n`
    /// - an empty line dispatches the frame
    /// - `:` lines are comments
    /// - `event:`, `id:`, `retry:` and unknown fields are ignored
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<SseEvent>) {
        self.buffer.push_str(chunk);
        let mut processed_up_to = self.read_offset;
        let scan_start = processed_up_to;
        let buffer = std::mem::take(&mut self.buffer);
        for rel_pos in memchr_iter(b'\n', &buffer.as_bytes()[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let line = &buffer[processed_up_to..line_end];
            self.process_line(line.strip_suffix('\r').unwrap_or(line), out);
            processed_up_to = line_end + 1;
        }
        self.buffer = buffer;

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Flush a trailing line and frame the peer left unterminated at EOF.
    pub fn finish_into(&mut self, out: &mut Vec<SseEvent>) {
        if self.read_offset < self.buffer.len() {
            let tail = self.buffer[self.read_offset..].to_string();
            self.process_line(tail.strip_suffix('\r').unwrap_or(&tail), out);
        }
        self.buffer.clear();
        self.read_offset = 0;
        self.process_line("", out);
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            if self.has_data {
                events.push(SseEvent {
                    data: std::mem::take(&mut self.data_buffer),
                });
                self.has_data = false;
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            if self.has_data {
                self.data_buffer.push('\n');
            } else {
                self.has_data = true;
            }
            self.data_buffer.push_str(value);
        }
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Format an OpenAI-style SSE frame (no event type, just data).
#[must_use]
pub fn openai_sse_frame(json: &str) -> String {
    let mut out = String::with_capacity(10 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

/// Bytes that ended mid code point, carried into the next chunk.
#[derive(Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    /// Decode as much of the buffered bytes as possible into `parser`.
    ///
    /// An incomplete trailing code point is carried. A byte sequence that can
    /// never become valid UTF-8 is an error; text before it is still parsed.
    fn feed(
        &mut self,
        bytes: &[u8],
        parser: &mut SseParser,
        out: &mut Vec<SseEvent>,
    ) -> Result<(), BridgeError> {
        self.pending.extend_from_slice(bytes);
        let err = match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                parser.feed_into(text, out);
                self.pending.clear();
                return Ok(());
            }
            Err(err) => err,
        };
        let valid_up_to = err.valid_up_to();
        if let Ok(text) = std::str::from_utf8(&self.pending[..valid_up_to]) {
            parser.feed_into(text, out);
        }
        if err.error_len().is_some() {
            self.pending.clear();
            return Err(invalid_utf8());
        }
        self.pending.drain(..valid_up_to);
        Ok(())
    }

    /// The body ended; a carried partial code point is invalid.
    fn finish(&mut self) -> Result<(), BridgeError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            self.pending.clear();
            Err(invalid_utf8())
        }
    }
}

fn invalid_utf8() -> BridgeError {
    BridgeError::Transport("upstream sent invalid UTF-8".to_string())
}

struct EventStreamState<S> {
    body: std::pin::Pin<Box<S>>,
    parser: SseParser,
    carry: Utf8Carry,
    pending: VecDeque<SseEvent>,
    scratch: Vec<SseEvent>,
    failure: Option<BridgeError>,
    finished: bool,
}

/// Turn an upstream SSE body into upstream events.
///
/// Each `data:` frame is decoded as one event; frames that do not decode are
/// dropped. The stream ends at `[DONE]` or EOF. A body read error or invalid
/// UTF-8 is yielded once as `BridgeError::Transport`, after the events decoded
/// before it, and ends the stream.
pub fn upstream_event_stream<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<UpstreamEvent, BridgeError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = EventStreamState {
        body: Box::pin(byte_stream),
        parser: SseParser::new(),
        carry: Utf8Carry::default(),
        pending: VecDeque::with_capacity(8),
        scratch: Vec::with_capacity(8),
        failure: None,
        finished: false,
    };
    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            while let Some(frame) = state.pending.pop_front() {
                if frame.is_done() {
                    state.pending.clear();
                    state.failure = None;
                    state.finished = true;
                    return None;
                }
                if let Some(event) = decode_upstream_event(&frame.data) {
                    return Some((Ok(event), state));
                }
            }
            if let Some(err) = state.failure.take() {
                return Some((Err(err), state));
            }
            if state.finished {
                return None;
            }

            match state.body.as_mut().next().await {
                Some(Ok(bytes)) => {
                    if let Err(err) =
                        state.carry.feed(&bytes, &mut state.parser, &mut state.scratch)
                    {
                        state.failure = Some(err);
                        state.finished = true;
                    }
                }
                Some(Err(err)) => {
                    state.failure = Some(BridgeError::Transport(format!(
                        "upstream stream interrupted: {err}"
                    )));
                    state.finished = true;
                }
                None => {
                    state.finished = true;
                    match state.carry.finish() {
                        Ok(()) => state.parser.finish_into(&mut state.scratch),
                        Err(err) => state.failure = Some(err),
                    }
                }
            }
            state.pending.extend(state.scratch.drain(..));
        }
    })
}
