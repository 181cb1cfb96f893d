use crate::protocol::openai_chat::stream::StreamRecord;
use crate::protocol::openai_chat::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, OpenAiToolCall, OpenAiToolCallFunction,
    OpenAiUsage, CHAT_COMPLETION_CHUNK_OBJECT,
};
use crate::protocol::upstream::{
    is_native_tool_payload, is_present_payload, FunctionCallPayload, ReasoningPayload,
    UpstreamEvent, UsagePayload,
};
use crate::util::{call_id, completion_id, next_session_uuid, unix_now_secs};

const ASSISTANT_ROLE: &str = "assistant";
const FINISH_STOP: &str = "stop";
const FINISH_TOOL_CALLS: &str = "tool_calls";

/// Converts upstream events into `OpenAI` chat completion chunks for one
/// stream.
///
/// `consume` is called once per upstream event and yields at most one delta
/// chunk. `finalize` takes the transcoder by value and produces the terminal
/// chunk followed by the `[DONE]` sentinel.
#[derive(Debug)]
pub struct ChatStreamTranscoder {
    session: uuid::Uuid,
    id: String,
    created: u64,
    model: String,
    role_announced: bool,
    active_tool_call_id: Option<String>,
    tool_calls_minted: u64,
    usage: Option<OpenAiUsage>,
}

impl ChatStreamTranscoder {
    /// Fresh transcoder with a new session id and the current time.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_envelope(next_session_uuid(), unix_now_secs(), model)
    }

    #[must_use]
    pub fn with_envelope(session: uuid::Uuid, created: u64, model: impl Into<String>) -> Self {
        Self {
            session,
            id: completion_id(session),
            created,
            model: model.into(),
            role_announced: false,
            active_tool_call_id: None,
            tool_calls_minted: 0,
            usage: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn usage(&self) -> Option<OpenAiUsage> {
        self.usage
    }

    /// Id of the most recent tool call, if any was emitted.
    #[must_use]
    pub fn active_tool_call_id(&self) -> Option<&str> {
        self.active_tool_call_id.as_deref()
    }

    pub fn consume(&mut self, event: UpstreamEvent) -> Option<ChatCompletionChunk> {
        let mut delta = ChunkDelta::default();
        match event {
            UpstreamEvent::Text(text) | UpstreamEvent::ThinkingContent(text) => {
                delta.content = Some(Some(text));
                self.announce_role(&mut delta);
            }
            UpstreamEvent::RealThinking(reasoning) => {
                delta.reasoning = Some(reasoning);
            }
            UpstreamEvent::Reasoning(ReasoningPayload { reasoning, .. }) => {
                if reasoning.is_none() {
                    tracing::debug!("dropping reasoning event without reasoning text");
                }
                delta.reasoning = reasoning;
            }
            UpstreamEvent::ToolCode(FunctionCallPayload {
                name: Some(name),
                args: Some(args),
            }) => {
                let id = self.mint_call_id();
                delta.tool_calls = Some(vec![OpenAiToolCall {
                    index: Some(0),
                    id: id.clone(),
                    type_: "function".to_string(),
                    function: OpenAiToolCallFunction {
                        name,
                        arguments: args.to_string(),
                    },
                }]);
                self.active_tool_call_id = Some(id);
                if !self.role_announced {
                    delta.content = Some(None);
                    self.announce_role(&mut delta);
                }
            }
            UpstreamEvent::ToolCode(_) => {
                tracing::warn!("dropping tool_code event without name or args");
            }
            UpstreamEvent::NativeTool(payload) => {
                if is_native_tool_payload(&payload) {
                    delta.native_tool_calls = Some(vec![payload]);
                } else {
                    tracing::debug!("dropping native_tool event without type/data");
                }
            }
            UpstreamEvent::GroundingMetadata(payload) => {
                if is_present_payload(&payload) {
                    delta.grounding = Some(payload);
                }
            }
            UpstreamEvent::Usage(UsagePayload {
                input_tokens,
                output_tokens,
            }) => {
                if let (Some(input), Some(output)) = (input_tokens, output_tokens) {
                    self.usage = Some(OpenAiUsage::from_counts(input, output));
                } else {
                    tracing::debug!("dropping usage event with missing counts");
                }
                return None;
            }
        }

        if delta.is_empty() {
            return None;
        }
        Some(self.chunk(delta, None, None))
    }

    /// Terminal chunk and sentinel; called once the upstream ended normally.
    #[must_use]
    pub fn finalize(self) -> [StreamRecord; 2] {
        let finish_reason = if self.tool_calls_minted > 0 {
            FINISH_TOOL_CALLS
        } else {
            FINISH_STOP
        };
        let terminal = self.chunk(ChunkDelta::default(), Some(finish_reason), self.usage);
        [StreamRecord::Chunk(terminal), StreamRecord::Done]
    }

    fn announce_role(&mut self, delta: &mut ChunkDelta) {
        if !self.role_announced {
            delta.role = Some(ASSISTANT_ROLE);
            self.role_announced = true;
        }
    }

    fn mint_call_id(&mut self) -> String {
        self.tool_calls_minted += 1;
        call_id(self.session, self.tool_calls_minted)
    }

    fn chunk(
        &self,
        delta: ChunkDelta,
        finish_reason: Option<&'static str>,
        usage: Option<OpenAiUsage>,
    ) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: CHAT_COMPLETION_CHUNK_OBJECT,
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage,
        }
    }
}
