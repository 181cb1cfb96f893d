use crate::protocol::openai_chat::{
    ChatCompletionResponse, OpenAiToolCall, OpenAiToolCallFunction, OpenAiUsage,
    ResponseChoice, ResponseMessage, CHAT_COMPLETION_OBJECT,
};
use crate::protocol::upstream::{FunctionCallPayload, UpstreamEvent, UsagePayload};
use crate::util::{call_id, completion_id, next_session_uuid, unix_now_secs};

/// Drains upstream events into a single non-streaming completion.
#[derive(Debug)]
pub struct CompletionAccumulator {
    session: uuid::Uuid,
    model: String,
    content: String,
    tool_calls: Vec<OpenAiToolCall>,
    usage: Option<OpenAiUsage>,
}

impl CompletionAccumulator {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            session: next_session_uuid(),
            model: model.into(),
            content: String::new(),
            tool_calls: Vec::new(),
            usage: None,
        }
    }

    pub fn push(&mut self, event: UpstreamEvent) {
        match event {
            UpstreamEvent::Text(text) | UpstreamEvent::ThinkingContent(text) => {
                self.content.push_str(&text);
            }
            UpstreamEvent::ToolCode(FunctionCallPayload {
                name: Some(name),
                args: Some(args),
            }) => {
                let index = u32::try_from(self.tool_calls.len()).unwrap_or(u32::MAX);
                let n = u64::from(index) + 1;
                self.tool_calls.push(OpenAiToolCall {
                    index: Some(index),
                    id: call_id(self.session, n),
                    type_: "function".to_string(),
                    function: OpenAiToolCallFunction {
                        name,
                        arguments: args.to_string(),
                    },
                });
            }
            UpstreamEvent::Usage(UsagePayload {
                input_tokens: Some(input),
                output_tokens: Some(output),
            }) => {
                self.usage = Some(OpenAiUsage::from_counts(input, output));
            }
            UpstreamEvent::ToolCode(_)
            | UpstreamEvent::Usage(_)
            | UpstreamEvent::RealThinking(_)
            | UpstreamEvent::Reasoning(_)
            | UpstreamEvent::NativeTool(_)
            | UpstreamEvent::GroundingMetadata(_) => {}
        }
    }

    #[must_use]
    pub fn usage(&self) -> Option<OpenAiUsage> {
        self.usage
    }

    #[must_use]
    pub fn into_response(self) -> ChatCompletionResponse {
        let has_tool_calls = !self.tool_calls.is_empty();
        let content = if self.content.is_empty() && has_tool_calls {
            None
        } else {
            Some(self.content)
        };
        ChatCompletionResponse {
            id: completion_id(self.session),
            object: CHAT_COMPLETION_OBJECT,
            created: unix_now_secs(),
            model: self.model,
            choices: vec![ResponseChoice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant",
                    content,
                    tool_calls: has_tool_calls.then_some(self.tool_calls),
                },
                finish_reason: if has_tool_calls { "tool_calls" } else { "stop" },
            }],
            usage: self.usage,
        }
    }
}
