use serde::{Serialize, Serializer};

use crate::config::FeaturesConfig;
use crate::protocol::openai_chat::{
    ChatCompletionRequest, OpenAiStop, OpenAiTool, OpenAiToolChoice,
};

/// Substring of a model id that marks the lighter budget tier.
const FLASH_TIER_MARKER: &str = "flash";

const LOW_BUDGET: u32 = 1024;
const MEDIUM_BUDGET: u32 = 16384;
const MEDIUM_BUDGET_FLASH: u32 = 12288;
const HIGH_BUDGET: u32 = 32768;
const HIGH_BUDGET_FLASH: u32 = 24576;

/// Token cap on upstream reasoning. `Dynamic` leaves the choice to the
/// upstream and is sent as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThinkingBudget {
    #[default]
    Dynamic,
    Tokens(u32),
}

impl ThinkingBudget {
    /// Interpret a client-supplied numeric budget; negative values mean dynamic.
    #[must_use]
    pub fn from_client_value(value: i64) -> Self {
        if value < 0 {
            ThinkingBudget::Dynamic
        } else {
            ThinkingBudget::Tokens(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }

    #[must_use]
    pub fn as_wire_value(self) -> i64 {
        match self {
            ThinkingBudget::Dynamic => -1,
            ThinkingBudget::Tokens(tokens) => i64::from(tokens),
        }
    }
}

impl Serialize for ThinkingBudget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_wire_value())
    }
}

/// Named reasoning tier a client can send instead of a raw budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningEffort {
    None,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(ReasoningEffort::None),
            "low" => Some(ReasoningEffort::Low),
            "medium" => Some(ReasoningEffort::Medium),
            "high" => Some(ReasoningEffort::High),
            _ => None,
        }
    }

    /// Budget for this tier on the given model.
    #[must_use]
    pub fn budget_for(self, model: &str) -> ThinkingBudget {
        let flash = model.contains(FLASH_TIER_MARKER);
        let tokens = match self {
            ReasoningEffort::None => 0,
            ReasoningEffort::Low => LOW_BUDGET,
            ReasoningEffort::Medium if flash => MEDIUM_BUDGET_FLASH,
            ReasoningEffort::Medium => MEDIUM_BUDGET,
            ReasoningEffort::High if flash => HIGH_BUDGET_FLASH,
            ReasoningEffort::High => HIGH_BUDGET,
        };
        ThinkingBudget::Tokens(tokens)
    }
}

/// Deployment-wide reasoning settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasoningDefaults {
    pub enable_real_thinking: bool,
    pub default_thinking_budget: ThinkingBudget,
}

impl ReasoningDefaults {
    #[must_use]
    pub fn from_features(features: &FeaturesConfig) -> Self {
        Self {
            enable_real_thinking: features.enable_real_thinking,
            default_thinking_budget: features
                .default_thinking_budget
                .map_or(ThinkingBudget::Dynamic, ThinkingBudget::from_client_value),
        }
    }
}

/// Generation settings sent upstream. Pass-through parameters the client
/// did not set are omitted, never zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationConfig {
    pub include_reasoning: bool,
    pub thinking_budget: ThinkingBudget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<OpenAiStop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<OpenAiToolChoice>,
}

/// The effort string the client asked for: top-level field first, then
/// `extra_body`, then `model_params`. Empty strings count as absent.
#[must_use]
pub fn requested_effort(request: &ChatCompletionRequest) -> Option<&str> {
    non_empty(request.reasoning_effort.as_ref())
        .or_else(|| {
            non_empty(
                request
                    .extra_body
                    .as_ref()
                    .and_then(|extra| extra.reasoning_effort.as_ref()),
            )
        })
        .or_else(|| {
            non_empty(
                request
                    .model_params
                    .as_ref()
                    .and_then(|params| params.reasoning_effort.as_ref()),
            )
        })
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// Build the upstream generation config for a request targeting `model`.
#[must_use]
pub fn build_generation_config(
    request: &ChatCompletionRequest,
    model: &str,
    defaults: &ReasoningDefaults,
) -> GenerationConfig {
    let mut include_reasoning = defaults.enable_real_thinking;
    let mut thinking_budget = request
        .thinking_budget
        .map_or(defaults.default_thinking_budget, ThinkingBudget::from_client_value);

    if let Some(raw_effort) = requested_effort(request) {
        match ReasoningEffort::parse(raw_effort) {
            Some(effort) => {
                include_reasoning = effort != ReasoningEffort::None;
                thinking_budget = effort.budget_for(model);
            }
            None => {
                tracing::debug!(effort = raw_effort, "ignoring unrecognized reasoning effort");
            }
        }
    }

    GenerationConfig {
        include_reasoning,
        thinking_budget,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        stop: request.stop.clone(),
        presence_penalty: request.presence_penalty,
        frequency_penalty: request.frequency_penalty,
        seed: request.seed,
        response_format: request.response_format.clone(),
        tools: request.tools.clone(),
        tool_choice: request.tool_choice.clone(),
    }
}
