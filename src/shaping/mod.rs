//! Request shaping: client parameters to upstream generation settings, and
//! client messages to upstream prompt parts.

mod generation;
mod messages;

pub use generation::{
    build_generation_config, requested_effort, GenerationConfig, ReasoningDefaults,
    ReasoningEffort, ThinkingBudget,
};
pub use messages::{has_image_parts, split_messages, validate_request_messages, SplitMessages};
