use crate::error::BridgeError;
use crate::protocol::openai_chat::{ChatMessage, MessageContent};
use crate::upstream::ModelRegistry;

const SYSTEM_ROLE: &str = "system";

/// Prompt parts sent upstream: the surviving system prompt and every
/// non-system message in original order.
#[derive(Debug, Clone)]
pub struct SplitMessages {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
}

/// Remove system messages, keeping the text of the last one as the prompt.
#[must_use]
pub fn split_messages(messages: Vec<ChatMessage>) -> SplitMessages {
    let mut system_prompt = String::new();
    let mut rest = Vec::with_capacity(messages.len());
    for message in messages {
        if message.role == SYSTEM_ROLE {
            system_prompt = system_text(message.content.as_ref());
        } else {
            rest.push(message);
        }
    }
    SplitMessages {
        system_prompt,
        messages: rest,
    }
}

fn system_text(content: Option<&MessageContent>) -> String {
    match content {
        None => String::new(),
        Some(MessageContent::Text(text)) => text.clone(),
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter(|part| part.is_text())
            .map(|part| part.text.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

#[must_use]
pub fn has_image_parts(messages: &[ChatMessage]) -> bool {
    messages.iter().any(|message| match &message.content {
        Some(MessageContent::Parts(parts)) => parts.iter().any(|part| part.is_image()),
        _ => false,
    })
}

/// Check a request before any upstream work happens.
///
/// # Errors
///
/// Returns `BridgeError::InvalidRequest` when the message list is empty, the
/// model is unknown, or images are sent to a text-only model.
pub fn validate_request_messages(
    model: &str,
    messages: &[ChatMessage],
    registry: &dyn ModelRegistry,
) -> Result<(), BridgeError> {
    if messages.is_empty() {
        return Err(BridgeError::InvalidRequest(
            "messages is a required field".to_string(),
        ));
    }
    if !registry.exists(model) {
        return Err(BridgeError::InvalidRequest(format!(
            "Model '{model}' not found. Available models: {}",
            registry.list_model_ids().join(", ")
        )));
    }
    if has_image_parts(messages) && !registry.supports_images(model) {
        let vision: Vec<String> = registry
            .list_model_ids()
            .into_iter()
            .filter(|id| registry.supports_images(id))
            .collect();
        let hint = if vision.is_empty() {
            String::new()
        } else {
            format!(" Please use a vision-capable model like {}.", vision.join(" or "))
        };
        return Err(BridgeError::InvalidRequest(format!(
            "Model '{model}' does not support image inputs.{hint}"
        )));
    }
    Ok(())
}
