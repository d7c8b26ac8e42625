use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ChatMessage, ChatRole};
use crate::proxy::router::ResolvedRequest;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Wire body of the Anthropic Messages API.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicRequestPayload {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: Value, // A bare string, or an array of content blocks.
}

/// Builds the Messages API body. The system prompt travels as the top-level
/// `system` field; a message carrying an image becomes a two-block content
/// array with the image block first.
pub fn build_request(
    resolved: &ResolvedRequest,
    system_prompt: Option<&str>,
    messages: &[ChatMessage],
) -> AnthropicRequestPayload {
    let wire_messages = messages
        .iter()
        .map(|msg| {
            // Anthropic only accepts user/assistant turns in the message list.
            let role = match msg.role {
                ChatRole::Assistant => "assistant",
                _ => "user",
            };
            let content = match &msg.image {
                Some(image) if msg.has_image() => json!([
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": msg.media_type(),
                            "data": image,
                        },
                    },
                    { "type": "text", "text": msg.content },
                ]),
                _ => json!(msg.content),
            };
            AnthropicMessage {
                role: role.to_string(),
                content,
            }
        })
        .collect();

    AnthropicRequestPayload {
        model: resolved.model.clone(),
        max_tokens: resolved.max_tokens,
        temperature: resolved.temperature,
        system: system_prompt
            .filter(|prompt| !prompt.is_empty())
            .map(str::to_string),
        messages: wire_messages,
    }
}

/// Reads `content[0].text` and the usage counters from a success response.
/// Missing fields fall back to empty/zero instead of failing the call.
pub fn parse_response(body: &Value) -> (String, u32, u32) {
    let text = body
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let input_tokens = body
        .pointer("/usage/input_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let output_tokens = body
        .pointer("/usage/output_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    (text, input_tokens, output_tokens)
}
