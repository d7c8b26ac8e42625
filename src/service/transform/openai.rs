use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ChatMessage, ChatRole};
use crate::proxy::router::ResolvedRequest;

/// Wire body of the OpenAI Chat Completions API.
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAiRequestPayload {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub messages: Vec<OpenAiMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAiMessage {
    pub role: String,
    pub content: Value, // A bare string, or an array of content entries.
}

fn role_str(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::System => "system",
    }
}

/// Builds the Chat Completions body. A system prompt is prepended as its own
/// `system` message; a message carrying an image becomes a content array with
/// a base64 data-URI entry followed by the text entry.
pub fn build_request(
    resolved: &ResolvedRequest,
    system_prompt: Option<&str>,
    messages: &[ChatMessage],
) -> OpenAiRequestPayload {
    let mut wire_messages = Vec::with_capacity(messages.len() + 1);

    if let Some(prompt) = system_prompt.filter(|prompt| !prompt.is_empty()) {
        wire_messages.push(OpenAiMessage {
            role: "system".to_string(),
            content: json!(prompt),
        });
    }

    for msg in messages {
        let content = match &msg.image {
            Some(image) if msg.has_image() => {
                let data_uri = format!("data:{};base64,{}", msg.media_type(), image);
                json!([
                    { "type": "image_url", "image_url": { "url": data_uri } },
                    { "type": "text", "text": msg.content },
                ])
            }
            _ => json!(msg.content),
        };
        wire_messages.push(OpenAiMessage {
            role: role_str(msg.role).to_string(),
            content,
        });
    }

    OpenAiRequestPayload {
        model: resolved.model.clone(),
        max_tokens: resolved.max_tokens,
        temperature: resolved.temperature,
        messages: wire_messages,
    }
}

/// Reads `choices[0].message.content` and the usage counters from a success
/// response. Missing fields fall back to empty/zero instead of failing the call.
pub fn parse_response(body: &Value) -> (String, u32, u32) {
    let text = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let input_tokens = body
        .pointer("/usage/prompt_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let output_tokens = body
        .pointer("/usage/completion_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    (text, input_tokens, output_tokens)
}
