use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::controller::error::GatewayError;

pub mod anthropic;
pub mod openai;

pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// Provider-neutral chat message, the shape the feature frontends send.
/// Not persisted; lives for the duration of one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_media_type: Option<String>,
}

impl ChatMessage {
    pub fn has_image(&self) -> bool {
        self.image.as_deref().is_some_and(|data| !data.is_empty())
    }

    fn media_type(&self) -> &str {
        self.image_media_type
            .as_deref()
            .filter(|mt| !mt.is_empty())
            .unwrap_or(DEFAULT_IMAGE_MEDIA_TYPE)
    }
}

/// Validates the message list and merges the request-level image attachment
/// into it. The image always rides on the final turn: if the last message is
/// plain text it is rewritten to carry the attachment, it is never appended
/// as a message of its own.
pub fn normalize_messages(
    mut messages: Vec<ChatMessage>,
    image_base64: Option<String>,
    image_media_type: Option<String>,
) -> Result<Vec<ChatMessage>, GatewayError> {
    if messages.is_empty() {
        return Err(GatewayError::InvalidArgument(
            "messages must not be empty".to_string(),
        ));
    }

    if let Some(image) = image_base64.filter(|data| !data.is_empty()) {
        // A message-level image on the final turn wins over the request-level one.
        let last = messages
            .last_mut()
            .ok_or_else(|| GatewayError::InvalidArgument("messages must not be empty".to_string()))?;
        if !last.has_image() {
            last.image = Some(image);
            last.image_media_type = image_media_type;
        }
    }

    for msg in &messages {
        if let Some(image) = msg.image.as_deref() {
            if !image.is_empty() && BASE64.decode(image).is_err() {
                return Err(GatewayError::InvalidArgument(
                    "image payload is not valid base64".to_string(),
                ));
            }
        }
    }

    Ok(messages)
}
