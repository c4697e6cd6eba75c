//! Conversation wire types and the Gemini client.
//!
//! A transcript is the ordered list of [`Turn`]s sent as `contents` on every
//! generation call; the types here serialize to exactly the shape the Gemini
//! REST API expects.

pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the generation call
#[derive(Debug, Error)]
pub enum LlmError {
    /// The API answered with a non-success status or an unusable body
    #[error("API error: {0}")]
    ApiError(String),
    /// The request never produced an HTTP response
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The response body was not valid JSON
    #[error("JSON error: {0}")]
    JsonError(String),
}

/// Author of a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sent by the user; also used for the personality seed turn
    User,
    /// Generated by the model
    Model,
}

/// Base64 payload with its declared MIME type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    /// MIME type of the payload (`image/jpeg` or `image/webp` here)
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

/// One content fragment inside a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain text fragment
    Text {
        /// The text payload
        text: String,
    },
    /// Inline binary fragment
    InlineData {
        /// The wrapped payload
        inline_data: InlineData,
    },
}

impl Part {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an inline-data part from already base64-encoded bytes
    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }
}

/// One role-tagged unit of conversation content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored the turn
    pub role: Role,
    /// Content fragments of the turn
    pub parts: Vec<Part>,
}

impl Turn {
    /// A user turn with arbitrary parts
    #[must_use]
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// A user turn with a single text part
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![Part::text(text)])
    }

    /// A model turn with a single text part
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }
}

/// Seam over the external completion call.
///
/// [`GeminiClient`] is the production implementation; tests substitute a stub
/// so the gateway can be exercised without the network.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Submit the ordered transcript and return the generated text
    async fn generate_content(&self, transcript: &[Turn]) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_turn_wire_shape() {
        let turn = Turn::user_text("привет");
        let value = serde_json::to_value(&turn).expect("serialize");
        assert_eq!(
            value,
            json!({"role": "user", "parts": [{"text": "привет"}]})
        );
    }

    #[test]
    fn test_media_turn_wire_shape() {
        let turn = Turn::user(vec![
            Part::text("что на фото?"),
            Part::inline_data("image/jpeg", "QUJD"),
        ]);
        let value = serde_json::to_value(&turn).expect("serialize");
        assert_eq!(
            value,
            json!({
                "role": "user",
                "parts": [
                    {"text": "что на фото?"},
                    {"inline_data": {"mime_type": "image/jpeg", "data": "QUJD"}}
                ]
            })
        );
    }

    #[test]
    fn test_model_role_wire_shape() {
        let turn = Turn::model_text("ответ");
        let value = serde_json::to_value(&turn).expect("serialize");
        assert_eq!(value["role"], "model");
    }
}
