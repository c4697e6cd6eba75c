//! Generation pipeline: transcript assembly, the API exchange, reply capping.
//!
//! One exchange holds its conversation's lock from user-turn append to
//! model-turn append, so concurrent updates in the same chat queue up while
//! different chats run in parallel.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use teloxide::types::ChatId;

use crate::config::{MAX_RESPONSE_CHARS, RESPONSE_DIRECTIVE};
use crate::llm::{LlmError, Part, TextGenerator, Turn};
use crate::state::AppState;
use crate::utils::truncate_str;

/// Binary attachment heading into a user turn
#[derive(Debug, Clone)]
pub struct MediaPart {
    mime_type: &'static str,
    data: String,
}

impl MediaPart {
    /// Photo bytes as Telegram serves them
    #[must_use]
    pub fn jpeg(bytes: &[u8]) -> Self {
        Self {
            mime_type: "image/jpeg",
            data: STANDARD.encode(bytes),
        }
    }

    /// Static sticker bytes
    #[must_use]
    pub fn webp(bytes: &[u8]) -> Self {
        Self {
            mime_type: "image/webp",
            data: STANDARD.encode(bytes),
        }
    }
}

/// Front door for every generation request the handlers make.
pub struct Gateway {
    generator: Arc<dyn TextGenerator>,
    state: Arc<AppState>,
}

impl Gateway {
    /// Wire the gateway to its generator and the shared state
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, state: Arc<AppState>) -> Self {
        Self { generator, state }
    }

    /// Run one exchange in the chat's conversation.
    ///
    /// A user turn is appended first when there is any content, and stays in
    /// the transcript even when the call fails; the model turn is appended
    /// only on success, already capped at [`MAX_RESPONSE_CHARS`]. The
    /// returned text is the capped reply.
    pub async fn generate(
        &self,
        chat_id: ChatId,
        text: Option<String>,
        media: Option<MediaPart>,
    ) -> Result<String, LlmError> {
        let conversation = self.state.conversation(chat_id).await;
        let mut transcript = conversation.lock().await;

        if let Some(turn) = build_user_turn(text.as_deref(), media) {
            transcript.push(turn);
        }
        let reply = self.generator.generate_content(transcript.turns()).await?;

        let reply = truncate_str(reply, MAX_RESPONSE_CHARS);
        transcript.push(Turn::model_text(reply.clone()));
        Ok(reply)
    }
}

/// Non-empty text gets the response directive appended in parentheses; media
/// rides as inline data after it. A captionless photo produces a media-only
/// turn; no content at all produces no turn.
fn build_user_turn(text: Option<&str>, media: Option<MediaPart>) -> Option<Turn> {
    let mut parts = Vec::new();
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        parts.push(Part::text(format!("{text} ({RESPONSE_DIRECTIVE})")));
    }
    if let Some(media) = media {
        parts.push(Part::inline_data(media.mime_type, media.data));
    }
    (!parts.is_empty()).then(|| Turn::user(parts))
}
