//! Telegram-facing layer: dispatch targets and reply plumbing.

/// Command handlers, the grant flow and the gated text flow
pub mod handlers;
/// Inline fortune entry point and its callback
pub mod inline;
/// Photo and sticker flows
pub mod media;

use teloxide::prelude::*;
use teloxide::types::{Message, ParseMode, ReplyParameters};

/// Send `text` as a reply to `msg`, plain.
pub(crate) async fn reply_to(
    bot: &Bot,
    msg: &Message,
    text: impl Into<String>,
) -> Result<Message, teloxide::RequestError> {
    bot.send_message(msg.chat.id, text)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await
}

/// Send `text` as a reply to `msg`, rendered as legacy Markdown.
pub(crate) async fn reply_to_markdown(
    bot: &Bot,
    msg: &Message,
    text: impl Into<String>,
) -> Result<Message, teloxide::RequestError> {
    bot.send_message(msg.chat.id, text)
        .reply_parameters(ReplyParameters::new(msg.id))
        .parse_mode(ParseMode::Markdown)
        .await
}
