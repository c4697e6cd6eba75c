//! Caller privilege checks for gated commands.

use teloxide::prelude::*;
use teloxide::types::{Chat, UserId};
use tracing::warn;

use crate::state::AppState;

/// Whether the user is an administrator of the chat.
///
/// Private chats carry no administrator list; the peer is treated as the
/// admin of their own conversation. A failed lookup counts as not admin so a
/// Bot API hiccup cannot abort the update.
pub async fn is_admin(bot: &Bot, chat: &Chat, user_id: UserId) -> bool {
    if chat.is_private() {
        return true;
    }
    match bot.get_chat_administrators(chat.id).await {
        Ok(admins) => admins.iter().any(|member| member.user.id == user_id),
        Err(e) => {
            warn!(chat_id = chat.id.0, error = %e, "administrator lookup failed");
            false
        }
    }
}

/// Whether the user may talk to the model in this chat.
///
/// A grant in this chat wins without touching the Bot API; everyone else
/// goes through the administrator check.
pub async fn has_permission(bot: &Bot, state: &AppState, chat: &Chat, user_id: UserId) -> bool {
    if state.is_granted(chat.id, user_id).await {
        return true;
    }
    is_admin(bot, chat, user_id).await
}
