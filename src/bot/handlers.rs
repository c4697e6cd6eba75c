//! Command handlers, the grant flow and the gated text flow.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMember, UserId};
use teloxide::utils::command::BotCommands;
use tracing::info;

use crate::access::{has_permission, is_admin};
use crate::bot::{reply_to, reply_to_markdown};
use crate::config::{GRANT_TRIGGER, WRITE_TRIGGER};
use crate::gateway::Gateway;
use crate::state::AppState;
use crate::utils::{strip_prefix_ci, user_label};

/// Chat commands the dispatcher recognizes
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Поддерживаемые команды:")]
pub enum Command {
    /// Greeting with usage instructions
    #[command(description = "эта инструкция (только админы в чатах)")]
    Start,
    /// Drop the chat's conversation history
    #[command(description = "очистить историю (админы)")]
    Clear,
    /// Replace the personality and reseed every conversation
    #[command(description = "сменить тон (админы)")]
    Setstyle(String),
}

/// Greet an admin with the usage text, scold everyone else.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let label = user_label(Some(&user));

    if !is_admin(&bot, &msg.chat, user.id).await {
        reply_to(
            &bot,
            &msg,
            format!("Эй, только админы могут мной командовать в чатах, {label}, вали отсюда!"),
        )
        .await?;
        return Ok(());
    }

    let welcome = format!(
        "*Привет от твоего дерзкого бога на Gemini, {label}!*\n\n\
         Я тут, чтобы разносить всё и всех без фильтров. Gemini-2.0-flash в деле, так что готовься к жёстким ответам!\n\n\
         *Как мной пользоваться:*\n\
         1. В ЛС — пиши текст, кидай фото, стикеры, что угодно — я разберу.\n\
         2. В чатах — начинай с `!пиши [запрос]`, иначе я тебя не замечу, лошара.\n\
         3. Пиши `@MrBalbesBot` в чате — жми кнопку для угара.\n\
         4. Админы могут дать права: `!права @username` или `!права user_id`.\n\n\
         *Команды:*\n\
         ✨ `/start` — Эта инструкция (только админы в чатах).\n\
         ✨ `/clear` — Очистить историю (админы).\n\
         ✨ `/setstyle [стиль]` — Сменить мой тон (админы).\n\n\
         Давай, {label}, жги или вали!"
    );
    reply_to_markdown(&bot, &msg, welcome).await?;
    Ok(())
}

/// Drop the chat's conversation so the next message starts from the seed.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn clear(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let label = user_label(Some(&user));

    if !is_admin(&bot, &msg.chat, user.id).await {
        reply_to(&bot, &msg, format!("Только админы чистят, {label}, пшёл вон!")).await?;
        return Ok(());
    }

    state.clear_conversation(msg.chat.id).await;
    reply_to(
        &bot,
        &msg,
        format!("Всё стёрто, {label}, начинай заново, если мозгов хватит."),
    )
    .await?;
    Ok(())
}

/// Install a new personality and reseed every conversation with it.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn set_style(bot: Bot, msg: Message, state: Arc<AppState>, style: String) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let label = user_label(Some(&user));

    if !is_admin(&bot, &msg.chat, user.id).await {
        reply_to(&bot, &msg, format!("Только админы меняют стиль, {label}, вали!")).await?;
        return Ok(());
    }

    // Collapse runs of whitespace, same as rebuilding from split words.
    let style = style.split_whitespace().collect::<Vec<_>>().join(" ");
    if style.is_empty() {
        reply_to(&bot, &msg, format!("Давай стиль, {label}, а не пустую хрень!")).await?;
        return Ok(());
    }

    state.set_personality(style.clone()).await;
    reply_to(&bot, &msg, format!("Стиль теперь: {style}, {label}, доволен?")).await?;
    Ok(())
}

/// Grant a chat member the right to talk to the model in this chat.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn grant(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let label = user_label(Some(&user));

    if !is_admin(&bot, &msg.chat, user.id).await {
        reply_to(
            &bot,
            &msg,
            format!("Только админы раздают права, {label}, пшёл отсюда!"),
        )
        .await?;
        return Ok(());
    }

    let target = msg
        .text()
        .and_then(|t| strip_prefix_ci(t, GRANT_TRIGGER))
        .unwrap_or_default();
    if target.is_empty() {
        reply_to(
            &bot,
            &msg,
            format!("Кому права, {label}? Пиши '!права @username' или '!права user_id'!"),
        )
        .await?;
        return Ok(());
    }

    match resolve_target(&bot, msg.chat.id, &target).await {
        Ok(member) => {
            let mention = member
                .user
                .username
                .clone()
                .unwrap_or_else(|| member.user.id.to_string());
            if state.grant(msg.chat.id, member.user.id).await {
                reply_to(
                    &bot,
                    &msg,
                    format!("Права выданы: @{mention}, спасибо, {label}!"),
                )
                .await?;
            } else {
                reply_to(
                    &bot,
                    &msg,
                    format!("У @{mention} уже есть права, {label}, не тупи!"),
                )
                .await?;
            }
        }
        Err(e) => {
            reply_to(&bot, &msg, format!("Ошибка с правами, {label}: {e}")).await?;
        }
    }
    Ok(())
}

/// Resolve the grant argument to a member of the chat.
async fn resolve_target(bot: &Bot, chat_id: ChatId, target: &str) -> Result<ChatMember, String> {
    let user_id = parse_grant_target(target)?;
    bot.get_chat_member(chat_id, user_id)
        .await
        .map_err(|e| e.to_string())
}

/// Parse the grant argument into a user id.
///
/// The Bot API only looks members up by numeric id, so an `@username`
/// argument reports as an error, same shape as an id that is not in the
/// chat.
fn parse_grant_target(target: &str) -> Result<UserId, String> {
    if let Some(username) = target.strip_prefix('@') {
        return Err(format!(
            "не могу найти @{username}, Bot API ищет только по числовому id"
        ));
    }
    target.parse::<u64>().map(UserId).map_err(|e| e.to_string())
}

/// Relay a text message to the model and reply with the result.
///
/// Unprivileged senders are ignored without a reply. In group chats the text
/// must start with the write trigger; a bare trigger earns a scolding.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    gateway: Arc<Gateway>,
) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let label = user_label(Some(&user));

    if !has_permission(&bot, &state, &msg.chat, user.id).await {
        info!("Нет прав у {} в чате {}", label, msg.chat.id);
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    let text = text.trim();

    let query = if msg.chat.is_private() {
        text.to_string()
    } else {
        match strip_prefix_ci(text, WRITE_TRIGGER) {
            Some(query) if !query.is_empty() => query,
            Some(_) => {
                reply_to(
                    &bot,
                    &msg,
                    format!("Пиши запрос после '{WRITE_TRIGGER}', {label}, тупой что ли?"),
                )
                .await?;
                return Ok(());
            }
            None => return Ok(()),
        }
    };

    let response = match gateway.generate(msg.chat.id, Some(query), None).await {
        Ok(r) => r,
        Err(e) => format!("Ошибка Gemini: {e}"),
    };
    reply_to(&bot, &msg, format!("Вот тебе, {label}, жри: {response}")).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grant_target_numeric() {
        assert_eq!(parse_grant_target("123456"), Ok(UserId(123456)));
    }

    #[test]
    fn test_parse_grant_target_username_is_an_error() {
        let err = parse_grant_target("@balbes").expect_err("usernames cannot be resolved");
        assert!(err.contains("@balbes"));
    }

    #[test]
    fn test_parse_grant_target_garbage_is_an_error() {
        assert!(parse_grant_target("не-число").is_err());
        assert!(parse_grant_target("-5").is_err());
    }

    #[test]
    fn test_setstyle_takes_the_whole_tail() {
        let cmd = Command::parse("/setstyle злой и дерзкий", "MrBalbesBot").expect("parses");
        match cmd {
            Command::Setstyle(style) => assert_eq!(style, "злой и дерзкий"),
            _ => panic!("expected Setstyle"),
        }
    }

    #[test]
    fn test_setstyle_without_argument_parses_empty() {
        let cmd = Command::parse("/setstyle", "MrBalbesBot").expect("parses");
        match cmd {
            Command::Setstyle(style) => assert_eq!(style, ""),
            _ => panic!("expected Setstyle"),
        }
    }
}
