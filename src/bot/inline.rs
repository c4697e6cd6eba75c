//! Inline "fortune" entry point and the button callback behind it.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InlineQueryResult,
    InlineQueryResultArticle, InputMessageContent, InputMessageContentText, ParseMode,
};
use tracing::warn;

use crate::config::FORTUNE_PROMPT;
use crate::gateway::Gateway;
use crate::utils::user_label;

/// Callback data prefix shared by the article, its button and the handler
const PREDICT_PREFIX: &str = "predict_";

/// Offer the single fortune article for any inline query.
///
/// Everyone gets the article; permissions only matter once the button press
/// triggers a generation.
///
/// # Errors
///
/// Returns an error if the inline answer cannot be sent.
pub async fn handle_inline_query(bot: Bot, q: InlineQuery) -> Result<()> {
    let label = user_label(Some(&q.from));
    let data = format!("{PREDICT_PREFIX}{}", q.from.id);

    let markup = InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
        "Угадай судьбу!",
        data.clone(),
    )]]);
    let content = InputMessageContentText::new(format!("Жми, {label}, чтобы узнать своё будущее!"))
        .parse_mode(ParseMode::Markdown);
    let article = InlineQueryResultArticle::new(
        data,
        format!("Угадай судьбу, {label}!"),
        InputMessageContent::Text(content),
    )
    .reply_markup(markup);

    bot.answer_inline_query(q.id.clone(), vec![InlineQueryResult::Article(article)])
        .cache_time(1)
        .is_personal(true)
        .await?;
    Ok(())
}

/// Answer a fortune button press: run the fortune prompt in the chat under
/// the button and put the result where the button message was.
///
/// # Errors
///
/// Returns an error if the callback cannot be acknowledged.
pub async fn handle_callback(bot: Bot, q: CallbackQuery, gateway: Arc<Gateway>) -> Result<()> {
    let label = user_label(Some(&q.from));
    // Pressed under an inline-sent message there is no chat; fall back to
    // the presser's private chat, whose id equals their user id.
    let chat_id = q
        .message
        .as_ref()
        .map_or_else(|| ChatId(q.from.id.0.cast_signed()), |m| m.chat().id);

    if q.data.as_deref().is_some_and(|d| d.starts_with(PREDICT_PREFIX)) {
        let text = match gateway
            .generate(chat_id, Some(FORTUNE_PROMPT.to_string()), None)
            .await
        {
            Ok(r) => r,
            Err(e) => format!("Ошибка Gemini: {e}"),
        };

        if let Err(e) = deliver(&bot, &q, chat_id, text).await {
            warn!("Fortune delivery failed: {}", e);
            let apology = format!("Что-то сломалось, {label}: {e}");
            if let Err(e) = deliver(&bot, &q, chat_id, apology).await {
                warn!("Fortune apology delivery failed: {}", e);
            }
            bot.answer_callback_query(q.id.clone())
                .text("Ошибка, дебил!")
                .await?;
            return Ok(());
        }
    }

    bot.answer_callback_query(q.id.clone())
        .text("Готово, лошара!")
        .await?;
    Ok(())
}

/// Edit the message under the button when it is reachable, otherwise send a
/// fresh one. Legacy Markdown, same as the button message itself.
async fn deliver(
    bot: &Bot,
    q: &CallbackQuery,
    chat_id: ChatId,
    text: String,
) -> Result<(), teloxide::RequestError> {
    if let Some(message) = &q.message {
        bot.edit_message_text(message.chat().id, message.id(), text)
            .parse_mode(ParseMode::Markdown)
            .await?;
    } else {
        bot.send_message(chat_id, text)
            .parse_mode(ParseMode::Markdown)
            .await?;
    }
    Ok(())
}
