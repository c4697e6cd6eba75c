//! Photo and sticker flows: caption routing, download, one exchange, reply.

use std::sync::Arc;

use anyhow::Result;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileMeta, Sticker};
use tracing::{debug, info};

use crate::access::has_permission;
use crate::bot::reply_to;
use crate::config::{DEFAULT_PHOTO_QUERY, DEFAULT_STICKER_QUERY, WRITE_TRIGGER};
use crate::gateway::{Gateway, MediaPart};
use crate::state::AppState;
use crate::utils::{strip_prefix_ci, user_label};

/// Relay a photo (largest rendition) with its caption to the model.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_photo(
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
        info!(
            "Фото от {} в чате {} проигнорировано: нет прав",
            label, msg.chat.id
        );
        return Ok(());
    }

    let caption = msg.caption().unwrap_or("");
    let Some(query) = media_query(msg.chat.is_private(), caption, DEFAULT_PHOTO_QUERY) else {
        debug!(
            "Фото без '{}' от {} в чате {} проигнорировано",
            WRITE_TRIGGER, label, msg.chat.id
        );
        return Ok(());
    };

    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return Ok(());
    };

    match download(&bot, &photo.file).await {
        Ok(bytes) => {
            let response = match gateway
                .generate(msg.chat.id, query, Some(MediaPart::jpeg(&bytes)))
                .await
            {
                Ok(r) => r,
                Err(e) => format!("Ошибка Gemini: {e}"),
            };
            reply_to(
                &bot,
                &msg,
                format!("Вот тебе за фото, {label}, смотри: {response}"),
            )
            .await?;
        }
        Err(e) => {
            reply_to(&bot, &msg, format!("Ошибка с фото, {label}: {e}")).await?;
        }
    }
    Ok(())
}

/// Relay a static sticker to the model; animated and video stickers are
/// refused before anything is downloaded.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_sticker(
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
        info!(
            "Стикер от {} в чате {} проигнорирован: нет прав",
            label, msg.chat.id
        );
        return Ok(());
    }

    // Stickers never carry captions, so in group chats the trigger check
    // drops every one of them.
    let caption = msg.caption().unwrap_or("");
    let Some(query) = media_query(msg.chat.is_private(), caption, DEFAULT_STICKER_QUERY) else {
        debug!(
            "Стикер без '{}' от {} в чате {} проигнорирован",
            WRITE_TRIGGER, label, msg.chat.id
        );
        return Ok(());
    };

    let Some(sticker) = msg.sticker() else {
        return Ok(());
    };
    if unsupported_sticker(sticker) {
        reply_to(
            &bot,
            &msg,
            format!("Анимашки и видео-стикеры — не мой уровень, {label}, кидай нормальное!"),
        )
        .await?;
        return Ok(());
    }

    match download(&bot, &sticker.file).await {
        Ok(bytes) => {
            let response = match gateway
                .generate(msg.chat.id, query, Some(MediaPart::webp(&bytes)))
                .await
            {
                Ok(r) => r,
                Err(e) => format!("Ошибка Gemini: {e}"),
            };
            reply_to(
                &bot,
                &msg,
                format!("Разобрался с твоим стикером, {label}, вот: {response}"),
            )
            .await?;
        }
        Err(e) => {
            reply_to(&bot, &msg, format!("Ошибка со стикером, {label}: {e}")).await?;
        }
    }
    Ok(())
}

/// Caption routing for media.
///
/// In private chats any caption goes through, trimmed; an empty one means a
/// query-less submission. In groups the caption must carry the write trigger,
/// and a bare trigger falls back to `default_query`. `None` drops the update.
fn media_query(is_private: bool, caption: &str, default_query: &str) -> Option<Option<String>> {
    if is_private {
        let trimmed = caption.trim();
        return Some((!trimmed.is_empty()).then(|| trimmed.to_string()));
    }
    match strip_prefix_ci(caption, WRITE_TRIGGER) {
        Some(query) if !query.is_empty() => Some(Some(query)),
        Some(_) => Some(Some(default_query.to_string())),
        None => None,
    }
}

/// Only static `.webp` stickers can ride to the model as an image; animated
/// and video formats are refused before any download.
fn unsupported_sticker(sticker: &Sticker) -> bool {
    sticker.is_animated() || sticker.is_video()
}

/// Fetch a file's bytes through the Bot API.
async fn download(bot: &Bot, file: &FileMeta) -> Result<Vec<u8>> {
    let file = bot.get_file(file.id.clone()).await?;
    let mut buffer = Vec::new();
    bot.download_file(&file.path, &mut buffer).await?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::{FileId, FileUniqueId, StickerFormatFlags, StickerKind};

    fn sticker_with_flags(flags: StickerFormatFlags) -> Sticker {
        Sticker {
            file: FileMeta {
                id: FileId("CAACAgIAAxkBAAIFHW".to_owned()),
                unique_id: FileUniqueId("AgADBQ1G".to_owned()),
                size: 16639,
            },
            width: 512,
            height: 512,
            kind: StickerKind::Regular {
                premium_animation: None,
            },
            flags,
            thumbnail: None,
            emoji: Some("😡".to_owned()),
            set_name: None,
            needs_repainting: false,
        }
    }

    #[test]
    fn test_animated_and_video_stickers_are_refused() {
        let animated = sticker_with_flags(StickerFormatFlags {
            is_animated: true,
            is_video: false,
        });
        let video = sticker_with_flags(StickerFormatFlags {
            is_animated: false,
            is_video: true,
        });
        assert!(unsupported_sticker(&animated));
        assert!(unsupported_sticker(&video));
    }

    #[test]
    fn test_static_sticker_goes_through() {
        let sticker = sticker_with_flags(StickerFormatFlags {
            is_animated: false,
            is_video: false,
        });
        assert!(!unsupported_sticker(&sticker));
    }

    #[test]
    fn test_private_caption_goes_through_trimmed() {
        assert_eq!(
            media_query(true, "  что тут?  ", DEFAULT_PHOTO_QUERY),
            Some(Some("что тут?".to_string()))
        );
    }

    #[test]
    fn test_private_empty_caption_is_queryless() {
        assert_eq!(media_query(true, "", DEFAULT_PHOTO_QUERY), Some(None));
        assert_eq!(media_query(true, "   ", DEFAULT_PHOTO_QUERY), Some(None));
    }

    #[test]
    fn test_group_requires_trigger() {
        assert_eq!(media_query(false, "что тут?", DEFAULT_PHOTO_QUERY), None);
        assert_eq!(media_query(false, "", DEFAULT_PHOTO_QUERY), None);
    }

    #[test]
    fn test_group_bare_trigger_uses_default_query() {
        assert_eq!(
            media_query(false, "!пиши", DEFAULT_PHOTO_QUERY),
            Some(Some(DEFAULT_PHOTO_QUERY.to_string()))
        );
        assert_eq!(
            media_query(false, "!пиши  ", DEFAULT_STICKER_QUERY),
            Some(Some(DEFAULT_STICKER_QUERY.to_string()))
        );
    }

    #[test]
    fn test_group_trigger_is_case_insensitive() {
        assert_eq!(
            media_query(false, "!Пиши что на фото", DEFAULT_PHOTO_QUERY),
            Some(Some("что на фото".to_string()))
        );
    }
}
