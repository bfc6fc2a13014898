//! Outbound reply helpers
//!
//! All sends here are fire-and-forget from the core's standpoint: a failed
//! send is logged, never retried, and never allowed to influence a storage
//! mutation that already committed. Handlers therefore always mutate first
//! and notify second.

use std::path::Path;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, InputFile};

/// Send a plain text reply, logging on failure.
pub async fn send_text(bot: &Bot, chat_id: ChatId, text: &str) {
    if let Err(e) = bot.send_message(chat_id, text).await {
        log::error!("Failed to send message to chat {}: {}", chat_id, e);
    }
}

/// Send a text reply with an attached inline keyboard, logging on failure.
pub async fn send_text_with_keyboard(bot: &Bot, chat_id: ChatId, text: &str, keyboard: InlineKeyboardMarkup) {
    if let Err(e) = bot.send_message(chat_id, text).reply_markup(keyboard).await {
        log::error!("Failed to send message to chat {}: {}", chat_id, e);
    }
}

/// Send a photo with caption, preferring the local file and falling back to
/// the stored reference URL. Logs on failure; a lost photo degrades to a
/// plain text reply so the caller's outcome message still reaches the user.
pub async fn send_photo_with_caption(bot: &Bot, chat_id: ChatId, local_path: Option<&Path>, image_url: &str, caption: &str) {
    let input = match local_path {
        Some(path) if path.exists() => Some(InputFile::file(path.to_path_buf())),
        _ => match url::Url::parse(image_url) {
            Ok(parsed) if parsed.scheme().starts_with("http") => Some(InputFile::url(parsed)),
            _ => None,
        },
    };

    match input {
        Some(file) => {
            if let Err(e) = bot.send_photo(chat_id, file).caption(caption).await {
                log::error!("Failed to send photo to chat {}: {}", chat_id, e);
                send_text(bot, chat_id, caption).await;
            }
        }
        None => send_text(bot, chat_id, &format!("{}\n{}", caption, image_url)).await,
    }
}

/// Answer a callback query with a short status. Every button press is
/// acknowledged exactly once; failures are logged and swallowed.
pub async fn answer_callback(bot: &Bot, q: &teloxide::types::CallbackQuery, text: &str) {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).text(text).await {
        log::error!("Failed to answer callback query {:?}: {}", q.id, e);
    }
}
