//! Telegram update handlers.
//!
//! Each handler validates the sender, downloads media when needed, and calls
//! into the `gtb-core` orchestrator. Per-user requests are serialized through
//! `UserLocks`.

use std::sync::Arc;

use teloxide::{net::Download, prelude::*, types::CallbackQuery};

use crate::router::AppState;

mod callback;
mod commands;
mod document;
mod photo;
mod text;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;

    if let Some(text) = msg.text() {
        let _guard = state.user_locks.lock_user(user_id).await;
        if text.starts_with('/') {
            return commands::handle_command(bot, msg, state).await;
        }
        return text::handle_text(msg, state).await;
    }

    if msg.photo().is_some() {
        let _guard = state.user_locks.lock_user(user_id).await;
        return photo::handle_photo(bot, msg, state).await;
    }

    if msg.document().is_some() {
        let _guard = state.user_locks.lock_user(user_id).await;
        return document::handle_document(bot, msg, state).await;
    }

    Ok(())
}

/// Download a Telegram file into memory.
pub(crate) async fn download_bytes(bot: &Bot, file_id: &str) -> anyhow::Result<Vec<u8>> {
    let file = bot.get_file(file_id.to_string()).await?;
    let mut buf = std::io::Cursor::new(Vec::new());
    bot.download_file(&file.path, &mut buf).await?;
    Ok(buf.into_inner())
}
