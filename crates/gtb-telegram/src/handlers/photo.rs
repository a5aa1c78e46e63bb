use std::sync::Arc;

use teloxide::prelude::*;

use gtb_core::{
    domain::{ChatId, UserId},
    i18n::Key,
    messaging::types::{InlineButton, InlineKeyboard},
    ports::Prompt,
};

use crate::router::{AppState, PendingPhoto};

use super::download_bytes;

const PHOTO_TASK_PROMPT: &str =
    "Look at the image and answer in the same language as the task on the photo.";

/// Answer a photographed task through the answer upstream.
pub(crate) async fn process_photo_task(
    state: &AppState,
    chat: ChatId,
    user_id: UserId,
    bytes: Vec<u8>,
    caption: Option<&str>,
) {
    let text = match caption {
        Some(c) if !c.trim().is_empty() => c.to_string(),
        _ => PHOTO_TASK_PROMPT.to_string(),
    };
    let prompt = Prompt::with_image(text, "image/jpeg", bytes);
    let _ = state.orch.answer(chat, user_id, &prompt).await;
}

pub async fn handle_photo(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(photos) = msg.photo() else {
        return Ok(());
    };
    let Some(best) = photos.last() else {
        return Ok(());
    };

    let user_id = UserId(user.id.0 as i64);
    let chat = ChatId(msg.chat.id.0);

    let bytes = match download_bytes(&bot, &best.file.id).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(user = user_id.0, "photo download failed: {e}");
            let _ = state
                .messenger
                .send_text(chat, state.prefs.text_for(user_id, Key::UpstreamFailed))
                .await;
            return Ok(());
        }
    };

    // Subscribers never pay with receipts mid-term, so a photo from them is
    // always a task.
    if state.ledger.is_subscribed(user_id) {
        process_photo_task(&state, chat, user_id, bytes, msg.caption()).await;
        return Ok(());
    }

    state.pending_photos.lock().await.insert(
        user_id.0,
        PendingPhoto {
            bytes,
            caption: msg.caption().map(str::to_string),
        },
    );

    let keyboard = InlineKeyboard::row(vec![
        InlineButton::new(state.prefs.text_for(user_id, Key::ThisIsTask), "img_task"),
        InlineButton::new(
            state.prefs.text_for(user_id, Key::ThisIsReceipt),
            "img_receipt",
        ),
    ]);
    let _ = state
        .messenger
        .send_inline_keyboard(
            chat,
            state.prefs.text_for(user_id, Key::ChooseImageType),
            keyboard,
        )
        .await;

    Ok(())
}
