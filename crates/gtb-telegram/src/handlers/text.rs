use std::sync::Arc;

use teloxide::prelude::*;

use gtb_core::{
    domain::{ChatId, UserId},
    i18n::Key,
    messaging::types::{InlineButton, InlineKeyboard},
    ports::Prompt,
    triggers,
};

use crate::router::{Announcement, AppState};

const TEXT_PROMPT_PREFIX: &str = "Answer in the same language as the user's message.\n\n";

const LINK_PROMPT: &str = "Answer ALL questions from the test. Pick only ONE correct option for \
     each question. List answers in order with the question number and a short explanation in \
     the same language as the questions. At the end write: AI can make mistakes.";

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user_id = UserId(user.id.0 as i64);
    let chat = ChatId(msg.chat.id.0);

    // Admin in announcement mode: this text becomes the draft.
    if user_id.0 == state.cfg.admin_id {
        let mut ann = state.announcement.lock().await;
        if matches!(*ann, Announcement::Armed) {
            *ann = Announcement::Draft(text.to_string());
            drop(ann);
            let keyboard = InlineKeyboard::row(vec![
                InlineButton::new("✅ Send", "send_announcement"),
                InlineButton::new("❌ Cancel", "cancel_announcement"),
            ]);
            let preview = format!("📝 Preview:\n\n{text}\n\nSend to all active subscribers?");
            let _ = state
                .messenger
                .send_inline_keyboard(chat, &preview, keyboard)
                .await;
            return Ok(());
        }
    }

    if triggers::is_image_request(text) {
        let stripped = triggers::image_prompt(text);
        let description = if stripped.is_empty() { text } else { stripped };
        state.orch.generate_image(chat, user_id, description).await;
        return Ok(());
    }

    if !state.orch.ensure_access(chat, user_id).await {
        return Ok(());
    }

    if let Some(url) = triggers::extract_url(text) {
        let _ = state
            .messenger
            .send_text(chat, state.prefs.text_for(user_id, Key::AnalyzingLink))
            .await;
        match gtb_extract::html::visible_text(url).await {
            Ok(page) => {
                let prompt = format!("{LINK_PROMPT}\n\nTEXT:\n{page}");
                let _ = state.orch.answer(chat, user_id, &Prompt::text(prompt)).await;
            }
            Err(e) => {
                tracing::warn!("link extraction failed: {e}");
                let _ = state
                    .messenger
                    .send_text(chat, state.prefs.text_for(user_id, Key::LinkFailed))
                    .await;
            }
        }
        return Ok(());
    }

    if text.chars().count() > state.cfg.long_input_notice_len {
        let _ = state
            .messenger
            .send_text(chat, state.prefs.text_for(user_id, Key::Processing))
            .await;
    }

    let prompt = format!("{TEXT_PROMPT_PREFIX}{text}");
    let _ = state.orch.answer(chat, user_id, &Prompt::text(prompt)).await;
    Ok(())
}
