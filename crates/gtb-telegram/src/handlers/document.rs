use std::sync::Arc;

use teloxide::prelude::*;

use gtb_core::{
    domain::{ChatId, UserId},
    i18n::Key,
    ports::Prompt,
};

use crate::router::AppState;

use super::download_bytes;

const PDF_PROMPT: &str = "Answer ALL questions in this PDF part in the same language as the \
     PDF. Pick one correct option per question. Be short. At the end add: AI can make mistakes.";

const TXT_PROMPT: &str =
    "Answer all questions from the text below. Answer briefly and in the same language as the text.";

pub async fn handle_document(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(doc) = msg.document() else {
        return Ok(());
    };

    let user_id = UserId(user.id.0 as i64);
    let chat = ChatId(msg.chat.id.0);

    if !state.orch.ensure_access(chat, user_id).await {
        return Ok(());
    }

    let file_name = doc.file_name.clone().unwrap_or_default().to_lowercase();
    let is_pdf = doc
        .mime_type
        .as_ref()
        .map(|m| m.essence_str() == "application/pdf")
        .unwrap_or(false)
        || file_name.ends_with(".pdf");

    if !is_pdf && !file_name.ends_with(".txt") {
        let _ = state
            .messenger
            .send_text(chat, state.prefs.text_for(user_id, Key::UnsupportedFile))
            .await;
        return Ok(());
    }

    let bytes = match download_bytes(&bot, &doc.file.id).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(user = user_id.0, "document download failed: {e}");
            let _ = state
                .messenger
                .send_text(chat, state.prefs.text_for(user_id, Key::UpstreamFailed))
                .await;
            return Ok(());
        }
    };

    if is_pdf {
        let _ = state
            .messenger
            .send_text(chat, state.prefs.text_for(user_id, Key::ReadingPdf))
            .await;

        let chunks = match gtb_extract::pdf::extract_text_chunks(&bytes) {
            Ok(Some(chunks)) => chunks,
            Ok(None) | Err(_) => {
                let _ = state
                    .messenger
                    .send_text(chat, state.prefs.text_for(user_id, Key::PdfError))
                    .await;
                return Ok(());
            }
        };

        let parts: Vec<String> = chunks
            .into_iter()
            .map(|c| format!("{PDF_PROMPT}\n\n{c}"))
            .collect();
        let _ = state.orch.answer_parts(chat, user_id, &parts).await;
        return Ok(());
    }

    // .txt
    let _ = state
        .messenger
        .send_text(chat, state.prefs.text_for(user_id, Key::ReadingTxt))
        .await;
    let text = String::from_utf8_lossy(&bytes);
    let prompt = format!("{TXT_PROMPT}\n\n{text}");
    let _ = state.orch.answer(chat, user_id, &Prompt::text(prompt)).await;

    Ok(())
}
