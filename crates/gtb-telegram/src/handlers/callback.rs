use std::sync::Arc;

use teloxide::prelude::*;

use gtb_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    i18n::{Key, Lang},
    messaging::types::{InlineButton, InlineKeyboard},
};

use crate::router::{Announcement, AppState};

use super::photo::process_photo_task;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let data = q.data.clone().unwrap_or_default();
    let user_id = UserId(q.from.id.0 as i64);

    let Some(message) = q.message.as_ref() else {
        let _ = state.messenger.answer_callback_query(&cb_id, None).await;
        return Ok(());
    };
    let chat = ChatId(message.chat.id.0);
    let msg_ref = MessageRef {
        chat_id: chat,
        message_id: MessageId(message.id.0),
    };
    let is_admin = user_id.0 == state.cfg.admin_id;

    // Language selection
    if let Some(code) = data.strip_prefix("lang_") {
        if let Some(lang) = Lang::from_code(code) {
            state.prefs.set(user_id, lang);
            let _ = state
                .messenger
                .edit_text(msg_ref, state.prefs.text_for(user_id, Key::LanguageSelected))
                .await;
        }
        let _ = state.messenger.answer_callback_query(&cb_id, None).await;
        return Ok(());
    }

    // Photo disambiguation: task or receipt
    if data == "img_task" || data == "img_receipt" {
        let _ = state.messenger.answer_callback_query(&cb_id, None).await;

        let pending = state.pending_photos.lock().await.remove(&user_id.0);
        let Some(pending) = pending else {
            let _ = state
                .messenger
                .send_text(chat, state.prefs.text_for(user_id, Key::PhotoNotFound))
                .await;
            return Ok(());
        };

        if data == "img_task" {
            if !state.orch.ensure_access(chat, user_id).await {
                return Ok(());
            }
            process_photo_task(
                &state,
                chat,
                user_id,
                pending.bytes,
                pending.caption.as_deref(),
            )
            .await;
            return Ok(());
        }

        // img_receipt
        match state.receipts.submit(user_id, &pending.bytes) {
            Ok(true) => {}
            Ok(false) => {
                let _ = state
                    .messenger
                    .send_text(chat, state.prefs.text_for(user_id, Key::ReceiptAlreadySent))
                    .await;
                return Ok(());
            }
            Err(e) => {
                tracing::error!(user = user_id.0, "receipt store failed: {e}");
                let _ = state
                    .messenger
                    .send_text(chat, state.prefs.text_for(user_id, Key::UpstreamFailed))
                    .await;
                return Ok(());
            }
        }

        let admin_chat = ChatId(state.cfg.admin_id);
        let caption = format!("👤 New receipt from user ID: {}", user_id.0);
        let keyboard = InlineKeyboard::row(vec![
            InlineButton::new("✅ Approve", format!("approve_{}", user_id.0)),
            InlineButton::new("❌ Reject", format!("reject_{}", user_id.0)),
        ]);
        if state
            .messenger
            .send_photo_bytes(admin_chat, pending.bytes, Some(&caption), Some(keyboard))
            .await
            .is_err()
        {
            let _ = state
                .messenger
                .send_text(
                    admin_chat,
                    &format!("⚠ Could not send receipt photo from user {}", user_id.0),
                )
                .await;
        }

        let _ = state
            .messenger
            .send_text(chat, state.prefs.text_for(user_id, Key::ReceiptReceived))
            .await;
        return Ok(());
    }

    // Everything below is admin-only.
    if !is_admin {
        let _ = state
            .messenger
            .answer_callback_query(&cb_id, Some("Admin only."))
            .await;
        return Ok(());
    }

    if let Some(uid) = data.strip_prefix("delete_").and_then(|s| s.parse::<i64>().ok()) {
        let target = UserId(uid);
        if state.ledger.is_subscribed(target) {
            state.ledger.revoke_subscription(target);
            let _ = state
                .messenger
                .send_text(
                    ChatId(uid),
                    state.prefs.text_for(target, Key::SubscriptionRevoked),
                )
                .await;
            let _ = state
                .messenger
                .edit_text(msg_ref, &format!("✅ Subscriber {uid} removed."))
                .await;
            let _ = state.messenger.answer_callback_query(&cb_id, None).await;
        } else {
            let _ = state
                .messenger
                .answer_callback_query(&cb_id, Some("Already removed."))
                .await;
        }
        return Ok(());
    }

    if let Some(uid) = data.strip_prefix("approve_").and_then(|s| s.parse::<i64>().ok()) {
        let target = UserId(uid);
        if !state.receipts.contains(target) {
            let _ = state
                .messenger
                .answer_callback_query(&cb_id, Some("Already processed."))
                .await;
            return Ok(());
        }

        let days = state.cfg.subscription_days;
        state.ledger.grant_subscription(target, days);
        if let Err(e) = state.receipts.remove(target) {
            tracing::error!(user = uid, "receipt cleanup failed: {e}");
        }

        let notice = state
            .prefs
            .text_for(target, Key::SubscriptionActivated)
            .replace("{days}", &days.to_string());
        let _ = state.messenger.send_text(ChatId(uid), &notice).await;

        edit_verdict(&bot, message, &format!("✅ Request from user ID: {uid} approved.")).await;
        let _ = state.messenger.answer_callback_query(&cb_id, None).await;
        return Ok(());
    }

    if let Some(uid) = data.strip_prefix("reject_").and_then(|s| s.parse::<i64>().ok()) {
        let target = UserId(uid);
        if !state.receipts.contains(target) {
            let _ = state
                .messenger
                .answer_callback_query(&cb_id, Some("Already processed."))
                .await;
            return Ok(());
        }

        if let Err(e) = state.receipts.remove(target) {
            tracing::error!(user = uid, "receipt cleanup failed: {e}");
        }
        let _ = state
            .messenger
            .send_text(ChatId(uid), state.prefs.text_for(target, Key::RequestRejected))
            .await;

        edit_verdict(&bot, message, &format!("❌ Request from user ID: {uid} rejected.")).await;
        let _ = state.messenger.answer_callback_query(&cb_id, None).await;
        return Ok(());
    }

    if data == "cancel_announcement" {
        *state.announcement.lock().await = Announcement::Idle;
        let _ = state.messenger.edit_text(msg_ref, "❌ Cancelled.").await;
        let _ = state.messenger.answer_callback_query(&cb_id, None).await;
        return Ok(());
    }

    if data == "send_announcement" {
        let draft = {
            let mut ann = state.announcement.lock().await;
            match std::mem::take(&mut *ann) {
                Announcement::Draft(text) => Some(text),
                other => {
                    *ann = other;
                    None
                }
            }
        };
        let Some(text) = draft else {
            let _ = state
                .messenger
                .answer_callback_query(&cb_id, Some("Nothing to send."))
                .await;
            return Ok(());
        };

        let _ = state.messenger.edit_text(msg_ref, "📤 Sending...").await;
        let (sent, failed) = state
            .orch
            .broadcast_to_subscribers(&format!("📢\n\n{text}"))
            .await;
        let _ = state
            .messenger
            .edit_text(msg_ref, &format!("✅ Done.\n\nSent: {sent}\nFailed: {failed}"))
            .await;
        let _ = state.messenger.answer_callback_query(&cb_id, None).await;
        return Ok(());
    }

    let _ = state.messenger.answer_callback_query(&cb_id, None).await;
    Ok(())
}

/// Verdict messages may be photo captions or plain text; try the caption
/// edit first.
async fn edit_verdict(bot: &Bot, message: &Message, text: &str) {
    let caption_edit = bot
        .edit_message_caption(message.chat.id, message.id)
        .caption(text.to_string())
        .await;
    if caption_edit.is_err() {
        let _ = bot
            .edit_message_text(message.chat.id, message.id, text.to_string())
            .await;
    }
}
