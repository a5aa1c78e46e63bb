use std::sync::Arc;

use teloxide::prelude::*;

use gtb_core::{
    domain::{ChatId, UserId},
    i18n::{Key, Lang},
    messaging::types::{InlineButton, InlineKeyboard},
};

use crate::router::{Announcement, AppState};

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

const ADMIN_COMMANDS: &[&str] = &[
    "subscribers",
    "requests",
    "givesub",
    "trialgive",
    "announce",
    "cancel",
];

pub async fn handle_command(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let user_id = UserId(user.id.0 as i64);
    let chat = ChatId(msg.chat.id.0);
    let (cmd, args) = parse_command(text);
    let is_admin = user_id.0 == state.cfg.admin_id;

    if ADMIN_COMMANDS.contains(&cmd.as_str()) && !is_admin {
        let _ = state
            .messenger
            .send_text(chat, state.prefs.text_for(user_id, Key::AdminOnly))
            .await;
        return Ok(());
    }

    match cmd.as_str() {
        "start" => {
            let key = if state.ledger.is_subscribed(user_id) {
                Key::AccessActive
            } else if state.ledger.is_trial_active(user_id) {
                Key::TrialActive
            } else {
                Key::StartGreeting
            };
            let _ = state
                .messenger
                .send_html(chat, state.prefs.text_for(user_id, key))
                .await;
        }

        "help" => {
            let _ = state
                .messenger
                .send_html(chat, state.prefs.text_for(user_id, Key::HelpText))
                .await;
        }

        "subscribe" => {
            let key = if state.ledger.is_subscribed(user_id) {
                Key::SubscriptionActive
            } else {
                Key::SubscriptionInfo
            };
            let _ = state
                .messenger
                .send_text(chat, state.prefs.text_for(user_id, key))
                .await;
        }

        "trial" => {
            let reply = if state.ledger.is_subscribed(user_id) {
                state.prefs.text_for(user_id, Key::SubscriptionActive).to_string()
            } else if state.ledger.is_trial_active(user_id) {
                let left = state.ledger.trial_seconds_left(user_id).unwrap_or(0);
                state
                    .prefs
                    .text_for(user_id, Key::TrialStatus)
                    .replace("{seconds}", &left.to_string())
            } else if !state.ledger.can_start_trial(user_id) {
                let left = state
                    .ledger
                    .trial_cooldown_left(user_id)
                    .map(|d| d.as_secs() / 60)
                    .unwrap_or(0);
                state
                    .prefs
                    .text_for(user_id, Key::TrialCooldown)
                    .replace("{minutes}", &left.to_string())
            } else {
                state.ledger.start_trial(user_id);
                let minutes = state.cfg.trial_window.as_secs() / 60;
                state
                    .prefs
                    .text_for(user_id, Key::TrialActivated)
                    .replace("{minutes}", &minutes.to_string())
            };
            let _ = state.messenger.send_text(chat, &reply).await;
        }

        "status" => {
            if state.ledger.is_subscribed(user_id) {
                let left = state.ledger.subscription_days_left(user_id).unwrap_or(0);
                let _ = state
                    .messenger
                    .send_html(
                        chat,
                        &format!("<b>✅ Subscription active</b>. Remaining: {left} days."),
                    )
                    .await;
            } else if state.ledger.is_trial_active(user_id) {
                let left = state.ledger.trial_seconds_left(user_id).unwrap_or(0);
                let reply = state
                    .prefs
                    .text_for(user_id, Key::TrialStatus)
                    .replace("{seconds}", &left.to_string());
                let _ = state.messenger.send_text(chat, &reply).await;
            } else {
                let _ = state
                    .messenger
                    .send_text(chat, state.prefs.text_for(user_id, Key::NoAccess))
                    .await;
            }
        }

        "profile" => {
            let keys = state.ledger.image_keys(user_id);
            let reply = if state.ledger.is_subscribed(user_id) {
                let days = state.ledger.subscription_days_left(user_id).unwrap_or(0);
                state
                    .prefs
                    .text_for(user_id, Key::ProfileActive)
                    .replace("{days}", &days.to_string())
                    .replace("{keys}", &keys.to_string())
            } else {
                state
                    .prefs
                    .text_for(user_id, Key::ProfileInactive)
                    .replace("{keys}", &keys.to_string())
            };
            let _ = state.messenger.send_text(chat, &reply).await;
        }

        "language" => {
            let keyboard = InlineKeyboard::new(vec![
                vec![
                    InlineButton::new("🇷🇺 Русский", format!("lang_{}", Lang::Ru.code())),
                    InlineButton::new("🇺🇸 English", format!("lang_{}", Lang::En.code())),
                ],
                vec![InlineButton::new(
                    "🇦🇿 Azərbaycan",
                    format!("lang_{}", Lang::Az.code()),
                )],
            ]);
            let _ = state
                .messenger
                .send_inline_keyboard(
                    chat,
                    state.prefs.text_for(user_id, Key::SelectLanguage),
                    keyboard,
                )
                .await;
        }

        "subscribers" => {
            let active = state.ledger.active_subscribers();
            if active.is_empty() {
                let _ = state
                    .messenger
                    .send_text(chat, state.prefs.text_for(user_id, Key::NoSubscribers))
                    .await;
                return Ok(());
            }
            for (uid, _expiry) in active {
                let days = state.ledger.subscription_days_left(uid).unwrap_or(0);
                let text = format!("👤 ID: {}\n📅 Days left: {days}", uid.0);
                let keyboard = InlineKeyboard::row(vec![InlineButton::new(
                    "❌ Delete",
                    format!("delete_{}", uid.0),
                )]);
                let _ = state
                    .messenger
                    .send_inline_keyboard(chat, &text, keyboard)
                    .await;
            }
        }

        "requests" => {
            let pending = state.receipts.pending();
            if pending.is_empty() {
                let _ = state
                    .messenger
                    .send_text(chat, state.prefs.text_for(user_id, Key::NoPendingRequests))
                    .await;
                return Ok(());
            }
            for uid in pending {
                let caption = format!("👤 Request from ID: {}", uid.0);
                let keyboard = InlineKeyboard::row(vec![
                    InlineButton::new("✅ Approve", format!("approve_{}", uid.0)),
                    InlineButton::new("❌ Reject", format!("reject_{}", uid.0)),
                ]);
                match state.receipts.photo(uid) {
                    Some(photo) => {
                        if state
                            .messenger
                            .send_photo_bytes(chat, photo, Some(&caption), Some(keyboard.clone()))
                            .await
                            .is_err()
                        {
                            let text = format!("{caption}\n(Receipt photo could not be sent.)");
                            let _ = state
                                .messenger
                                .send_inline_keyboard(chat, &text, keyboard)
                                .await;
                        }
                    }
                    None => {
                        let _ = state
                            .messenger
                            .send_inline_keyboard(chat, &caption, keyboard)
                            .await;
                    }
                }
            }
        }

        "givesub" => {
            let mut parts = args.split_whitespace();
            let target = parts.next().and_then(|s| s.parse::<i64>().ok());
            let days = parts.next().and_then(|s| s.parse::<i64>().ok());
            match (target, days) {
                (Some(target), Some(days)) if days > 0 => {
                    let target = UserId(target);
                    state.ledger.grant_subscription(target, days);
                    let notice = state
                        .prefs
                        .text_for(target, Key::SubscriptionActivated)
                        .replace("{days}", &days.to_string());
                    let _ = state.messenger.send_text(ChatId(target.0), &notice).await;
                    let _ = state
                        .messenger
                        .send_text(
                            chat,
                            &format!("✅ Subscription added for {} ({days} days).", target.0),
                        )
                        .await;
                }
                _ => {
                    let _ = state
                        .messenger
                        .send_text(chat, "❌ Usage: /givesub <user_id> <days>")
                        .await;
                }
            }
        }

        "trialgive" => {
            match args.trim().parse::<i64>() {
                Ok(target) => {
                    let target = UserId(target);
                    state.ledger.start_trial(target);
                    let minutes = state.cfg.trial_window.as_secs() / 60;
                    let notice = state
                        .prefs
                        .text_for(target, Key::TrialGiven)
                        .replace("{minutes}", &minutes.to_string());
                    let _ = state.messenger.send_text(ChatId(target.0), &notice).await;
                    let _ = state
                        .messenger
                        .send_text(chat, &format!("✅ Trial given to {}.", target.0))
                        .await;
                }
                Err(_) => {
                    let _ = state
                        .messenger
                        .send_text(chat, "❌ Usage: /trialgive <user_id>")
                        .await;
                }
            }
        }

        "announce" => {
            let active = state.ledger.active_subscribers().len();
            if active == 0 {
                let _ = state
                    .messenger
                    .send_text(chat, state.prefs.text_for(user_id, Key::NoSubscribers))
                    .await;
                return Ok(());
            }
            *state.announcement.lock().await = Announcement::Armed;
            let _ = state
                .messenger
                .send_text(
                    chat,
                    &format!(
                        "📢 Announcement mode enabled!\n👥 Active subscribers: {active}\n\nSend the announcement text (or /cancel)."
                    ),
                )
                .await;
        }

        "cancel" => {
            let mut ann = state.announcement.lock().await;
            if !matches!(*ann, Announcement::Idle) {
                *ann = Announcement::Idle;
                drop(ann);
                let _ = state
                    .messenger
                    .send_text(chat, "❌ Announcement cancelled.")
                    .await;
            }
        }

        _ => {}
    }

    Ok(())
}
