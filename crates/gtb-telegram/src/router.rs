use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use gtb_core::{
    config::Config,
    i18n::LangPrefs,
    keypool::{ImageKeyPool, KeyPool},
    ledger::{EntitlementLedger, LedgerConfig},
    messaging::port::MessagingPort,
    orchestrator::Orchestrator,
    receipts::ReceiptQueue,
    store::JsonStore,
};

use crate::handlers;
use crate::TelegramMessenger;

/// A photo waiting for the user to say whether it is a task or a payment
/// receipt.
pub struct PendingPhoto {
    pub bytes: Vec<u8>,
    pub caption: Option<String>,
}

/// Admin announcement flow state.
#[derive(Default)]
pub enum Announcement {
    #[default]
    Idle,
    /// `/announce` was issued; the next admin text becomes the draft.
    Armed,
    /// Draft awaiting the Send/Cancel verdict.
    Draft(String),
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub orch: Arc<Orchestrator>,
    pub ledger: Arc<EntitlementLedger>,
    pub prefs: Arc<LangPrefs>,
    pub receipts: Arc<ReceiptQueue>,
    pub messenger: Arc<dyn MessagingPort>,
    pub user_locks: Arc<UserLocks>,
    pub pending_photos: Arc<Mutex<HashMap<i64, PendingPhoto>>>,
    pub announcement: Arc<Mutex<Announcement>>,
}

/// Per-user mutex map so one user's requests run one at a time while
/// different users proceed in parallel.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        tracing::info!("bot started: @{}", me.username());
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let ledger = Arc::new(EntitlementLedger::new(
        LedgerConfig {
            trial_window: cfg.trial_window,
            trial_cooldown: cfg.trial_cooldown,
            image_key_grant: cfg.image_key_grant,
        },
        JsonStore::new(cfg.data_dir.join("entitlements.json")),
    ));
    let prefs = Arc::new(LangPrefs::new(JsonStore::new(
        cfg.data_dir.join("languages.json"),
    )));
    let receipts = Arc::new(ReceiptQueue::new(
        JsonStore::new(cfg.data_dir.join("receipts.json")),
        cfg.data_dir.join("receipts"),
    ));

    let answer = Arc::new(gtb_gemini::GeminiClient::new(
        cfg.answer_model.clone(),
        cfg.upstream_timeout,
    ));
    let image = Arc::new(gtb_replicate::ReplicateClient::new(
        cfg.image_model.clone(),
        cfg.upstream_timeout,
    ));

    let orch = Arc::new(Orchestrator::new(
        ledger.clone(),
        prefs.clone(),
        KeyPool::new(cfg.answer_api_keys.clone()),
        ImageKeyPool::new(cfg.image_api_keys.clone()),
        answer,
        image,
        messenger.clone(),
        cfg.message_limit,
        cfg.broadcast_delay,
    ));

    let state = Arc::new(AppState {
        cfg,
        orch,
        ledger,
        prefs,
        receipts,
        messenger,
        user_locks: Arc::new(UserLocks::default()),
        pending_photos: Arc::new(Mutex::new(HashMap::new())),
        announcement: Arc::new(Mutex::new(Announcement::Idle)),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_user_requests_are_serialized() {
        let locks = Arc::new(UserLocks::default());

        let guard = locks.lock_user(1).await;
        let second = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock_user(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        drop(guard);
        second.await.unwrap();
    }

    #[tokio::test]
    async fn different_users_do_not_block_each_other() {
        let locks = UserLocks::default();

        let _guard = locks.lock_user(1).await;
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock_user(2)).await;
        assert!(other.is_ok());
    }
}
