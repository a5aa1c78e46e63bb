//! Request orchestration: access gating, key failover against the answer
//! upstream, image-generation admission, and chunked delivery.

use std::{sync::Arc, time::Duration};

use crate::{
    chunker::split_text,
    domain::{ChatId, UserId},
    i18n::{Key, LangPrefs},
    keypool::{ImageKeyPool, KeyPool},
    ledger::{EntitlementLedger, ImageGate},
    messaging::port::MessagingPort,
    ports::{AnswerClient, ImageClient, Prompt},
    Error, Result,
};

pub struct Orchestrator {
    ledger: Arc<EntitlementLedger>,
    prefs: Arc<LangPrefs>,
    answer_keys: KeyPool,
    image_keys: ImageKeyPool,
    answer: Arc<dyn AnswerClient>,
    image: Arc<dyn ImageClient>,
    messenger: Arc<dyn MessagingPort>,
    message_limit: usize,
    broadcast_delay: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<EntitlementLedger>,
        prefs: Arc<LangPrefs>,
        answer_keys: KeyPool,
        image_keys: ImageKeyPool,
        answer: Arc<dyn AnswerClient>,
        image: Arc<dyn ImageClient>,
        messenger: Arc<dyn MessagingPort>,
        message_limit: usize,
        broadcast_delay: Duration,
    ) -> Self {
        Self {
            ledger,
            prefs,
            answer_keys,
            image_keys,
            answer,
            image,
            messenger,
            message_limit,
            broadcast_delay,
        }
    }

    /// Subscription/trial gate. Sends the localized refusal itself and
    /// returns whether the caller may proceed.
    pub async fn ensure_access(&self, chat: ChatId, user: UserId) -> bool {
        if self.ledger.has_access(user) {
            return true;
        }
        let _ = self
            .messenger
            .send_text(chat, self.prefs.text_for(user, Key::NoAccess))
            .await;
        false
    }

    /// Answer a question and deliver the reply in chunks. Assumes the access
    /// gate has already passed.
    pub async fn answer(&self, chat: ChatId, user: UserId, prompt: &Prompt) -> Result<()> {
        match self.dispatch_answer(prompt).await {
            Ok(reply) => self.deliver(chat, &reply).await,
            Err(e) => {
                tracing::warn!(user = user.0, "answer failed: {e}");
                let _ = self
                    .messenger
                    .send_text(chat, self.prefs.text_for(user, Key::UpstreamFailed))
                    .await;
                Err(e)
            }
        }
    }

    /// Answer a document split into parts, labelling each part before its
    /// reply.
    pub async fn answer_parts(&self, chat: ChatId, user: UserId, parts: &[String]) -> Result<()> {
        let total = parts.len();
        for (i, part) in parts.iter().enumerate() {
            if total > 1 {
                let _ = self
                    .messenger
                    .send_text(chat, &format!("📄 {}/{}", i + 1, total))
                    .await;
            }
            self.answer(chat, user, &Prompt::text(part.clone())).await?;
        }
        Ok(())
    }

    /// Run the answer upstream with sticky-cursor key failover. Rate-limited
    /// keys advance the shared cursor; other errors propagate as-is.
    pub async fn dispatch_answer(&self, prompt: &Prompt) -> Result<String> {
        loop {
            let (idx, key) = match self.answer_keys.current() {
                Some(pair) => pair,
                None => return Err(Error::KeysExhausted),
            };
            match self.answer.answer(key, prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_rate_limit() => {
                    tracing::warn!(key_index = idx, "answer key rate limited, rotating: {e}");
                    self.answer_keys.advance(idx);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Split a long reply and send every chunk.
    pub async fn deliver(&self, chat: ChatId, text: &str) -> Result<()> {
        for part in split_text(text, self.message_limit) {
            self.messenger.send_text(chat, &part).await?;
        }
        Ok(())
    }

    /// Full image-generation flow: entitlement gate, random key pick,
    /// dispatch, photo delivery with a text-link fallback.
    pub async fn generate_image(&self, chat: ChatId, user: UserId, description: &str) {
        let on_trial = match self.ledger.authorize_image(user) {
            ImageGate::Admitted { on_trial } => on_trial,
            ImageGate::NoAccess => {
                let _ = self
                    .messenger
                    .send_text(chat, self.prefs.text_for(user, Key::NoAccess))
                    .await;
                return;
            }
            ImageGate::TrialImageUsed => {
                let _ = self
                    .messenger
                    .send_text(chat, self.prefs.text_for(user, Key::TrialImageOnce))
                    .await;
                return;
            }
            ImageGate::NoKeys => {
                let _ = self
                    .messenger
                    .send_text(chat, self.prefs.text_for(user, Key::NoImageKeys))
                    .await;
                return;
            }
        };

        let _ = self
            .messenger
            .send_text(chat, self.prefs.text_for(user, Key::GeneratingImage))
            .await;

        let url = match self.image_keys.pick() {
            Some(key) => match self.image.generate(key, description).await {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(user = user.0, "image generation failed: {e}");
                    None
                }
            },
            None => None,
        };

        let Some(url) = url else {
            let _ = self
                .messenger
                .send_text(chat, self.prefs.text_for(user, Key::ImageFailed))
                .await;
            return;
        };

        let delivered = match self.messenger.send_photo_url(chat, &url).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(user = user.0, "photo send failed, falling back to link: {e}");
                let fallback = self
                    .prefs
                    .text_for(user, Key::ImageLink)
                    .replace("{url}", &url);
                self.messenger.send_text(chat, &fallback).await.is_ok()
            }
        };

        if delivered && on_trial {
            self.ledger.mark_trial_image_used(user);
        }
    }

    /// Send `text` to every active subscriber, pausing between sends. Returns
    /// the number of successful and failed deliveries.
    pub async fn broadcast_to_subscribers(&self, text: &str) -> (usize, usize) {
        let subscribers = self.ledger.active_subscribers();
        let mut sent = 0;
        let mut failed = 0;
        for (user, _expiry) in subscribers {
            match self.messenger.send_text(ChatId(user.0), text).await {
                Ok(_) => sent += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(user = user.0, "broadcast send failed: {e}");
                }
            }
            tokio::time::sleep(self.broadcast_delay).await;
        }
        (sent, failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MessageId, MessageRef},
        i18n::Lang,
        ledger::LedgerConfig,
        messaging::types::InlineKeyboard,
        store::JsonStore,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(i64, String)>>,
        photos: Mutex<Vec<(i64, String)>>,
        fail_photos: bool,
        fail_text_chat: Mutex<Option<i64>>,
    }

    #[async_trait]
    impl MessagingPort for RecordingMessenger {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            if *self.fail_text_chat.lock().unwrap() == Some(chat_id.0) {
                return Err(Error::Transport("chat unreachable".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.0, text.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            self.send_text(chat_id, html).await
        }

        async fn edit_text(&self, _msg: MessageRef, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn delete_message(&self, _msg: MessageRef) -> Result<()> {
            Ok(())
        }

        async fn send_photo_url(&self, chat_id: ChatId, url: &str) -> Result<MessageRef> {
            if self.fail_photos {
                return Err(Error::Transport("photo rejected".into()));
            }
            self.photos
                .lock()
                .unwrap()
                .push((chat_id.0, url.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(2),
            })
        }

        async fn send_photo_bytes(
            &self,
            chat_id: ChatId,
            _bytes: Vec<u8>,
            _caption: Option<&str>,
            _keyboard: Option<InlineKeyboard>,
        ) -> Result<MessageRef> {
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(3),
            })
        }

        async fn send_inline_keyboard(
            &self,
            chat_id: ChatId,
            _text: &str,
            _keyboard: InlineKeyboard,
        ) -> Result<MessageRef> {
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(4),
            })
        }

        async fn answer_callback_query(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    /// Answer client that rate-limits on the listed keys and answers on the
    /// rest, recording which keys were tried.
    struct FlakyAnswer {
        limited: Vec<String>,
        tried: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AnswerClient for FlakyAnswer {
        async fn answer(&self, api_key: &str, _prompt: &Prompt) -> Result<String> {
            self.tried.lock().unwrap().push(api_key.to_string());
            if self.limited.iter().any(|k| k == api_key) {
                Err(Error::RateLimited(format!("{api_key} over quota")))
            } else {
                Ok(format!("answer via {api_key}"))
            }
        }
    }

    struct FixedImage {
        url: Option<String>,
    }

    #[async_trait]
    impl ImageClient for FixedImage {
        async fn generate(&self, _api_key: &str, _description: &str) -> Result<Option<String>> {
            Ok(self.url.clone())
        }
    }

    struct Fixture {
        orch: Orchestrator,
        messenger: Arc<RecordingMessenger>,
        ledger: Arc<EntitlementLedger>,
        _dir: tempfile::TempDir,
    }

    fn fixture(
        answer_keys: Vec<&str>,
        limited: Vec<&str>,
        image_url: Option<&str>,
        fail_photos: bool,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(EntitlementLedger::new(
            LedgerConfig {
                trial_window: Duration::from_secs(600),
                trial_cooldown: Duration::from_secs(5 * 86400),
                image_key_grant: 10,
            },
            JsonStore::new(dir.path().join("records.json")),
        ));
        let prefs = Arc::new(LangPrefs::new(JsonStore::new(
            dir.path().join("languages.json"),
        )));
        let messenger = Arc::new(RecordingMessenger {
            fail_photos,
            ..Default::default()
        });
        let answer = Arc::new(FlakyAnswer {
            limited: limited.into_iter().map(String::from).collect(),
            tried: Mutex::new(Vec::new()),
        });
        let image = Arc::new(FixedImage {
            url: image_url.map(String::from),
        });
        let orch = Orchestrator::new(
            ledger.clone(),
            prefs,
            KeyPool::new(answer_keys.into_iter().map(String::from).collect()),
            ImageKeyPool::new(vec!["img-key".into()]),
            answer,
            image,
            messenger.clone(),
            4000,
            Duration::from_millis(0),
        );
        Fixture {
            orch,
            messenger,
            ledger,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn failover_skips_rate_limited_keys_and_sticks() {
        let f = fixture(vec!["k1", "k2", "k3"], vec!["k1", "k2"], None, false);

        let reply = f.orch.dispatch_answer(&Prompt::text("q")).await.unwrap();
        assert_eq!(reply, "answer via k3");

        // cursor stays on the surviving key
        let reply = f.orch.dispatch_answer(&Prompt::text("q2")).await.unwrap();
        assert_eq!(reply, "answer via k3");
    }

    #[tokio::test]
    async fn all_keys_limited_yields_exhaustion() {
        let f = fixture(vec!["k1", "k2"], vec!["k1", "k2"], None, false);
        let err = f.orch.dispatch_answer(&Prompt::text("q")).await.unwrap_err();
        assert!(matches!(err, Error::KeysExhausted));
    }

    #[tokio::test]
    async fn gate_refuses_without_entitlement() {
        let f = fixture(vec!["k1"], vec![], None, false);
        assert!(!f.orch.ensure_access(ChatId(10), UserId(10)).await);
        let sent = f.messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("/subscribe"));
    }

    #[tokio::test]
    async fn long_reply_is_chunked() {
        let f = fixture(vec!["k1"], vec![], None, false);
        let long = "line\n".repeat(3000);
        f.orch.deliver(ChatId(1), &long).await.unwrap();
        let sent = f.messenger.sent.lock().unwrap();
        assert!(sent.len() > 1);
        for (_, part) in sent.iter() {
            assert!(part.chars().count() <= 4000);
        }
    }

    #[tokio::test]
    async fn image_flow_delivers_photo_and_spends_quota() {
        let f = fixture(vec!["k1"], vec![], Some("https://img.example/out.png"), false);
        f.ledger.grant_subscription(UserId(5), 25);

        f.orch
            .generate_image(ChatId(5), UserId(5), "a red cat")
            .await;

        assert_eq!(f.ledger.image_keys(UserId(5)), 9);
        assert_eq!(
            f.messenger.photos.lock().unwrap().as_slice(),
            &[(5, "https://img.example/out.png".to_string())]
        );
    }

    #[tokio::test]
    async fn image_flow_falls_back_to_link_when_photo_send_fails() {
        let f = fixture(vec!["k1"], vec![], Some("https://img.example/out.png"), true);
        f.ledger.grant_subscription(UserId(5), 25);

        f.orch
            .generate_image(ChatId(5), UserId(5), "a red cat")
            .await;

        let sent = f.messenger.sent.lock().unwrap();
        assert!(sent
            .iter()
            .any(|(_, t)| t.contains("https://img.example/out.png")));
    }

    #[tokio::test]
    async fn trial_image_is_single_use() {
        let f = fixture(vec!["k1"], vec![], Some("https://img.example/t.png"), false);
        f.ledger.start_trial(UserId(9));

        f.orch.generate_image(ChatId(9), UserId(9), "first").await;
        f.orch.generate_image(ChatId(9), UserId(9), "second").await;

        // one photo delivered, second attempt refused
        assert_eq!(f.messenger.photos.lock().unwrap().len(), 1);
        let sent = f.messenger.sent.lock().unwrap();
        let refusal = crate::i18n::text(Lang::En, Key::TrialImageOnce);
        assert!(sent.iter().any(|(_, t)| t == refusal));
    }

    #[tokio::test]
    async fn broadcast_reaches_only_active_subscribers() {
        let f = fixture(vec!["k1"], vec![], None, false);
        f.ledger.grant_subscription(UserId(1), 25);
        f.ledger.grant_subscription(UserId(2), 25);
        f.ledger.revoke_subscription(UserId(2));

        let (sent, failed) = f.orch.broadcast_to_subscribers("hello").await;
        assert_eq!((sent, failed), (1, 0));
        assert_eq!(
            f.messenger.sent.lock().unwrap().as_slice(),
            &[(1, "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn broadcast_counts_failed_deliveries() {
        let f = fixture(vec!["k1"], vec![], None, false);
        f.ledger.grant_subscription(UserId(1), 25);
        f.ledger.grant_subscription(UserId(2), 25);
        *f.messenger.fail_text_chat.lock().unwrap() = Some(2);

        let (sent, failed) = f.orch.broadcast_to_subscribers("hello").await;
        assert_eq!((sent, failed), (1, 1));
        assert_eq!(
            f.messenger.sent.lock().unwrap().as_slice(),
            &[(1, "hello".to_string())]
        );
    }
}
