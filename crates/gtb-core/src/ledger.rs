//! Entitlement ledger: who may use the service, for how long, and with what
//! remaining image quota.
//!
//! Records never get deleted; expiry is time-based. All mutation happens under
//! one lock and is persisted write-through, so two in-flight actions from the
//! same user cannot lose updates or double-spend quota.

use std::{collections::HashMap, sync::Mutex, time::Duration};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{domain::UserId, store::JsonStore};

/// One entitlement record per user id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Entitlement {
    /// Active iff present and strictly in the future.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_expiry: Option<i64>,
    /// Most recent trial activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_start: Option<i64>,
    /// Cooldown anchor; set together with `trial_start`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_last_start: Option<i64>,
    /// The single trial-window image has been consumed.
    #[serde(default)]
    pub trial_image_used: bool,
    /// Consumable only while subscribed or on trial; frozen across expiry and
    /// reset to the grant amount on each subscription approval.
    #[serde(default)]
    pub image_keys: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Records {
    users: HashMap<i64, Entitlement>,
}

#[derive(Clone, Copy, Debug)]
pub struct LedgerConfig {
    pub trial_window: Duration,
    pub trial_cooldown: Duration,
    pub image_key_grant: u32,
}

/// Outcome of the atomic image-generation admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageGate {
    /// Admitted; quota already consumed. `on_trial` marks the trial path so
    /// the caller can set the single-use flag after successful delivery.
    Admitted { on_trial: bool },
    NoAccess,
    TrialImageUsed,
    NoKeys,
}

pub struct EntitlementLedger {
    cfg: LedgerConfig,
    store: JsonStore,
    records: Mutex<Records>,
}

fn now_unix() -> i64 {
    Utc::now().timestamp()
}

impl EntitlementLedger {
    pub fn new(cfg: LedgerConfig, store: JsonStore) -> Self {
        let records = store.load_or_default();
        Self {
            cfg,
            store,
            records: Mutex::new(records),
        }
    }

    // ----- Queries -----

    pub fn is_subscribed(&self, user: UserId) -> bool {
        self.is_subscribed_at(user, now_unix())
    }

    pub fn is_subscribed_at(&self, user: UserId, now: i64) -> bool {
        self.with_user(user, |rec| {
            rec.map_or(false, |r| r.subscription_expiry.map_or(false, |e| e > now))
        })
    }

    pub fn is_trial_active(&self, user: UserId) -> bool {
        self.is_trial_active_at(user, now_unix())
    }

    pub fn is_trial_active_at(&self, user: UserId, now: i64) -> bool {
        let window = self.cfg.trial_window.as_secs() as i64;
        self.with_user(user, |rec| {
            rec.and_then(|r| r.trial_start)
                .map_or(false, |start| now - start < window)
        })
    }

    pub fn can_start_trial(&self, user: UserId) -> bool {
        self.can_start_trial_at(user, now_unix())
    }

    pub fn can_start_trial_at(&self, user: UserId, now: i64) -> bool {
        let cooldown = self.cfg.trial_cooldown.as_secs() as i64;
        self.with_user(user, |rec| {
            rec.and_then(|r| r.trial_last_start)
                .map_or(true, |last| now - last >= cooldown)
        })
    }

    /// Combined admission for question/link/document features.
    pub fn has_access(&self, user: UserId) -> bool {
        let now = now_unix();
        self.is_subscribed_at(user, now) || self.is_trial_active_at(user, now)
    }

    pub fn image_keys(&self, user: UserId) -> u32 {
        self.with_user(user, |rec| rec.map_or(0, |r| r.image_keys))
    }

    pub fn subscription_days_left(&self, user: UserId) -> Option<i64> {
        self.subscription_days_left_at(user, now_unix())
    }

    pub fn subscription_days_left_at(&self, user: UserId, now: i64) -> Option<i64> {
        self.with_user(user, |rec| {
            rec.and_then(|r| r.subscription_expiry)
                .filter(|&e| e > now)
                .map(|e| (e - now) / 86_400)
        })
    }

    pub fn trial_seconds_left_at(&self, user: UserId, now: i64) -> Option<i64> {
        let window = self.cfg.trial_window.as_secs() as i64;
        self.with_user(user, |rec| {
            rec.and_then(|r| r.trial_start)
                .map(|start| window - (now - start))
                .filter(|&left| left > 0)
        })
    }

    pub fn trial_seconds_left(&self, user: UserId) -> Option<i64> {
        self.trial_seconds_left_at(user, now_unix())
    }

    pub fn trial_cooldown_left(&self, user: UserId) -> Option<Duration> {
        let now = now_unix();
        let cooldown = self.cfg.trial_cooldown.as_secs() as i64;
        self.with_user(user, |rec| {
            rec.and_then(|r| r.trial_last_start)
                .map(|last| cooldown - (now - last))
                .filter(|&left| left > 0)
                .map(|left| Duration::from_secs(left as u64))
        })
    }

    /// Users whose subscription is active right now, with their expiry.
    pub fn active_subscribers(&self) -> Vec<(UserId, i64)> {
        let now = now_unix();
        let records = self.records.lock().expect("ledger lock");
        let mut out: Vec<(UserId, i64)> = records
            .users
            .iter()
            .filter_map(|(&uid, rec)| {
                rec.subscription_expiry
                    .filter(|&e| e > now)
                    .map(|e| (UserId(uid), e))
            })
            .collect();
        out.sort_by_key(|&(u, _)| u);
        out
    }

    // ----- Transitions -----

    /// Unconditionally (re)start a trial. Callers enforce the cooldown via
    /// `can_start_trial`; the admin override path calls this directly.
    pub fn start_trial(&self, user: UserId) {
        self.start_trial_at(user, now_unix());
    }

    pub fn start_trial_at(&self, user: UserId, now: i64) {
        self.mutate(user, |rec| {
            rec.trial_start = Some(now);
            rec.trial_last_start = Some(now);
            rec.trial_image_used = false;
        });
    }

    /// Grant a subscription and reset the image quota to the grant amount.
    /// The two effects always go together (admin grant and receipt approval).
    pub fn grant_subscription(&self, user: UserId, days: i64) {
        self.grant_subscription_at(user, days, now_unix());
    }

    pub fn grant_subscription_at(&self, user: UserId, days: i64, now: i64) {
        let grant = self.cfg.image_key_grant;
        self.mutate(user, |rec| {
            rec.subscription_expiry = Some(now + days * 86_400);
            rec.image_keys = grant;
        });
    }

    /// Clear the active-subscription fact. `image_keys` stays frozen.
    pub fn revoke_subscription(&self, user: UserId) {
        self.mutate(user, |rec| {
            rec.subscription_expiry = None;
        });
    }

    /// Decrement the quota if any remains. False leaves the record unchanged.
    pub fn consume_image_quota(&self, user: UserId) -> bool {
        let mut consumed = false;
        self.mutate(user, |rec| {
            if rec.image_keys > 0 {
                rec.image_keys -= 1;
                consumed = true;
            }
        });
        consumed
    }

    pub fn mark_trial_image_used(&self, user: UserId) {
        self.mutate(user, |rec| {
            rec.trial_image_used = true;
        });
    }

    /// Atomic admission + quota consumption for an image request.
    ///
    /// Subscribed users are gated by quota alone. Trial users are gated by the
    /// single-use flag; a quota unit is still consumed when one is available,
    /// but zero keys do not block the one trial image.
    pub fn authorize_image(&self, user: UserId) -> ImageGate {
        self.authorize_image_at(user, now_unix())
    }

    pub fn authorize_image_at(&self, user: UserId, now: i64) -> ImageGate {
        let window = self.cfg.trial_window.as_secs() as i64;
        let mut records = self.records.lock().expect("ledger lock");
        let rec = records.users.entry(user.0).or_default();

        let subscribed = rec.subscription_expiry.map_or(false, |e| e > now);
        let on_trial = rec.trial_start.map_or(false, |s| now - s < window);

        let gate = if subscribed {
            if rec.image_keys > 0 {
                rec.image_keys -= 1;
                ImageGate::Admitted { on_trial: false }
            } else {
                ImageGate::NoKeys
            }
        } else if on_trial {
            if rec.trial_image_used {
                ImageGate::TrialImageUsed
            } else {
                rec.image_keys = rec.image_keys.saturating_sub(1);
                ImageGate::Admitted { on_trial: true }
            }
        } else {
            ImageGate::NoAccess
        };

        if matches!(gate, ImageGate::Admitted { .. }) {
            self.persist(&records);
        }
        gate
    }

    // ----- Internals -----

    fn with_user<T>(&self, user: UserId, f: impl FnOnce(Option<&Entitlement>) -> T) -> T {
        let records = self.records.lock().expect("ledger lock");
        f(records.users.get(&user.0))
    }

    fn mutate(&self, user: UserId, f: impl FnOnce(&mut Entitlement)) {
        let mut records = self.records.lock().expect("ledger lock");
        f(records.users.entry(user.0).or_default());
        self.persist(&records);
    }

    fn persist(&self, records: &Records) {
        if let Err(e) = self.store.save(records) {
            tracing::error!("failed to persist entitlements: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn ledger() -> (tempfile::TempDir, EntitlementLedger) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("entitlements.json"));
        let cfg = LedgerConfig {
            trial_window: Duration::from_secs(600),
            trial_cooldown: Duration::from_secs(5 * 24 * 60 * 60),
            image_key_grant: 10,
        };
        (dir, EntitlementLedger::new(cfg, store))
    }

    #[test]
    fn subscription_flips_exactly_at_expiry() {
        let (_dir, ledger) = ledger();
        let user = UserId(1);

        assert!(!ledger.is_subscribed_at(user, NOW));
        ledger.grant_subscription_at(user, 25, NOW);

        let expiry = NOW + 25 * 86_400;
        assert!(ledger.is_subscribed_at(user, expiry - 1));
        assert!(!ledger.is_subscribed_at(user, expiry)); // strictly greater
        assert!(!ledger.is_subscribed_at(user, expiry + 1));
    }

    #[test]
    fn trial_window_and_cooldown() {
        let (_dir, ledger) = ledger();
        let user = UserId(2);

        assert!(ledger.can_start_trial_at(user, NOW));
        ledger.start_trial_at(user, NOW);

        assert!(ledger.is_trial_active_at(user, NOW));
        assert!(ledger.is_trial_active_at(user, NOW + 599));
        assert!(!ledger.is_trial_active_at(user, NOW + 600));

        assert!(!ledger.can_start_trial_at(user, NOW + 1));
        let cooldown = 5 * 24 * 60 * 60;
        assert!(!ledger.can_start_trial_at(user, NOW + cooldown - 1));
        assert!(ledger.can_start_trial_at(user, NOW + cooldown));
    }

    #[test]
    fn quota_consumption_stops_at_zero() {
        let (_dir, ledger) = ledger();
        let user = UserId(3);

        assert!(!ledger.consume_image_quota(user));
        assert_eq!(ledger.image_keys(user), 0);

        ledger.grant_subscription_at(user, 25, NOW);
        assert_eq!(ledger.image_keys(user), 10);
        assert!(ledger.consume_image_quota(user));
        assert_eq!(ledger.image_keys(user), 9);
    }

    #[test]
    fn grant_resets_quota_instead_of_adding() {
        let (_dir, ledger) = ledger();
        let user = UserId(4);

        ledger.grant_subscription_at(user, 25, NOW - 30 * 86_400);
        for _ in 0..7 {
            assert!(ledger.consume_image_quota(user));
        }
        assert_eq!(ledger.image_keys(user), 3);
        assert!(!ledger.is_subscribed_at(user, NOW)); // expired, keys frozen

        ledger.grant_subscription_at(user, 25, NOW);
        assert_eq!(ledger.image_keys(user), 10);
    }

    #[test]
    fn revoke_clears_subscription_but_freezes_keys() {
        let (_dir, ledger) = ledger();
        let user = UserId(5);

        ledger.grant_subscription_at(user, 25, NOW);
        assert!(ledger.consume_image_quota(user));
        ledger.revoke_subscription(user);

        assert!(!ledger.is_subscribed_at(user, NOW));
        assert_eq!(ledger.image_keys(user), 9);
    }

    #[test]
    fn trial_image_is_single_use_even_with_keys_left() {
        let (_dir, ledger) = ledger();
        let user = UserId(6);

        // Frozen keys from an expired subscription.
        ledger.grant_subscription_at(user, 25, NOW - 30 * 86_400);
        ledger.start_trial_at(user, NOW);

        match ledger.authorize_image_at(user, NOW + 1) {
            ImageGate::Admitted { on_trial } => assert!(on_trial),
            other => panic!("expected admission, got {other:?}"),
        }
        ledger.mark_trial_image_used(user);

        assert!(ledger.image_keys(user) > 0);
        assert_eq!(
            ledger.authorize_image_at(user, NOW + 2),
            ImageGate::TrialImageUsed
        );
    }

    #[test]
    fn trial_image_admitted_with_zero_keys() {
        let (_dir, ledger) = ledger();
        let user = UserId(7);

        ledger.start_trial_at(user, NOW);
        assert_eq!(ledger.image_keys(user), 0);
        assert_eq!(
            ledger.authorize_image_at(user, NOW + 1),
            ImageGate::Admitted { on_trial: true }
        );
    }

    #[test]
    fn subscriber_image_gate_requires_keys() {
        let (_dir, ledger) = ledger();
        let user = UserId(8);

        ledger.grant_subscription_at(user, 25, NOW);
        for _ in 0..10 {
            assert!(matches!(
                ledger.authorize_image_at(user, NOW + 1),
                ImageGate::Admitted { on_trial: false }
            ));
        }
        assert_eq!(ledger.authorize_image_at(user, NOW + 1), ImageGate::NoKeys);
    }

    #[test]
    fn no_access_without_subscription_or_trial() {
        let (_dir, ledger) = ledger();
        assert_eq!(
            ledger.authorize_image_at(UserId(9), NOW),
            ImageGate::NoAccess
        );
    }

    #[test]
    fn records_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LedgerConfig {
            trial_window: Duration::from_secs(600),
            trial_cooldown: Duration::from_secs(5 * 24 * 60 * 60),
            image_key_grant: 10,
        };
        let path = dir.path().join("entitlements.json");

        {
            let ledger = EntitlementLedger::new(cfg, JsonStore::new(&path));
            ledger.grant_subscription_at(UserId(10), 25, NOW);
            assert!(ledger.consume_image_quota(UserId(10)));
        }

        let reloaded = EntitlementLedger::new(cfg, JsonStore::new(&path));
        assert!(reloaded.is_subscribed_at(UserId(10), NOW + 1));
        assert_eq!(reloaded.image_keys(UserId(10)), 9);
    }
}
