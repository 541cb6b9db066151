use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::error::Result;
use crate::mercury::TransactionSource;
use crate::models::{AccountPool, Transaction};
use crate::notify::{NotificationEvent, Notifier};
use crate::settings::NotificationSettings;

/// Transaction ids already evaluated for notification, each keyed to its
/// own `createdAt` so eviction follows the record's age, not insertion
/// order. Process-lifetime only; a restart re-seeds from the lookback
/// window.
#[derive(Debug, Default)]
pub struct SeenSet {
    ids: HashMap<String, DateTime<Utc>>,
}

impl SeenSet {
    /// Returns true when the id was not seen before.
    pub fn insert(&mut self, id: &str, created_at: DateTime<Utc>) -> bool {
        match self.ids.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(created_at);
                true
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn evict_before(&mut self, cutoff: DateTime<Utc>) {
        self.ids.retain(|_, created| *created >= cutoff);
    }
}

/// Last-notified times per derived vendor name. Distinct transactions that
/// derive to the same label (notably "Unknown Vendor") share one bucket;
/// that coarsening is inherited behavior, kept deliberately.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last: HashMap<String, DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn allow(&self, vendor: &str, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last
            .get(vendor)
            .map_or(true, |last| now - *last >= cooldown)
    }

    pub fn record(&mut self, vendor: &str, now: DateTime<Utc>) {
        self.last.insert(vendor.to_string(), now);
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How far back each poll tick looks.
    pub recent_window: Duration,
    /// Seed window applied once at startup.
    pub seed_lookback: Duration,
    /// Seen-set entries older than this (by `createdAt`) are dropped.
    pub seen_ttl: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            recent_window: Duration::minutes(5),
            seed_lookback: Duration::hours(24),
            seen_ttl: Duration::hours(48),
        }
    }
}

/// Outcome of one poll tick, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// This tick performed (or retried) the seed instead of polling.
    pub seeded: bool,
    /// Transactions not previously in the seen-set.
    pub fresh: usize,
    /// Notification emissions attempted (delivery failures included).
    pub emitted: usize,
}

/// Filter predicate applied to every notification candidate.
pub fn should_notify(settings: &NotificationSettings, tx: &Transaction) -> bool {
    if !settings.enabled {
        return false;
    }
    if tx.amount.abs() < settings.min_amount {
        return false;
    }
    if tx.kind.contains("credit") && !settings.include_credits {
        return false;
    }
    if tx.kind.contains("debit") && !settings.include_debits {
        return false;
    }
    let category = tx.category.as_deref().unwrap_or("").to_lowercase();
    if settings
        .exclude_categories
        .iter()
        .any(|c| c.to_lowercase() == category)
    {
        return false;
    }
    let vendor = tx.vendor_name.to_lowercase();
    if settings
        .exclude_vendors
        .iter()
        .any(|v| v.to_lowercase() == vendor)
    {
        return false;
    }
    true
}

struct Candidate {
    tx: Transaction,
    account_name: String,
    pool: AccountPool,
}

/// Short-interval poller that diffs freshly observed transaction ids
/// against the seen-set and pushes qualifying ones to the notifier.
///
/// Two states: unseeded (seen-set empty) and active. The first poll never
/// evaluates candidates against an empty seen-set: until seeding succeeds,
/// a tick only (re)attempts the seed.
pub struct TransactionMonitor<S, N> {
    source: S,
    notifier: N,
    settings: NotificationSettings,
    cfg: MonitorConfig,
    seen: SeenSet,
    cooldowns: CooldownTracker,
    seeded: bool,
}

impl<S: TransactionSource, N: Notifier> TransactionMonitor<S, N> {
    pub fn new(source: S, notifier: N, settings: NotificationSettings, cfg: MonitorConfig) -> Self {
        Self {
            source,
            notifier,
            settings,
            cfg,
            seen: SeenSet::default(),
            cooldowns: CooldownTracker::default(),
            seeded: false,
        }
    }

    pub async fn tick(&mut self) -> Result<TickReport> {
        self.tick_at(Utc::now()).await
    }

    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> Result<TickReport> {
        if !self.seeded {
            self.seed_at(now).await?;
            self.seeded = true;
            return Ok(TickReport {
                seeded: true,
                ..TickReport::default()
            });
        }

        let candidates = self.collect_candidates(now).await?;
        let fresh = candidates.len();
        let cooldown = Duration::seconds(self.settings.notification_cooldown as i64);
        let mut emitted = 0usize;
        for candidate in candidates {
            if !should_notify(&self.settings, &candidate.tx) {
                continue;
            }
            let vendor = candidate.tx.vendor_name.clone();
            if !self.cooldowns.allow(&vendor, now, cooldown) {
                continue;
            }
            let event = NotificationEvent {
                vendor: vendor.clone(),
                account_name: candidate.account_name,
                account_pool: candidate.pool,
                transaction: candidate.tx,
            };
            // A failed delivery must not stop the rest of the tick.
            if let Err(e) = self.notifier.notify(&event).await {
                warn!(vendor = %vendor, error = %e, "notification delivery failed");
            }
            self.cooldowns.record(&vendor, now);
            emitted += 1;
        }
        self.seen.evict_before(now - self.cfg.seen_ttl);
        Ok(TickReport {
            seeded: false,
            fresh,
            emitted,
        })
    }

    /// Populate the seen-set from the lookback window so existing
    /// transactions are never re-announced. A failing account is skipped;
    /// a failing account directory fails the seed, which is retried on the
    /// next tick.
    async fn seed_at(&mut self, now: DateTime<Utc>) -> Result<()> {
        let after = now - self.cfg.seed_lookback;
        let directory = self.source.fetch_accounts().await?;
        for (pool, account) in directory.sync_targets() {
            let Some(account_id) = account.id.as_deref() else {
                continue;
            };
            match self.source.list_transactions(account_id, Some(after)).await {
                Ok(raw) => {
                    for tx in raw.into_iter().filter_map(Transaction::from_raw) {
                        self.seen.insert(&tx.id, tx.created_at);
                    }
                }
                Err(e) => {
                    warn!(account = account_id, pool = %pool, error = %e, "seed fetch failed, skipping account");
                }
            }
        }
        info!(seen = self.seen.len(), "notification seen-set seeded");
        Ok(())
    }

    async fn collect_candidates(&mut self, now: DateTime<Utc>) -> Result<Vec<Candidate>> {
        let after = now - self.cfg.recent_window;
        let directory = self.source.fetch_accounts().await?;
        let mut candidates = Vec::new();
        for (pool, account) in directory.sync_targets() {
            let Some(account_id) = account.id.as_deref() else {
                continue;
            };
            let raw = match self.source.list_transactions(account_id, Some(after)).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(account = account_id, pool = %pool, error = %e, "poll fetch failed, skipping account");
                    continue;
                }
            };
            for tx in raw.into_iter().filter_map(Transaction::from_raw) {
                if self.seen.insert(&tx.id, tx.created_at) {
                    candidates.push(Candidate {
                        tx,
                        account_name: account.display_name().to_string(),
                        pool,
                    });
                }
            }
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::mercury::fake::FakeSource;
    use crate::models::RawTransaction;
    use crate::notify::recording::RecordingNotifier;

    fn raw(account: &str, id: &str, created: DateTime<Utc>, amount: f64) -> RawTransaction {
        RawTransaction {
            id: Some(id.to_string()),
            created_at: Some(created),
            amount: Some(amount),
            kind: Some("debit".to_string()),
            merchant_name: Some(format!("{id} vendor")),
            account_id: account.to_string(),
            ..Default::default()
        }
    }

    fn monitor(
        source: FakeSource,
        settings: NotificationSettings,
    ) -> (RecordingNotifier, TransactionMonitor<FakeSource, RecordingNotifier>) {
        let notifier = RecordingNotifier::default();
        let mon = TransactionMonitor::new(source, notifier.clone(), settings, MonitorConfig::default());
        (notifier, mon)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 10, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_seed_then_only_unseen_ids_are_candidates() {
        let source = FakeSource::with_accounts(&["acc1"], &[]);
        let t0 = now();
        source.push(raw("acc1", "a", t0 - Duration::minutes(2), -10.0));
        source.push(raw("acc1", "b", t0 - Duration::minutes(1), -10.0));
        let (notifier, mut mon) = monitor(source.clone(), NotificationSettings::default());

        let report = mon.tick_at(t0).await.unwrap();
        assert!(report.seeded);
        assert!(notifier.events.lock().unwrap().is_empty());
        assert!(mon.seen.contains("a") && mon.seen.contains("b"));

        source.push(raw("acc1", "c", t0 + Duration::seconds(30), -10.0));
        let report = mon.tick_at(t0 + Duration::minutes(1)).await.unwrap();
        assert_eq!(report.fresh, 1);
        assert_eq!(report.emitted, 1);
        let events = notifier.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transaction.id, "c");
        assert_eq!(events[0].account_name, "acc1 account");
        assert_eq!(events[0].account_pool, AccountPool::Core);
    }

    #[tokio::test]
    async fn test_vendor_cooldown_suppresses_then_allows() {
        let source = FakeSource::with_accounts(&["acc1"], &[]);
        let (notifier, mut mon) = monitor(source.clone(), NotificationSettings::default());
        let t0 = now();
        mon.tick_at(t0).await.unwrap(); // seed

        let mut first = raw("acc1", "t1", t0 + Duration::seconds(10), -10.0);
        first.merchant_name = Some("Uber".to_string());
        source.push(first);
        mon.tick_at(t0 + Duration::seconds(20)).await.unwrap();

        // Second transaction from the same vendor, inside the 300 s cooldown.
        let mut second = raw("acc1", "t2", t0 + Duration::seconds(60), -12.0);
        second.merchant_name = Some("Uber".to_string());
        source.push(second);
        let report = mon.tick_at(t0 + Duration::seconds(80)).await.unwrap();
        assert_eq!(report.fresh, 1);
        assert_eq!(report.emitted, 0);

        // Third one after the cooldown has elapsed.
        let mut third = raw("acc1", "t3", t0 + Duration::seconds(380), -14.0);
        third.merchant_name = Some("Uber".to_string());
        source.push(third);
        mon.tick_at(t0 + Duration::seconds(400)).await.unwrap();

        let ids: Vec<String> = notifier
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.transaction.id.clone())
            .collect();
        assert_eq!(ids, vec!["t1", "t3"]);
    }

    #[tokio::test]
    async fn test_unknown_vendors_share_one_cooldown_bucket() {
        let source = FakeSource::with_accounts(&["acc1"], &[]);
        let (notifier, mut mon) = monitor(source.clone(), NotificationSettings::default());
        let t0 = now();
        mon.tick_at(t0).await.unwrap();

        // Two unrelated transactions, neither resolvable to a vendor.
        let mut t1 = raw("acc1", "t1", t0 + Duration::seconds(10), -10.0);
        t1.merchant_name = None;
        let mut t2 = raw("acc1", "t2", t0 + Duration::seconds(15), -20.0);
        t2.merchant_name = None;
        source.push(t1);
        source.push(t2);

        let report = mon.tick_at(t0 + Duration::seconds(30)).await.unwrap();
        assert_eq!(report.fresh, 2);
        assert_eq!(report.emitted, 1);
        assert_eq!(notifier.events.lock().unwrap()[0].vendor, "Unknown Vendor");
    }

    #[tokio::test]
    async fn test_filters_reject_disabled_kinds_and_small_amounts() {
        let source = FakeSource::with_accounts(&["acc1"], &[]);
        let mut settings = NotificationSettings::default();
        settings.include_debits = false;
        settings.min_amount = 50.0;
        let (notifier, mut mon) = monitor(source.clone(), settings);
        let t0 = now();
        mon.tick_at(t0).await.unwrap();

        // Large debit: rejected by kind despite the amount.
        source.push(raw("acc1", "big-debit", t0 + Duration::seconds(5), -500.0));
        // Small credit: rejected by min_amount.
        let mut small = raw("acc1", "small-credit", t0 + Duration::seconds(6), 10.0);
        small.kind = Some("credit".to_string());
        // Large credit: passes.
        let mut large = raw("acc1", "large-credit", t0 + Duration::seconds(7), 200.0);
        large.kind = Some("credit".to_string());
        source.push(small);
        source.push(large);

        mon.tick_at(t0 + Duration::seconds(30)).await.unwrap();
        let events = notifier.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transaction.id, "large-credit");
    }

    #[tokio::test]
    async fn test_excluded_vendor_and_category_never_notify() {
        let source = FakeSource::with_accounts(&["acc1"], &[]);
        let mut settings = NotificationSettings::default();
        settings.exclude_vendors = vec!["Gusto".to_string()];
        settings.exclude_categories = vec!["Payroll".to_string()];
        let (notifier, mut mon) = monitor(source.clone(), settings);
        let t0 = now();
        mon.tick_at(t0).await.unwrap();

        let mut payroll = raw("acc1", "p1", t0 + Duration::seconds(5), -5000.0);
        payroll.merchant_name = Some("gusto".to_string());
        let mut categorized = raw("acc1", "p2", t0 + Duration::seconds(6), -100.0);
        categorized.mercury_category = Some("payroll".to_string());
        source.push(payroll);
        source.push(categorized);

        let report = mon.tick_at(t0 + Duration::seconds(30)).await.unwrap();
        assert_eq!(report.fresh, 2);
        assert_eq!(report.emitted, 0);
        assert!(notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_stop_the_tick() {
        let source = FakeSource::with_accounts(&["acc1"], &[]);
        let (notifier, mut mon) = monitor(source.clone(), NotificationSettings::default());
        let t0 = now();
        mon.tick_at(t0).await.unwrap();

        let mut t1 = raw("acc1", "t1", t0 + Duration::seconds(5), -10.0);
        t1.merchant_name = Some("First".to_string());
        let mut t2 = raw("acc1", "t2", t0 + Duration::seconds(6), -20.0);
        t2.merchant_name = Some("Second".to_string());
        source.push(t1);
        source.push(t2);
        *notifier.fail_first.lock().unwrap() = 1;

        let report = mon.tick_at(t0 + Duration::seconds(30)).await.unwrap();
        assert_eq!(report.emitted, 2);
        let events = notifier.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].vendor, "Second");
    }

    #[tokio::test]
    async fn test_failed_seed_is_retried_before_any_candidates() {
        let source = FakeSource::with_accounts(&["acc1"], &[]);
        let t0 = now();
        source.push(raw("acc1", "old", t0 - Duration::minutes(3), -10.0));
        *source.fail_account_fetch.lock().unwrap() = true;
        let (notifier, mut mon) = monitor(source.clone(), NotificationSettings::default());

        assert!(mon.tick_at(t0).await.is_err());
        assert!(!mon.seeded);

        // Upstream recovers: the next tick seeds and still emits nothing,
        // even though "old" was never seen before.
        *source.fail_account_fetch.lock().unwrap() = false;
        let report = mon.tick_at(t0 + Duration::minutes(1)).await.unwrap();
        assert!(report.seeded);
        assert!(notifier.events.lock().unwrap().is_empty());
        assert!(mon.seen.contains("old"));
    }

    #[tokio::test]
    async fn test_poll_failure_for_one_account_skips_it() {
        let source = FakeSource::with_accounts(&["bad", "good"], &[]);
        let (notifier, mut mon) = monitor(source.clone(), NotificationSettings::default());
        let t0 = now();
        mon.tick_at(t0).await.unwrap();

        source.fail_account("bad");
        source.push(raw("bad", "t1", t0 + Duration::seconds(5), -10.0));
        source.push(raw("good", "t2", t0 + Duration::seconds(6), -20.0));

        let report = mon.tick_at(t0 + Duration::seconds(30)).await.unwrap();
        assert_eq!(report.emitted, 1);
        assert_eq!(notifier.events.lock().unwrap()[0].transaction.id, "t2");
    }

    // Known boundary, not a regression: a transaction surfacing upstream
    // later than the recent window reaches back is never notified.
    #[tokio::test]
    async fn test_transaction_older_than_poll_window_is_silently_missed() {
        let source = FakeSource::with_accounts(&["acc1"], &[]);
        let (notifier, mut mon) = monitor(source.clone(), NotificationSettings::default());
        let t0 = now();
        mon.tick_at(t0).await.unwrap();

        source.push(raw("acc1", "late", t0 - Duration::minutes(10), -10.0));
        let report = mon.tick_at(t0 + Duration::seconds(60)).await.unwrap();
        assert_eq!(report.fresh, 0);
        assert!(notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seen_set_evicts_entries_older_than_ttl() {
        let source = FakeSource::with_accounts(&["acc1"], &[]);
        let (_notifier, mut mon) = monitor(source.clone(), NotificationSettings::default());
        let t0 = now();
        mon.tick_at(t0).await.unwrap();

        mon.seen.insert("ancient", t0 - Duration::hours(50));
        mon.seen.insert("recent", t0 - Duration::hours(1));
        mon.tick_at(t0 + Duration::seconds(60)).await.unwrap();
        assert!(!mon.seen.contains("ancient"));
        assert!(mon.seen.contains("recent"));
    }

    #[test]
    fn test_should_notify_globally_disabled() {
        let mut settings = NotificationSettings::default();
        settings.enabled = false;
        let tx = Transaction::from_raw(raw("acc1", "t1", now(), -100.0)).unwrap();
        assert!(!should_notify(&settings, &tx));
    }
}
