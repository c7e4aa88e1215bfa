//! Price-change producer.
//!
//! Turns "listing price changed" into a dispatch addressed to everyone who
//! currently has the listing saved, excluding the seller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Payload, kind};

use crate::dedupe::DedupeWindow;
use crate::favorites::FavoriteLookup;
use crate::fanout::{DispatchRequest, FanoutEngine};

const TITLE: &str = "Price Alert! 🔔";

/// A committed price edit on a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub listing_id: Uuid,
    pub seller_id: Uuid,
    pub listing_title: String,
    pub old_price: f64,
    pub new_price: f64,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl PriceChange {
    fn direction(&self) -> &'static str {
        if self.new_price < self.old_price {
            "dropped"
        } else {
            "increased"
        }
    }

    fn body(&self) -> String {
        format!(
            "A car you saved has {}! {}: ${:.0} → ${:.0}",
            self.direction(),
            self.listing_title,
            self.old_price,
            self.new_price
        )
    }

    fn payload(&self) -> Payload {
        let mut data = Payload::new();
        data.insert("car_id".into(), Value::String(self.listing_id.to_string()));
        data.insert("old_price".into(), Value::String(format!("{:.0}", self.old_price)));
        data.insert("new_price".into(), Value::String(format!("{:.0}", self.new_price)));
        if let Some(image) = &self.image_url {
            data.insert("car_image".into(), Value::String(image.clone()));
        }
        data
    }
}

pub struct PriceChangeProducer {
    favorites: Arc<dyn FavoriteLookup>,
    engine: Arc<FanoutEngine>,
    dedupe: Option<Arc<dyn DedupeWindow>>,
}

impl PriceChangeProducer {
    pub fn new(
        favorites: Arc<dyn FavoriteLookup>,
        engine: Arc<FanoutEngine>,
        dedupe: Option<Arc<dyn DedupeWindow>>,
    ) -> Self {
        Self {
            favorites,
            engine,
            dedupe,
        }
    }

    /// Fire-and-forget. The caller's price edit never waits on this.
    pub fn notify(self: &Arc<Self>, change: PriceChange) {
        let producer = Arc::clone(self);
        tokio::spawn(async move {
            let listing_id = change.listing_id;
            if let Err(e) = producer.run(change).await {
                tracing::error!(listing_id = %listing_id, error = %e, "Price change notification failed");
            }
        });
    }

    /// Resolve recipients and dispatch. Returns the number of users notified.
    pub async fn run(&self, change: PriceChange) -> Result<usize, AppError> {
        if change.old_price == change.new_price {
            return Ok(0);
        }

        let candidates = self.favorites.users_favoriting(change.listing_id).await?;

        let mut recipients = Vec::with_capacity(candidates.len());
        for user_id in candidates {
            if user_id == change.seller_id {
                continue;
            }
            // Favorites may have been removed since the candidate list was read
            match self.favorites.is_favorited(user_id, change.listing_id).await {
                Ok(true) => recipients.push(user_id),
                Ok(false) => {}
                Err(e) => tracing::debug!(user_id = %user_id, error = %e, "Favorite re-check failed, skipping"),
            }
        }

        if recipients.is_empty() {
            return Ok(0);
        }

        // Claimed only once there is someone to tell, so a failed lookup
        // leaves the change free to be retried.
        if let Some(dedupe) = &self.dedupe {
            match dedupe
                .first_seen(change.listing_id, change.old_price, change.new_price)
                .await
            {
                Ok(true) => {}
                Ok(false) => return Ok(0),
                Err(e) => tracing::warn!(error = %e, "Price change dedupe unavailable"),
            }
        }

        let count = recipients.len();
        let request = DispatchRequest::new(recipients, TITLE, change.body())
            .with_kind(kind::PRICE_CHANGE)
            .with_image(change.image_url.clone())
            .with_data(change.payload());
        self.engine.dispatch_bounded(request).await;

        tracing::info!(listing_id = %change.listing_id, users = count, "Price change notifications sent");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use herald_notifier::{PushChannel, PushError, PushMessage, PushOutcome};
    use tokio::sync::Mutex;

    use herald_common::types::{Notification, PageRequest};

    use crate::dedupe::change_marker;
    use crate::memory::InMemoryNotificationStore;
    use crate::presence::PresenceSlot;
    use crate::store::NotificationStore;

    /// Candidate list is a snapshot; `current` is consulted by the re-check.
    /// The first `failures` candidate lookups error out.
    struct FakeFavorites {
        snapshot: HashMap<Uuid, Vec<Uuid>>,
        current: Mutex<HashSet<(Uuid, Uuid)>>,
        failures: AtomicUsize,
    }

    impl FakeFavorites {
        fn new(listing: Uuid, snapshot: Vec<Uuid>, current: &[Uuid]) -> Self {
            Self {
                current: Mutex::new(current.iter().map(|u| (*u, listing)).collect()),
                snapshot: HashMap::from([(listing, snapshot)]),
                failures: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FavoriteLookup for FakeFavorites {
        async fn users_favoriting(&self, listing_id: Uuid) -> Result<Vec<Uuid>, AppError> {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(AppError::Internal("favorites unavailable".to_string()));
            }
            Ok(self.snapshot.get(&listing_id).cloned().unwrap_or_default())
        }

        async fn is_favorited(&self, user_id: Uuid, listing_id: Uuid) -> Result<bool, AppError> {
            Ok(self.current.lock().await.contains(&(user_id, listing_id)))
        }
    }

    struct NoPush;

    #[async_trait]
    impl PushChannel for NoPush {
        async fn push_to_users(&self, _: &[Uuid], _: &PushMessage) -> Result<PushOutcome, PushError> {
            Err(PushError::NotConfigured)
        }
    }

    /// Last change per listing, kept in process.
    #[derive(Default)]
    struct MemoryWindow {
        last: Mutex<HashMap<Uuid, String>>,
    }

    #[async_trait]
    impl DedupeWindow for MemoryWindow {
        async fn first_seen(&self, listing_id: Uuid, old: f64, new: f64) -> anyhow::Result<bool> {
            let marker = change_marker(old, new);
            let previous = self.last.lock().await.insert(listing_id, marker.clone());
            Ok(previous.as_deref() != Some(marker.as_str()))
        }
    }

    /// Store that tracks how many batch inserts overlap.
    #[derive(Default)]
    struct SlowStore {
        inner: InMemoryNotificationStore,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl NotificationStore for SlowStore {
        async fn create(&self, n: &Notification) -> Result<Uuid, AppError> {
            self.inner.create(n).await
        }

        async fn create_batch(&self, batch: &[Notification]) -> Result<(), AppError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.inner.create_batch(batch).await
        }

        async fn list_by_user(
            &self,
            user_id: Uuid,
            page: PageRequest,
        ) -> Result<(Vec<Notification>, i64), AppError> {
            self.inner.list_by_user(user_id, page).await
        }

        async fn count_unread(&self, user_id: Uuid) -> Result<i64, AppError> {
            self.inner.count_unread(user_id).await
        }

        async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
            self.inner.mark_read(user_id, id).await
        }

        async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
            self.inner.mark_all_read(user_id).await
        }

        async fn purge_older_than(&self, days: u32) -> Result<u64, AppError> {
            self.inner.purge_older_than(days).await
        }
    }

    fn memory_engine(store: Arc<InMemoryNotificationStore>) -> Arc<FanoutEngine> {
        Arc::new(FanoutEngine::new(store, PresenceSlot::new(), Arc::new(NoPush), 4))
    }

    fn change(listing_id: Uuid, seller_id: Uuid, old: f64, new: f64) -> PriceChange {
        PriceChange {
            listing_id,
            seller_id,
            listing_title: "2019 Civic".to_string(),
            old_price: old,
            new_price: new,
            image_url: Some("https://img/civic.jpg".to_string()),
        }
    }

    #[test]
    fn test_body_and_payload() {
        let c = change(Uuid::nil(), Uuid::nil(), 20000.0, 18000.0);
        assert_eq!(c.body(), "A car you saved has dropped! 2019 Civic: $20000 → $18000");
        let data = c.payload();
        assert_eq!(data["old_price"], "20000");
        assert_eq!(data["new_price"], "18000");
        assert_eq!(data["car_image"], "https://img/civic.jpg");

        let up = change(Uuid::nil(), Uuid::nil(), 100.0, 150.0);
        assert!(up.body().contains("has increased!"));
    }

    #[tokio::test]
    async fn test_price_drop_reaches_only_current_favoriters() {
        let listing = Uuid::new_v4();
        let (s, a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        // S favorited their own listing; B un-favorites after the snapshot
        let favorites = Arc::new(FakeFavorites::new(listing, vec![s, a, b], &[s, a]));
        let store = Arc::new(InMemoryNotificationStore::new());
        let engine = Arc::new(FanoutEngine::new(
            store.clone(),
            PresenceSlot::new(),
            Arc::new(NoPush),
            4,
        ));
        let producer = PriceChangeProducer::new(favorites, engine, None);

        let sent = producer.run(change(listing, s, 20000.0, 18000.0)).await.unwrap();

        assert_eq!(sent, 1);
        assert_eq!(store.count_unread(a).await.unwrap(), 1);
        for user in [s, b, c] {
            assert_eq!(store.count_unread(user).await.unwrap(), 0);
        }

        let (items, _) = store.list_by_user(a, Default::default()).await.unwrap();
        assert_eq!(items[0].notification_type, kind::PRICE_CHANGE);
        assert_eq!(items[0].title, TITLE);
        assert_eq!(items[0].data["car_id"], listing.to_string());
    }

    #[tokio::test]
    async fn test_unchanged_price_is_skipped() {
        let listing = Uuid::new_v4();
        let a = Uuid::new_v4();
        let favorites = Arc::new(FakeFavorites::new(listing, vec![a], &[a]));
        let store = Arc::new(InMemoryNotificationStore::new());
        let engine = Arc::new(FanoutEngine::new(
            store.clone(),
            PresenceSlot::new(),
            Arc::new(NoPush),
            4,
        ));
        let producer = PriceChangeProducer::new(favorites, engine, None);

        let sent = producer
            .run(change(listing, Uuid::new_v4(), 5000.0, 5000.0))
            .await
            .unwrap();

        assert_eq!(sent, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_lookup_does_not_claim_window() {
        let listing = Uuid::new_v4();
        let a = Uuid::new_v4();
        let favorites = Arc::new(FakeFavorites::new(listing, vec![a], &[a]));
        favorites.failures.store(1, Ordering::SeqCst);
        let store = Arc::new(InMemoryNotificationStore::new());
        let producer = PriceChangeProducer::new(
            favorites,
            memory_engine(store.clone()),
            Some(Arc::new(MemoryWindow::default())),
        );

        let price_drop = change(listing, Uuid::new_v4(), 20000.0, 18000.0);
        assert!(producer.run(price_drop.clone()).await.is_err());
        assert_eq!(producer.run(price_drop).await.unwrap(), 1);
        assert_eq!(store.count_unread(a).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_window_suppresses_only_exact_repeats() {
        let listing = Uuid::new_v4();
        let (seller, a) = (Uuid::new_v4(), Uuid::new_v4());
        let favorites = Arc::new(FakeFavorites::new(listing, vec![a], &[a]));
        let store = Arc::new(InMemoryNotificationStore::new());
        let producer = PriceChangeProducer::new(
            favorites,
            memory_engine(store.clone()),
            Some(Arc::new(MemoryWindow::default())),
        );

        let steps = [(20000.0, 18000.0), (18000.0, 20000.0), (20000.0, 18000.0)];
        for (old, new) in steps {
            assert_eq!(producer.run(change(listing, seller, old, new)).await.unwrap(), 1);
        }
        assert_eq!(
            producer.run(change(listing, seller, 20000.0, 18000.0)).await.unwrap(),
            0
        );
        assert_eq!(store.count_unread(a).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_producer_respects_dispatch_pool() {
        let store = Arc::new(SlowStore::default());
        let engine = Arc::new(FanoutEngine::new(
            store.clone(),
            PresenceSlot::new(),
            Arc::new(NoPush),
            1,
        ));

        let mut runs = Vec::new();
        for _ in 0..4 {
            let listing = Uuid::new_v4();
            let a = Uuid::new_v4();
            let producer = PriceChangeProducer::new(
                Arc::new(FakeFavorites::new(listing, vec![a], &[a])),
                engine.clone(),
                None,
            );
            runs.push(tokio::spawn(async move {
                producer.run(change(listing, Uuid::new_v4(), 100.0, 90.0)).await
            }));
        }
        for run in runs {
            assert_eq!(run.await.unwrap().unwrap(), 1);
        }

        assert_eq!(store.peak.load(Ordering::SeqCst), 1);
    }
}
