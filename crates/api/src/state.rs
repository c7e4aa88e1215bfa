//! Shared application state for the Axum API server.

use std::sync::Arc;

use herald_common::config::AppConfig;
use herald_engine::chat::ChatMessageProducer;
use herald_engine::dedupe::DedupeWindow;
use herald_engine::favorites::FavoriteLookup;
use herald_engine::price_change::PriceChangeProducer;
use herald_engine::{FanoutEngine, NotificationService, NotificationStore, PresenceSlot};
use herald_notifier::PushChannel;

use crate::hub::ConnectionHub;

/// External collaborators the state is assembled from.
pub struct Backends {
    pub store: Arc<dyn NotificationStore>,
    pub favorites: Arc<dyn FavoriteLookup>,
    pub push: Arc<dyn PushChannel>,
    pub dedupe: Option<Arc<dyn DedupeWindow>>,
}

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub hub: Arc<ConnectionHub>,
    pub engine: Arc<FanoutEngine>,
    pub service: NotificationService,
    pub price_changes: Arc<PriceChangeProducer>,
    pub chat: Arc<ChatMessageProducer>,
}

impl AppState {
    /// Wire the engine and the connection hub together. The engine is built
    /// against an empty presence slot that the hub is bound into afterwards.
    pub fn new(config: AppConfig, backends: Backends) -> Self {
        let presence = PresenceSlot::new();
        let engine = Arc::new(FanoutEngine::new(
            backends.store.clone(),
            presence.clone(),
            backends.push,
            config.dispatch_concurrency,
        ));

        let hub = Arc::new(ConnectionHub::new(config.realtime_buffer));
        presence.bind(hub.clone());

        let service = NotificationService::new(backends.store, presence);
        let price_changes = Arc::new(PriceChangeProducer::new(
            backends.favorites,
            engine.clone(),
            backends.dedupe,
        ));
        let chat = Arc::new(ChatMessageProducer::new(engine.clone()));

        Self {
            config,
            hub,
            engine,
            service,
            price_changes,
            chat,
        }
    }
}
