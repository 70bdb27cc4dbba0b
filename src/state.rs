use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::selection::SelectionPolicy;
use crate::models::partner::DeliveryPartner;
use crate::notify::{Notification, NotificationHub};
use crate::observability::metrics::Metrics;
use crate::store::OrderStore;

pub struct AppState {
    pub config: Config,
    pub orders: OrderStore,
    pub partners: DashMap<Uuid, DeliveryPartner>,
    pub notifier: Arc<NotificationHub>,
    pub selection: Box<dyn SelectionPolicy>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> (Self, mpsc::Receiver<Notification>) {
        let metrics = Metrics::new();
        let (notifier, outbox_rx) = NotificationHub::new(
            config.notification_queue_size,
            config.topic_buffer_size,
            metrics.clone(),
        );

        (
            Self {
                selection: config.selection_policy.build(),
                config,
                orders: OrderStore::new(),
                partners: DashMap::new(),
                notifier,
                metrics,
            },
            outbox_rx,
        )
    }
}
