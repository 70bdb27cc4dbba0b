pub mod dispatcher;

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;
use uuid::Uuid;

use crate::models::actor::{Actor, Role};
use crate::models::assignment::Assignment;
use crate::models::event::StatusEvent;
use crate::observability::metrics::Metrics;
use crate::store::OrderRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "class", content = "id", rename_all = "lowercase")]
pub enum Audience {
    Admin,
    Vendor(Uuid),
    Customer(Uuid),
    Partner(Uuid),
}

impl Audience {
    /// The one topic a live-channel client may follow: admins see everything,
    /// everyone else only their own feed.
    pub fn for_actor(actor: &Actor) -> Self {
        match actor.role {
            Role::Admin => Audience::Admin,
            Role::Vendor => Audience::Vendor(actor.id),
            Role::Customer => Audience::Customer(actor.id),
            Role::Partner => Audience::Partner(actor.id),
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Audience::Admin => "admin",
            Audience::Vendor(_) => "vendor",
            Audience::Customer(_) => "customer",
            Audience::Partner(_) => "partner",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::Admin => f.write_str("admin"),
            Audience::Vendor(id) | Audience::Customer(id) | Audience::Partner(id) => {
                write!(f, "{}:{id}", self.class())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationEvent {
    StatusChanged(StatusEvent),
    Assigned(Assignment),
    Released(Assignment),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub order_id: Uuid,
    pub shop_id: Uuid,
    pub customer_id: Uuid,
    pub partner_id: Option<Uuid>,
    pub order_version: u64,
    pub event: NotificationEvent,
}

impl Notification {
    pub fn for_record(record: &OrderRecord, event: NotificationEvent) -> Self {
        let partner_id = match &event {
            NotificationEvent::Assigned(a) | NotificationEvent::Released(a) => Some(a.partner_id),
            NotificationEvent::StatusChanged(_) => {
                record.bound_assignment().map(|a| a.partner_id)
            }
        };

        Self {
            order_id: record.order.id,
            shop_id: record.order.shop_id,
            customer_id: record.order.customer_id,
            partner_id,
            order_version: record.order.version,
            event,
        }
    }

    pub fn audiences(&self) -> Vec<Audience> {
        let mut audiences = vec![
            Audience::Admin,
            Audience::Vendor(self.shop_id),
            Audience::Customer(self.customer_id),
        ];
        if let Some(partner_id) = self.partner_id {
            audiences.push(Audience::Partner(partner_id));
        }
        audiences
    }
}

pub struct NotificationHub {
    outbox_tx: mpsc::Sender<Notification>,
    topics: DashMap<Audience, broadcast::Sender<Notification>>,
    topic_buffer_size: usize,
    metrics: Metrics,
}

impl NotificationHub {
    pub fn new(
        queue_size: usize,
        topic_buffer_size: usize,
        metrics: Metrics,
    ) -> (Arc<Self>, mpsc::Receiver<Notification>) {
        let (outbox_tx, outbox_rx) = mpsc::channel(queue_size);

        (
            Arc::new(Self {
                outbox_tx,
                topics: DashMap::new(),
                topic_buffer_size,
                metrics,
            }),
            outbox_rx,
        )
    }

    /// Enqueues without waiting. A full or closed outbox drops the notification.
    pub fn publish(&self, notification: Notification) {
        match self.outbox_tx.try_send(notification) {
            Ok(()) => self.metrics.notifications_in_queue.inc(),
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(order_id = %dropped.order_id, "notification queue full; dropping");
                self.metrics
                    .notifications_dropped_total
                    .with_label_values(&["queue_full"])
                    .inc();
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                warn!(order_id = %dropped.order_id, "notification dispatcher stopped; dropping");
                self.metrics
                    .notifications_dropped_total
                    .with_label_values(&["dispatcher_stopped"])
                    .inc();
            }
        }
    }

    pub fn subscribe(self: &Arc<Self>, audience: Audience) -> Subscription {
        let rx = self
            .topics
            .entry(audience)
            .or_insert_with(|| broadcast::channel(self.topic_buffer_size).0)
            .subscribe();

        Subscription {
            audience,
            rx,
            hub: Arc::clone(self),
        }
    }

    pub(crate) fn deliver(&self, audience: &Audience, notification: Notification) -> bool {
        let delivered = match self.topics.get(audience) {
            Some(tx) => tx.send(notification).is_ok(),
            None => return false,
        };

        if !delivered {
            self.topics
                .remove_if(audience, |_, tx| tx.receiver_count() == 0);
        }
        delivered
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn subscriber_count(&self, audience: &Audience) -> usize {
        self.topics
            .get(audience)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

pub struct Subscription {
    audience: Audience,
    rx: broadcast::Receiver<Notification>,
    hub: Arc<NotificationHub>,
}

impl Subscription {
    pub fn audience(&self) -> Audience {
        self.audience
    }

    pub async fn recv(&mut self) -> Result<Notification, RecvError> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Notification, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // our own receiver is still counted here
        self.hub
            .topics
            .remove_if(&self.audience, |_, tx| tx.receiver_count() <= 1);
    }
}
