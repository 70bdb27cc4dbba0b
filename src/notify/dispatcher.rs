use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::notify::{Notification, NotificationHub};

pub async fn run_notification_dispatcher(
    hub: Arc<NotificationHub>,
    mut outbox_rx: mpsc::Receiver<Notification>,
) {
    info!("notification dispatcher started");

    while let Some(notification) = outbox_rx.recv().await {
        hub.metrics().notifications_in_queue.dec();

        for audience in notification.audiences() {
            if hub.deliver(&audience, notification.clone()) {
                hub.metrics()
                    .notifications_delivered_total
                    .with_label_values(&[audience.class()])
                    .inc();
            } else {
                debug!(%audience, order_id = %notification.order_id, "no live subscribers");
            }
        }
    }

    warn!("notification dispatcher stopped: outbox channel closed");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use uuid::Uuid;

    use super::run_notification_dispatcher;
    use crate::models::assignment::Assignment;
    use crate::notify::{Audience, Notification, NotificationEvent, NotificationHub};
    use crate::observability::metrics::Metrics;

    #[tokio::test]
    async fn fans_out_to_partner_and_admin_but_not_strangers() {
        let (hub, rx) = NotificationHub::new(16, 16, Metrics::new());
        tokio::spawn(run_notification_dispatcher(hub.clone(), rx));

        let partner_id = Uuid::new_v4();
        let order_id = Uuid::new_v4();
        let mut admin = hub.subscribe(Audience::Admin);
        let mut partner = hub.subscribe(Audience::Partner(partner_id));
        let mut stranger = hub.subscribe(Audience::Partner(Uuid::new_v4()));

        let assignment = Assignment {
            id: Uuid::new_v4(),
            order_id,
            partner_id,
            fee_cents: 300,
            created_at: Utc::now(),
            released_at: None,
            rating: None,
        };
        hub.publish(Notification {
            order_id,
            shop_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            partner_id: Some(partner_id),
            order_version: 1,
            event: NotificationEvent::Assigned(assignment),
        });

        let got = tokio::time::timeout(Duration::from_secs(1), partner.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.order_id, order_id);

        let got = tokio::time::timeout(Duration::from_secs(1), admin.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(got.event, NotificationEvent::Assigned(_)));

        assert!(stranger.try_recv().is_err());
    }
}
