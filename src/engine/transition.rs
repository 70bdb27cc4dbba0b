use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::assignment::release_slot;
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::event::StatusEvent;
use crate::models::status::OrderStatus;
use crate::notify::{Notification, NotificationEvent};
use crate::state::AppState;
use crate::store::OrderRecord;

/// Applies one status change requested by `actor`.
pub fn transition(
    state: &AppState,
    order_id: Uuid,
    to: OrderStatus,
    actor: &Actor,
    expected_version: Option<u64>,
) -> Result<StatusEvent, AppError> {
    let result = apply(state, order_id, to, actor, expected_version);

    match &result {
        Ok(event) => {
            state.metrics.transitions_total.with_label_values(&[to.as_str()]).inc();
            info!(
                %order_id,
                from = %event.from,
                to = %event.to,
                actor_role = %actor.role,
                actor_id = %actor.id,
                "order status changed"
            );
        }
        Err(err) => {
            state.metrics.rejections_total.with_label_values(&[err.code()]).inc();
            warn!(%order_id, %to, actor_id = %actor.id, error = %err, "transition rejected");
        }
    }

    result
}

fn apply(
    state: &AppState,
    order_id: Uuid,
    to: OrderStatus,
    actor: &Actor,
    expected_version: Option<u64>,
) -> Result<StatusEvent, AppError> {
    let snapshot = state.orders.snapshot(order_id)?;
    authorize(&snapshot, to, actor)?;

    let version = snapshot.order.version;
    if let Some(expected) = expected_version {
        if expected != version {
            return Err(AppError::ConcurrentModification {
                order_id,
                expected,
                actual: version,
            });
        }
    }

    snapshot.order.status.check_transition(to)?;
    if to.is_partner_driven() && snapshot.active_assignment().is_none() {
        return Err(AppError::NoActiveAssignment(order_id));
    }

    let (event, record) = state.orders.commit(order_id, Some(version), |record| {
        let now = Utc::now();
        let event = StatusEvent {
            seq: record.next_event_seq(),
            order_id,
            from: record.order.status,
            to,
            actor: *actor,
            at: now,
        };
        record.order.status = to;
        record.order.status_changed_at = now;
        record.events.push(event.clone());
        Ok(event)
    })?;

    if to.is_terminal() {
        if let Some(bound) = record.bound_assignment() {
            release_slot(state, bound.partner_id, to == OrderStatus::Delivered);
        }
    }

    state.notifier.publish(Notification::for_record(
        &record,
        NotificationEvent::StatusChanged(event.clone()),
    ));

    Ok(event)
}

/// Who may request which target. Admins may force any legal step except entering
/// `ASSIGNED`, which only the assignment engine performs.
fn authorize(record: &OrderRecord, to: OrderStatus, actor: &Actor) -> Result<(), AppError> {
    let order = &record.order;
    if to == OrderStatus::Assigned {
        return Err(AppError::Unauthorized(
            "orders become ASSIGNED through assignment only".to_string(),
        ));
    }
    if actor.is_admin() {
        return Ok(());
    }

    match actor.role {
        Role::Partner if to.is_partner_driven() => match record.bound_assignment() {
            Some(bound) if bound.partner_id == actor.id => Ok(()),
            Some(_) => Err(AppError::Unauthorized(format!(
                "order {} is assigned to another partner",
                order.id
            ))),
            None => Err(AppError::NoActiveAssignment(order.id)),
        },
        Role::Vendor if to == OrderStatus::Cancelled => {
            if !actor.is_vendor_of(order.shop_id) {
                return Err(AppError::Unauthorized(format!(
                    "vendor {} does not own shop {}",
                    actor.id, order.shop_id
                )));
            }
            // terminal orders fall through to the legality check
            if !order.status.is_before_pickup() && !order.status.is_terminal() {
                return Err(AppError::Unauthorized(format!(
                    "vendors may only cancel before pickup, order is {}",
                    order.status
                )));
            }
            Ok(())
        }
        role => Err(AppError::Unauthorized(format!(
            "{role} may not move an order to {to}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::authorize;
    use crate::error::AppError;
    use crate::geo::GeoPoint;
    use crate::models::actor::{Actor, Role};
    use crate::models::assignment::Assignment;
    use crate::models::order::Order;
    use crate::models::status::OrderStatus;
    use crate::store::OrderRecord;

    const SHOP: u128 = 0x5A;
    const PARTNER: u128 = 0x9A;

    fn record(status: OrderStatus, bound_to: Option<u128>) -> OrderRecord {
        let here = GeoPoint { lat: 1.0, lng: 1.0 };
        let mut order = Order::place(
            Uuid::from_u128(SHOP),
            Uuid::from_u128(0xC0),
            Uuid::from_u128(0xAD),
            here,
            here,
            Vec::new(),
        );
        order.status = status;

        let assignments = bound_to
            .map(|partner| Assignment {
                id: Uuid::new_v4(),
                order_id: order.id,
                partner_id: Uuid::from_u128(partner),
                fee_cents: 250,
                created_at: Utc::now(),
                released_at: None,
                rating: None,
            })
            .into_iter()
            .collect();

        OrderRecord {
            order,
            assignments,
            events: Vec::new(),
        }
    }

    fn actor(id: u128, role: Role) -> Actor {
        Actor::new(Uuid::from_u128(id), role)
    }

    #[test]
    fn assigned_partner_may_drive_forward_moves() {
        let rec = record(OrderStatus::Assigned, Some(PARTNER));
        assert!(authorize(&rec, OrderStatus::EnRouteToPickup, &actor(PARTNER, Role::Partner)).is_ok());
    }

    #[test]
    fn other_partner_is_unauthorized() {
        let rec = record(OrderStatus::Assigned, Some(PARTNER));
        let err = authorize(&rec, OrderStatus::EnRouteToPickup, &actor(0x01, Role::Partner)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn partner_without_binding_triggers_reconciliation() {
        let rec = record(OrderStatus::Assigned, None);
        let err = authorize(&rec, OrderStatus::EnRouteToPickup, &actor(PARTNER, Role::Partner)).unwrap_err();
        assert!(matches!(err, AppError::NoActiveAssignment(_)));
    }

    #[test]
    fn vendor_cancels_only_before_pickup() {
        let vendor = actor(SHOP, Role::Vendor);
        for status in [OrderStatus::Placed, OrderStatus::Assigned, OrderStatus::EnRouteToPickup] {
            assert!(authorize(&record(status, Some(PARTNER)), OrderStatus::Cancelled, &vendor).is_ok());
        }
        for status in [OrderStatus::PickedUp, OrderStatus::OutForDelivery] {
            let err = authorize(&record(status, Some(PARTNER)), OrderStatus::Cancelled, &vendor).unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)), "{status}");
        }
    }

    #[test]
    fn foreign_vendor_and_customers_cannot_cancel() {
        let rec = record(OrderStatus::Placed, None);
        assert!(authorize(&rec, OrderStatus::Cancelled, &actor(0x77, Role::Vendor)).is_err());
        assert!(authorize(&rec, OrderStatus::Cancelled, &actor(0xC0, Role::Customer)).is_err());
    }

    #[test]
    fn nobody_enters_assigned_by_transition() {
        let rec = record(OrderStatus::Placed, None);
        let err = authorize(&rec, OrderStatus::Assigned, &actor(0x01, Role::Admin)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn admin_overrides_role_rules() {
        let rec = record(OrderStatus::OutForDelivery, Some(PARTNER));
        assert!(authorize(&rec, OrderStatus::Cancelled, &actor(0x01, Role::Admin)).is_ok());
        assert!(authorize(&rec, OrderStatus::Delivered, &actor(0x01, Role::Admin)).is_ok());
    }
}
