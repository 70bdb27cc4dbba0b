use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::trip_fee_cents;
use crate::models::actor::Actor;
use crate::models::assignment::Assignment;
use crate::models::event::StatusEvent;
use crate::models::order::Order;
use crate::models::partner::DeliveryPartner;
use crate::models::status::OrderStatus;
use crate::notify::{Notification, NotificationEvent};
use crate::state::AppState;
use crate::store::{OrderRecord, Write};

/// Binds an order to a delivery partner and moves it to `ASSIGNED`.
///
/// Without `partner_id` the configured selection policy picks one. Asking again
/// for the partner the order is already bound to returns the existing assignment.
pub fn assign(
    state: &AppState,
    order_id: Uuid,
    partner_id: Option<Uuid>,
    actor: &Actor,
) -> Result<Assignment, AppError> {
    let start = Instant::now();
    let result = try_assign(state, order_id, partner_id, actor);

    let outcome = match &result {
        Ok(_) => "success",
        Err(AppError::OrderAlreadyAssigned { .. }) => "already_assigned",
        Err(AppError::NoPartnerAvailable) => "no_partner",
        Err(_) => "error",
    };
    state
        .metrics
        .assignment_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .assignments_total
        .with_label_values(&[outcome])
        .inc();

    if let Err(err) = &result {
        state.metrics.rejections_total.with_label_values(&[err.code()]).inc();
        warn!(%order_id, actor_id = %actor.id, error = %err, "assignment rejected");
    }

    result
}

fn try_assign(
    state: &AppState,
    order_id: Uuid,
    requested: Option<Uuid>,
    actor: &Actor,
) -> Result<Assignment, AppError> {
    let snapshot = state.orders.snapshot(order_id)?;
    authorize_assign(&snapshot.order, actor)?;

    if let Some(existing) = check_assignable(&snapshot, requested)? {
        return Ok(existing);
    }

    let partner_id = match requested {
        Some(id) => id,
        None => match select_partner(state, &snapshot.order) {
            Ok(id) => id,
            Err(err) => {
                // a concurrent assign of this same order may have taken the last slot
                check_assignable(&state.orders.snapshot(order_id)?, None)?;
                return Err(err);
            }
        },
    };
    let fee_cents = trip_fee_cents(
        &snapshot.order.pickup,
        &snapshot.order.dropoff,
        state.config.base_fee_cents,
        state.config.per_km_fee_cents,
    );

    // Preconditions are re-checked under the order lock and the partner slot is
    // reserved inside it, so a failed commit never leaves a reservation behind.
    let (write, record) = state.orders.commit_or_keep(order_id, |record| {
        if let Some(existing) = check_assignable(record, requested)? {
            return Ok(Write::Unchanged((existing, None)));
        }
        reserve_slot(state, partner_id)?;

        let now = Utc::now();
        let assignment = Assignment {
            id: Uuid::new_v4(),
            order_id,
            partner_id,
            fee_cents,
            created_at: now,
            released_at: None,
            rating: None,
        };
        record.assignments.push(assignment.clone());

        let status_event = if record.order.status == OrderStatus::Placed {
            let event = StatusEvent {
                seq: record.next_event_seq(),
                order_id,
                from: OrderStatus::Placed,
                to: OrderStatus::Assigned,
                actor: *actor,
                at: now,
            };
            record.order.status = OrderStatus::Assigned;
            record.order.status_changed_at = now;
            record.events.push(event.clone());
            Some(event)
        } else {
            None
        };

        Ok(Write::Changed((assignment, status_event)))
    })?;

    let (assignment, status_event) = match write {
        Write::Unchanged((existing, _)) => return Ok(existing),
        Write::Changed(out) => out,
    };

    info!(
        %order_id,
        partner_id = %partner_id,
        fee_cents,
        policy = state.selection.name(),
        "order assigned"
    );

    if let Some(event) = status_event {
        state.metrics.transitions_total.with_label_values(&[event.to.as_str()]).inc();
        state
            .notifier
            .publish(Notification::for_record(&record, NotificationEvent::StatusChanged(event)));
    }
    state
        .notifier
        .publish(Notification::for_record(&record, NotificationEvent::Assigned(assignment.clone())));

    Ok(assignment)
}

fn authorize_assign(order: &Order, actor: &Actor) -> Result<(), AppError> {
    if actor.is_admin() || actor.is_vendor_of(order.shop_id) {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "{} {} may not assign order {}",
            actor.role, actor.id, order.id
        )))
    }
}

/// `Ok(Some(_))` is the idempotent case: already bound to the requested partner.
fn check_assignable(
    record: &OrderRecord,
    requested: Option<Uuid>,
) -> Result<Option<Assignment>, AppError> {
    let status = record.order.status;
    if status.is_terminal() {
        return Err(AppError::InvalidTransition {
            from: status,
            to: OrderStatus::Assigned,
        });
    }

    match record.bound_assignment() {
        Some(existing) if status == OrderStatus::Assigned && requested == Some(existing.partner_id) => {
            Ok(Some(existing.clone()))
        }
        Some(existing) => Err(AppError::OrderAlreadyAssigned {
            order_id: record.order.id,
            partner_id: existing.partner_id,
        }),
        None if matches!(status, OrderStatus::Placed | OrderStatus::Assigned) => Ok(None),
        None => Err(AppError::InvalidTransition {
            from: status,
            to: OrderStatus::Assigned,
        }),
    }
}

pub fn eligible_partners(state: &AppState) -> Vec<DeliveryPartner> {
    let mut candidates: Vec<DeliveryPartner> = state
        .partners
        .iter()
        .filter(|entry| entry.value().is_eligible())
        .map(|entry| entry.value().clone())
        .collect();
    candidates.sort_by_key(|partner| partner.id);
    candidates
}

fn select_partner(state: &AppState, order: &Order) -> Result<Uuid, AppError> {
    let candidates = eligible_partners(state);
    if candidates.is_empty() {
        warn!(order_id = %order.id, "no eligible partners online");
        return Err(AppError::NoPartnerAvailable);
    }

    state
        .selection
        .select(order, &candidates)
        .ok_or(AppError::NoPartnerAvailable)
}

fn reserve_slot(state: &AppState, partner_id: Uuid) -> Result<(), AppError> {
    let Some(mut partner) = state.partners.get_mut(&partner_id) else {
        warn!(%partner_id, "requested partner is not registered");
        return Err(AppError::NoPartnerAvailable);
    };

    if !partner.is_eligible() {
        warn!(
            %partner_id,
            online = partner.online,
            verified = partner.verified,
            active_orders = partner.active_orders,
            capacity = partner.capacity,
            "requested partner cannot take the order"
        );
        return Err(AppError::NoPartnerAvailable);
    }

    partner.active_orders += 1;
    partner.updated_at = Utc::now();
    state
        .metrics
        .partner_utilization
        .with_label_values(&[&partner_id.to_string()])
        .set(partner.utilization());
    Ok(())
}

pub(crate) fn release_slot(state: &AppState, partner_id: Uuid, delivered: bool) {
    if let Some(mut partner) = state.partners.get_mut(&partner_id) {
        partner.active_orders = partner.active_orders.saturating_sub(1);
        if delivered {
            partner.delivery_count += 1;
        }
        partner.updated_at = Utc::now();
        state
            .metrics
            .partner_utilization
            .with_label_values(&[&partner_id.to_string()])
            .set(partner.utilization());
    }
}

/// Unbinds the partner from an order that is still `ASSIGNED`.
///
/// The order keeps its status and waits for the next `assign`; no status event is
/// written since the lifecycle did not move.
pub fn release(state: &AppState, order_id: Uuid, actor: &Actor) -> Result<Assignment, AppError> {
    let result = state.orders.commit(order_id, None, |record| {
        let status = record.order.status;
        let bound = record
            .bound_assignment()
            .ok_or(AppError::NoActiveAssignment(order_id))?;

        if !(actor.is_admin() || actor.is_partner(bound.partner_id)) {
            return Err(AppError::Unauthorized(format!(
                "{} {} may not release order {order_id}",
                actor.role, actor.id
            )));
        }
        if status != OrderStatus::Assigned {
            return Err(AppError::Conflict(format!(
                "assignments can only be released while ASSIGNED, order is {status}"
            )));
        }

        let bound = record
            .bound_assignment_mut()
            .ok_or(AppError::NoActiveAssignment(order_id))?;
        bound.released_at = Some(Utc::now());
        Ok(bound.clone())
    });

    let (released, record) = match result {
        Ok(ok) => ok,
        Err(err) => {
            state.metrics.rejections_total.with_label_values(&[err.code()]).inc();
            warn!(%order_id, actor_id = %actor.id, error = %err, "release rejected");
            return Err(err);
        }
    };

    release_slot(state, released.partner_id, false);
    info!(%order_id, partner_id = %released.partner_id, "assignment released");

    state
        .notifier
        .publish(Notification::for_record(&record, NotificationEvent::Released(released.clone())));

    Ok(released)
}

pub fn rate_delivery(
    state: &AppState,
    order_id: Uuid,
    stars: u8,
    actor: &Actor,
) -> Result<DeliveryPartner, AppError> {
    if !(1..=5).contains(&stars) {
        return Err(AppError::BadRequest("stars must be between 1 and 5".to_string()));
    }

    let (partner_id, _) = state.orders.commit(order_id, None, |record| {
        if !actor.is_customer(record.order.customer_id) {
            return Err(AppError::Unauthorized(
                "only the ordering customer may rate a delivery".to_string(),
            ));
        }
        if record.order.status != OrderStatus::Delivered {
            return Err(AppError::Conflict(format!(
                "only DELIVERED orders can be rated, order is {}",
                record.order.status
            )));
        }

        let bound = record
            .bound_assignment_mut()
            .ok_or(AppError::NoActiveAssignment(order_id))?;
        if bound.rating.is_some() {
            return Err(AppError::Conflict(format!("order {order_id} already rated")));
        }
        bound.rating = Some(stars);
        Ok(bound.partner_id)
    })?;

    let mut partner = state
        .partners
        .get_mut(&partner_id)
        .ok_or_else(|| AppError::NotFound(format!("partner {partner_id} not found")))?;
    partner.record_rating(stars);

    info!(%order_id, %partner_id, stars, rating = partner.rating, "delivery rated");
    Ok(partner.clone())
}
