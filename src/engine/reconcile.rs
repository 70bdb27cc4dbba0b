use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::event::StatusEvent;
use crate::models::order::Order;
use crate::models::status::OrderStatus;
use crate::state::AppState;
use crate::store::OrderRecord;

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub order: Order,
    pub assignment: Option<Assignment>,
}

impl OrderView {
    pub fn from_record(record: OrderRecord) -> Self {
        let assignment = record.bound_assignment().cloned();
        Self {
            order: record.order,
            assignment,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub version: u64,
    pub events: Vec<StatusEvent>,
}

impl StatusView {
    pub fn from_record(record: OrderRecord) -> Self {
        Self {
            order_id: record.order.id,
            status: record.order.status,
            version: record.order.version,
            events: record.events,
        }
    }
}

/// Half-open `[from, to)` window; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at < to)
    }
}

pub fn get_order(state: &AppState, order_id: Uuid) -> Result<OrderView, AppError> {
    state.orders.snapshot(order_id).map(OrderView::from_record)
}

pub fn get_status(state: &AppState, order_id: Uuid) -> Result<StatusView, AppError> {
    state.orders.snapshot(order_id).map(StatusView::from_record)
}

pub fn get_active(state: &AppState, partner_id: Uuid) -> Vec<OrderView> {
    let mut views: Vec<OrderView> = state
        .orders
        .scan(|record| {
            record
                .active_assignment()
                .is_some_and(|a| a.partner_id == partner_id)
        })
        .into_iter()
        .map(OrderView::from_record)
        .collect();
    views.sort_by_key(|view| (view.order.created_at, view.order.id));
    views
}

pub fn get_history(state: &AppState, partner_id: Uuid, range: TimeRange) -> Vec<OrderView> {
    let mut views: Vec<OrderView> = state
        .orders
        .scan(|record| {
            record.order.status.is_terminal()
                && range.contains(record.order.status_changed_at)
                && record
                    .bound_assignment()
                    .is_some_and(|a| a.partner_id == partner_id)
        })
        .into_iter()
        .map(OrderView::from_record)
        .collect();
    views.sort_by(|a, b| {
        b.order
            .status_changed_at
            .cmp(&a.order.status_changed_at)
            .then_with(|| a.order.id.cmp(&b.order.id))
    });
    views
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::TimeRange;

    #[test]
    fn range_is_half_open() {
        let now = Utc::now();
        let range = TimeRange {
            from: Some(now),
            to: Some(now + Duration::minutes(5)),
        };
        assert!(range.contains(now));
        assert!(!range.contains(now + Duration::minutes(5)));
        assert!(!range.contains(now - Duration::seconds(1)));
        assert!(TimeRange::default().contains(now));
    }
}
