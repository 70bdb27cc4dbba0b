use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::event::StatusEvent;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Assigned,
    EnRouteToPickup,
    PickedUp,
    OutForDelivery,
    Delivered,
    Cancelled,
}

/// Every legal `(from, to)` step. Nothing outside this table is accepted.
const TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Placed, OrderStatus::Assigned),
    (OrderStatus::Assigned, OrderStatus::EnRouteToPickup),
    (OrderStatus::EnRouteToPickup, OrderStatus::PickedUp),
    (OrderStatus::PickedUp, OrderStatus::OutForDelivery),
    (OrderStatus::OutForDelivery, OrderStatus::Delivered),
    (OrderStatus::Placed, OrderStatus::Cancelled),
    (OrderStatus::Assigned, OrderStatus::Cancelled),
    (OrderStatus::EnRouteToPickup, OrderStatus::Cancelled),
    (OrderStatus::PickedUp, OrderStatus::Cancelled),
    (OrderStatus::OutForDelivery, OrderStatus::Cancelled),
];

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Placed,
        OrderStatus::Assigned,
        OrderStatus::EnRouteToPickup,
        OrderStatus::PickedUp,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        TRANSITIONS.contains(&(self, next))
    }

    pub fn check_transition(self, next: OrderStatus) -> Result<(), AppError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn is_partner_driven(self) -> bool {
        matches!(
            self,
            OrderStatus::EnRouteToPickup
                | OrderStatus::PickedUp
                | OrderStatus::OutForDelivery
                | OrderStatus::Delivered
        )
    }

    pub fn is_before_pickup(self) -> bool {
        matches!(
            self,
            OrderStatus::Placed | OrderStatus::Assigned | OrderStatus::EnRouteToPickup
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::EnRouteToPickup => "EN_ROUTE_TO_PICKUP",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folds an event log starting from `PLACED` and returns the resulting status.
///
/// Fails on the first event whose `from` does not match the folded state or whose
/// step is not in the transition table.
pub fn replay<'a, I>(events: I) -> Result<OrderStatus, AppError>
where
    I: IntoIterator<Item = &'a StatusEvent>,
{
    events
        .into_iter()
        .try_fold(OrderStatus::Placed, |current, event| {
            if event.from != current {
                return Err(AppError::InvalidTransition {
                    from: current,
                    to: event.to,
                });
            }
            current.check_transition(event.to)?;
            Ok(event.to)
        })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{OrderStatus, replay};
    use crate::error::AppError;
    use crate::models::actor::{Actor, Role};
    use crate::models::event::StatusEvent;

    fn event(seq: u64, from: OrderStatus, to: OrderStatus) -> StatusEvent {
        StatusEvent {
            seq,
            order_id: Uuid::from_u128(1),
            from,
            to,
            actor: Actor::new(Uuid::from_u128(9), Role::Admin),
            at: Utc::now(),
        }
    }

    #[test]
    fn canonical_path_is_legal_step_by_step() {
        let path = [
            OrderStatus::Placed,
            OrderStatus::Assigned,
            OrderStatus::EnRouteToPickup,
            OrderStatus::PickedUp,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn skips_and_backward_steps_are_rejected() {
        assert!(!OrderStatus::Assigned.can_transition_to(OrderStatus::PickedUp));
        assert!(!OrderStatus::EnRouteToPickup.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::PickedUp.can_transition_to(OrderStatus::Assigned));
        assert!(!OrderStatus::Placed.can_transition_to(OrderStatus::Placed));
    }

    #[test]
    fn cancelled_reachable_from_every_pre_delivered_state() {
        for status in OrderStatus::ALL {
            let expected = !status.is_terminal();
            assert_eq!(status.can_transition_to(OrderStatus::Cancelled), expected, "{status}");
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn check_transition_reports_both_ends() {
        let err = OrderStatus::Assigned
            .check_transition(OrderStatus::Delivered)
            .unwrap_err();
        assert_eq!(
            err,
            AppError::InvalidTransition {
                from: OrderStatus::Assigned,
                to: OrderStatus::Delivered,
            }
        );
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&OrderStatus::EnRouteToPickup).unwrap();
        assert_eq!(json, "\"EN_ROUTE_TO_PICKUP\"");
        assert_eq!(OrderStatus::OutForDelivery.to_string(), "OUT_FOR_DELIVERY");
    }

    #[test]
    fn replay_folds_a_valid_log() {
        let log = vec![
            event(1, OrderStatus::Placed, OrderStatus::Assigned),
            event(2, OrderStatus::Assigned, OrderStatus::EnRouteToPickup),
            event(3, OrderStatus::EnRouteToPickup, OrderStatus::Cancelled),
        ];
        assert_eq!(replay(&log).unwrap(), OrderStatus::Cancelled);
        assert_eq!(replay(&Vec::<StatusEvent>::new()).unwrap(), OrderStatus::Placed);
    }

    #[test]
    fn replay_rejects_gaps_in_the_log() {
        let log = vec![
            event(1, OrderStatus::Placed, OrderStatus::Assigned),
            event(2, OrderStatus::PickedUp, OrderStatus::OutForDelivery),
        ];
        assert!(matches!(
            replay(&log),
            Err(AppError::InvalidTransition { .. })
        ));
    }
}
