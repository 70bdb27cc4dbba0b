use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{ensure_admin, ensure_can_view};
use crate::engine::assignment::{assign, rate_delivery, release};
use crate::engine::reconcile::{OrderView, StatusView};
use crate::engine::transition::transition;
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::actor::{Actor, Role};
use crate::models::assignment::Assignment;
use crate::models::event::StatusEvent;
use crate::models::order::{Order, OrderItem};
use crate::models::partner::DeliveryPartner;
use crate::models::status::OrderStatus;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", get(get_status))
        .route("/orders/:id/assign", post(assign_order))
        .route("/orders/:id/release", post(release_order))
        .route("/orders/:id/transition", post(transition_order))
        .route("/orders/:id/rating", post(rate_order))
        .route("/assignments", get(list_assignments))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub shop_id: Uuid,
    pub address_id: Uuid,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub items: Vec<OrderItem>,
}

#[derive(Deserialize, Default)]
pub struct AssignRequest {
    pub partner_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub to: OrderStatus,
    pub expected_version: Option<u64>,
}

#[derive(Deserialize)]
pub struct RatingRequest {
    pub stars: u8,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if actor.role != Role::Customer {
        return Err(AppError::Unauthorized("only customers place orders".to_string()));
    }
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("order needs at least one item".to_string()));
    }
    if payload.items.iter().any(|item| item.quantity == 0) {
        return Err(AppError::BadRequest("item quantity must be > 0".to_string()));
    }
    if !payload.pickup.is_valid() || !payload.dropoff.is_valid() {
        return Err(AppError::BadRequest("coordinates out of range".to_string()));
    }

    let order = Order::place(
        payload.shop_id,
        actor.id,
        payload.address_id,
        payload.pickup,
        payload.dropoff,
        payload.items,
    );
    state.orders.insert(order.clone())?;
    tracing::info!(order_id = %order.id, shop_id = %order.shop_id, total_cents = order.total_cents, "order placed");

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<OrderView>, AppError> {
    let record = state.orders.snapshot(id)?;
    ensure_can_view(&actor, &record)?;
    Ok(Json(OrderView::from_record(record)))
}

async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<StatusView>, AppError> {
    let record = state.orders.snapshot(id)?;
    ensure_can_view(&actor, &record)?;
    Ok(Json(StatusView::from_record(record)))
}

async fn assign_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    payload: Option<Json<AssignRequest>>,
) -> Result<Json<Assignment>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    assign(&state, id, payload.partner_id, &actor).map(Json)
}

async fn release_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<Assignment>, AppError> {
    release(&state, id, &actor).map(Json)
}

async fn transition_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<StatusEvent>, AppError> {
    transition(&state, id, payload.to, &actor, payload.expected_version).map(Json)
}

async fn rate_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<RatingRequest>,
) -> Result<Json<DeliveryPartner>, AppError> {
    rate_delivery(&state, id, payload.stars, &actor).map(Json)
}

async fn list_assignments(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Assignment>>, AppError> {
    ensure_admin(&actor)?;
    Ok(Json(state.orders.all_assignments()))
}
