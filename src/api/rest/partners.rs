use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{ensure_admin, ensure_admin_or_partner};
use crate::engine::reconcile::{OrderView, TimeRange, get_active, get_history};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::actor::{Actor, Role};
use crate::models::partner::DeliveryPartner;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/partners", post(register_partner).get(list_partners))
        .route("/partners/:id/online", patch(set_online))
        .route("/partners/:id/verify", patch(set_verified))
        .route("/partners/:id/location", patch(update_location))
        .route("/partners/:id/active", get(active_orders))
        .route("/partners/:id/history", get(order_history))
}

#[derive(Deserialize)]
pub struct RegisterPartnerRequest {
    pub name: String,
    pub location: GeoPoint,
    pub capacity: u8,
}

#[derive(Deserialize)]
pub struct OnlineRequest {
    pub online: bool,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub verified: bool,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

async fn register_partner(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<RegisterPartnerRequest>,
) -> Result<Json<DeliveryPartner>, AppError> {
    let id = match actor.role {
        Role::Partner => actor.id,
        Role::Admin => Uuid::new_v4(),
        _ => {
            return Err(AppError::Unauthorized(
                "only partners or admins register partners".to_string(),
            ));
        }
    };

    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if payload.capacity == 0 {
        return Err(AppError::BadRequest("capacity must be > 0".to_string()));
    }
    if !payload.location.is_valid() {
        return Err(AppError::BadRequest("coordinates out of range".to_string()));
    }

    let partner = DeliveryPartner {
        id,
        name: payload.name,
        location: payload.location,
        capacity: payload.capacity,
        active_orders: 0,
        online: false,
        verified: false,
        rating: 0.0,
        ratings_count: 0,
        delivery_count: 0,
        updated_at: Utc::now(),
    };

    match state.partners.entry(id) {
        dashmap::mapref::entry::Entry::Occupied(_) => {
            Err(AppError::Conflict(format!("partner {id} already registered")))
        }
        dashmap::mapref::entry::Entry::Vacant(slot) => {
            slot.insert(partner.clone());
            tracing::info!(partner_id = %id, "partner registered");
            Ok(Json(partner))
        }
    }
}

async fn list_partners(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<DeliveryPartner>>, AppError> {
    ensure_admin(&actor)?;
    let mut partners: Vec<DeliveryPartner> = state
        .partners
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    partners.sort_by_key(|partner| partner.id);
    Ok(Json(partners))
}

async fn set_online(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<OnlineRequest>,
) -> Result<Json<DeliveryPartner>, AppError> {
    ensure_admin_or_partner(&actor, id)?;
    update_partner(&state, id, |partner| partner.online = payload.online)
}

async fn set_verified(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<DeliveryPartner>, AppError> {
    ensure_admin(&actor)?;
    update_partner(&state, id, |partner| partner.verified = payload.verified)
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<DeliveryPartner>, AppError> {
    ensure_admin_or_partner(&actor, id)?;
    if !payload.location.is_valid() {
        return Err(AppError::BadRequest("coordinates out of range".to_string()));
    }
    update_partner(&state, id, |partner| partner.location = payload.location)
}

fn update_partner<F>(state: &AppState, id: Uuid, apply: F) -> Result<Json<DeliveryPartner>, AppError>
where
    F: FnOnce(&mut DeliveryPartner),
{
    let mut partner = state
        .partners
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("partner {id} not found")))?;

    apply(partner.value_mut());
    partner.updated_at = Utc::now();
    tracing::debug!(partner_id = %id, online = partner.online, verified = partner.verified, "partner updated");

    Ok(Json(partner.clone()))
}

async fn active_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<Vec<OrderView>>, AppError> {
    ensure_admin_or_partner(&actor, id)?;
    Ok(Json(get_active(&state, id)))
}

async fn order_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Query(range): Query<TimeRange>,
) -> Result<Json<Vec<OrderView>>, AppError> {
    ensure_admin_or_partner(&actor, id)?;
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if from > to {
            return Err(AppError::BadRequest("history range ends before it starts".to_string()));
        }
    }
    Ok(Json(get_history(&state, id, range)))
}
