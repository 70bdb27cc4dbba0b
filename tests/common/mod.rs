#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use delivery_core::config::Config;
use delivery_core::geo::GeoPoint;
use delivery_core::models::actor::{Actor, Role};
use delivery_core::models::order::{Order, OrderItem};
use delivery_core::models::partner::DeliveryPartner;
use delivery_core::notify::Notification;
use delivery_core::state::AppState;

pub const SHOP: Uuid = Uuid::from_u128(0x5A0);
pub const CUSTOMER: Uuid = Uuid::from_u128(0xC00);
pub const ADMIN: Uuid = Uuid::from_u128(0xAD0);

pub fn shared_state() -> (Arc<AppState>, mpsc::Receiver<Notification>) {
    let (state, rx) = AppState::new(Config::default());
    (Arc::new(state), rx)
}

pub fn admin() -> Actor {
    Actor::new(ADMIN, Role::Admin)
}

pub fn vendor() -> Actor {
    Actor::new(SHOP, Role::Vendor)
}

pub fn customer() -> Actor {
    Actor::new(CUSTOMER, Role::Customer)
}

pub fn partner_actor(id: Uuid) -> Actor {
    Actor::new(id, Role::Partner)
}

pub fn add_partner(state: &AppState, seed: u128, capacity: u8) -> Uuid {
    let id = Uuid::from_u128(seed);
    state.partners.insert(
        id,
        DeliveryPartner {
            id,
            name: format!("rider-{seed}"),
            location: GeoPoint {
                lat: 12.9716,
                lng: 77.5946,
            },
            capacity,
            active_orders: 0,
            online: true,
            verified: true,
            rating: 0.0,
            ratings_count: 0,
            delivery_count: 0,
            updated_at: Utc::now(),
        },
    );
    id
}

pub fn place_order(state: &AppState) -> Uuid {
    let order = Order::place(
        SHOP,
        CUSTOMER,
        Uuid::new_v4(),
        GeoPoint {
            lat: 12.9720,
            lng: 77.5950,
        },
        GeoPoint {
            lat: 12.9352,
            lng: 77.6245,
        },
        vec![OrderItem {
            product_id: Uuid::new_v4(),
            quantity: 1,
            unit_price_cents: 1299,
        }],
    );
    let id = order.id;
    state.orders.insert(order).unwrap();
    id
}

pub fn request(method: &str, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder
            .header("x-actor-id", actor.id.to_string())
            .header("x-actor-role", actor.role.to_string());
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
