use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::store::OrderRecord;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)?
            .parse::<Uuid>()
            .map_err(|err| AppError::Unauthenticated(format!("{ACTOR_ID_HEADER}: {err}")))?;
        let role = header(parts, ACTOR_ROLE_HEADER)?
            .parse::<Role>()
            .map_err(AppError::Unauthenticated)?;

        Ok(Actor::new(id, role))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::Unauthenticated(format!("missing {name} header")))?
        .to_str()
        .map_err(|err| AppError::Unauthenticated(format!("{name}: {err}")))
}

pub fn ensure_can_view(actor: &Actor, record: &OrderRecord) -> Result<(), AppError> {
    let order = &record.order;
    let allowed = actor.is_admin()
        || actor.is_vendor_of(order.shop_id)
        || actor.is_customer(order.customer_id)
        || record
            .bound_assignment()
            .is_some_and(|a| actor.is_partner(a.partner_id));

    if allowed {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "{} {} may not view order {}",
            actor.role, actor.id, order.id
        )))
    }
}

pub fn ensure_admin_or_partner(actor: &Actor, partner_id: Uuid) -> Result<(), AppError> {
    if actor.is_admin() || actor.is_partner(partner_id) {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!(
            "{} {} may not act for partner {partner_id}",
            actor.role, actor.id
        )))
    }
}

pub fn ensure_admin(actor: &Actor) -> Result<(), AppError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Unauthorized("admin only".to_string()))
    }
}
