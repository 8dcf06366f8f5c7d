//! Order handlers: checkout and ledger lookups.
//!
//! ## Endpoints
//! ```text
//! POST /api/v1/orders                          checkout → 201 Order
//! GET  /api/v1/orders/{id}                     one order (store staff only)
//! GET  /api/v1/orders?reference=ORD-...        one order by reference
//! GET  /api/v1/cashiers/me/orders?limit=       caller's orders, newest first
//! GET  /api/v1/stores/{storeId}/orders?from=&to=&limit=
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use tally_core::validation::{parse_cart_lines, validate_uuid};
use tally_core::{CartLineInput, CheckoutError, Order, Principal};
use tally_db::CheckoutRequest;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Default page size for ledger listings.
pub const DEFAULT_LIMIT: u32 = 50;
/// Largest page a caller may ask for.
pub const MAX_LIMIT: u32 = 500;

/// Body of `POST /api/v1/orders`.
///
/// Missing fields become empty values so they fail validation with a
/// precise code instead of a generic body error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    #[serde(default)]
    pub store_id: String,
    #[serde(default)]
    pub items: Vec<CartLineInput>,
}

#[derive(Debug, Deserialize)]
pub struct ReferenceQuery {
    pub reference: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

/// `from` defaults to 24 hours before `to`; `to` defaults to now.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// `POST /api/v1/orders`
///
/// The checkout runs under a deadline that stops short of `COMMIT`. A
/// `CHECKOUT_TIMEOUT` therefore always means nothing was written and the
/// cart can be resubmitted.
pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    payload: Result<Json<CreateOrderBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(body) = payload?;
    validate_uuid("storeId", &body.store_id).map_err(CheckoutError::from)?;
    let lines = parse_cart_lines(body.items)?;

    let request = CheckoutRequest {
        store_id: body.store_id,
        cashier: principal,
        lines,
    };

    let order = state
        .db
        .checkout()
        .create_order_within(request, state.checkout_timeout)
        .await
        .inspect_err(|e| {
            if let CheckoutError::Timeout { timeout_ms } = e {
                warn!(timeout_ms, "Checkout timed out before commit, nothing written");
            }
        })?;

    info!(order_id = %order.id, reference = %order.reference, "Order created");
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/v1/orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    validate_uuid("id", &id).map_err(CheckoutError::from)?;

    let order = state
        .db
        .orders()
        .get_by_id(&id)
        .await?
        .ok_or(ApiError::OrderNotFound(id))?;

    visible_to(&state, &principal, order).await.map(Json)
}

/// `GET /api/v1/orders?reference=`
pub async fn find_order(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    query: Result<Query<ReferenceQuery>, QueryRejection>,
) -> Result<Json<Order>, ApiError> {
    let Query(query) = query?;
    let reference = query.reference.trim().to_string();

    let order = state
        .db
        .orders()
        .get_by_reference(&reference)
        .await?
        .ok_or(ApiError::OrderNotFound(reference))?;

    visible_to(&state, &principal, order).await.map(Json)
}

/// `GET /api/v1/cashiers/me/orders`
pub async fn list_my_orders(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let Query(query) = query?;

    let orders = state
        .db
        .orders()
        .list_by_cashier(&principal.user_id, clamp_limit(query.limit))
        .await?;

    Ok(Json(orders))
}

/// `GET /api/v1/stores/{storeId}/orders`
pub async fn list_store_orders(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(store_id): Path<String>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let Query(query) = query?;
    validate_uuid("storeId", &store_id).map_err(CheckoutError::from)?;

    let to = query.to.unwrap_or_else(Utc::now);
    let from = query.from.unwrap_or(to - Duration::hours(24));
    if from >= to {
        return Err(ApiError::malformed("'from' must be earlier than 'to'"));
    }

    state.db.checkout().authorize_reader(&store_id, &principal).await?;

    let orders = state
        .db
        .orders()
        .list_by_store_between(&store_id, from, to, clamp_limit(query.limit))
        .await?;

    Ok(Json(orders))
}

/// Orders are visible to the staff of the store they were rung up in.
async fn visible_to(state: &AppState, principal: &Principal, order: Order) -> Result<Order, ApiError> {
    state
        .db
        .checkout()
        .authorize_reader(&order.store, principal)
        .await?;
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIMIT);
    }

    #[test]
    fn test_body_defaults_missing_fields() {
        let body: CreateOrderBody = serde_json::from_str("{}").unwrap();
        assert!(body.store_id.is_empty());
        assert!(body.items.is_empty());

        let body: CreateOrderBody = serde_json::from_str(
            r#"{"storeId":"s","items":[{"product":"p","quantity":2},{"product":"f","amount":"1000"}]}"#,
        )
        .unwrap();
        assert_eq!(body.items.len(), 2);
        assert!(body.items[1].amount.is_some());
    }
}
