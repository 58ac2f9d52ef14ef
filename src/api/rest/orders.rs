use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::queue::{enqueue_order, AutoDispatchJob};
use crate::engine::OrderInput;
use crate::error::AppError;
use crate::models::assignment::DeliveryAssignment;
use crate::models::notification::NotificationEvent;
use crate::models::order::DeliveryOrder;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/notifications", get(list_notifications))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    #[serde(flatten)]
    pub order: OrderInput,
    /// Hand the order to the auto-dispatch worker once stored.
    #[serde(default)]
    pub auto_dispatch: bool,
}

#[derive(Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: DeliveryOrder,
    pub assignments: Vec<DeliveryAssignment>,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<DeliveryOrder>), AppError> {
    let order = state.engine.register_order(payload.order).await?;

    if payload.auto_dispatch {
        enqueue_order(&state, AutoDispatchJob::new(order.store_id, order.id)).await?;
    }

    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderView>, AppError> {
    let order = state.engine.get_order(id).await?;
    let assignments = state.engine.assignments_for_order(id).await?;
    Ok(Json(OrderView { order, assignments }))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<NotificationEvent>>, AppError> {
    state.engine.get_order(id).await?;
    let events = state.stores.notifications.events_for_order(id).await?;
    Ok(Json(events))
}
