use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::RiderInput;
use crate::error::AppError;
use crate::models::rider::Rider;
use crate::models::zone::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stores/:store_id/riders", post(create_rider).get(list_riders))
        .route("/stores/:store_id/riders/available", get(list_available))
        .route("/riders/:id/presence", patch(update_presence))
        .route("/riders/:id/active", patch(update_active))
        .route("/riders/:id/rating", post(rate_rider))
}

#[derive(Deserialize)]
pub struct PresenceRequest {
    pub store_id: Uuid,
    pub online: bool,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct ActiveRequest {
    pub store_id: Uuid,
    pub active: bool,
}

#[derive(Deserialize)]
pub struct RatingRequest {
    pub store_id: Uuid,
    pub score: f64,
}

async fn create_rider(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<RiderInput>,
) -> Result<(StatusCode, Json<Rider>), AppError> {
    let rider = state.registry.create(store_id, payload).await?;
    Ok((StatusCode::CREATED, Json(rider)))
}

async fn list_riders(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<Vec<Rider>>, AppError> {
    Ok(Json(state.registry.list(store_id).await?))
}

async fn list_available(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<Vec<Rider>>, AppError> {
    Ok(Json(state.registry.list_available(store_id).await?))
}

async fn update_presence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PresenceRequest>,
) -> Result<Json<Rider>, AppError> {
    let rider = state
        .registry
        .set_online(payload.store_id, id, payload.online, payload.location)
        .await?;
    Ok(Json(rider))
}

async fn update_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActiveRequest>,
) -> Result<Json<Rider>, AppError> {
    let rider = state
        .registry
        .set_active(payload.store_id, id, payload.active)
        .await?;
    Ok(Json(rider))
}

async fn rate_rider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatingRequest>,
) -> Result<Json<Rider>, AppError> {
    let rider = state.registry.rate(payload.store_id, id, payload.score).await?;
    Ok(Json(rider))
}
