use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::zones::quote;
use crate::error::AppError;
use crate::models::zone::{DeliveryQuote, DeliveryZone, GeoPoint, ZoneInput, ZonePatch};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stores/:store_id/zones", post(create_zone).get(list_zones))
        .route("/stores/:store_id/zones/resolve", post(resolve_zone))
        .route("/zones/:id", patch(update_zone))
        .route("/zones/:id/duplicate", post(duplicate_zone))
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub location: GeoPoint,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub zone: Option<DeliveryZone>,
    pub fee: Option<Decimal>,
    pub quote: Option<DeliveryQuote>,
}

async fn create_zone(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<ZoneInput>,
) -> Result<(StatusCode, Json<DeliveryZone>), AppError> {
    let zone = state.catalog.create(store_id, payload).await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

async fn list_zones(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<Vec<DeliveryZone>>, AppError> {
    Ok(Json(state.catalog.list(store_id).await?))
}

async fn resolve_zone(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    let matched = state.catalog.resolve(store_id, &payload.location).await?;

    let response = match matched {
        Some(matched) => ResolveResponse {
            quote: payload.subtotal.map(|subtotal| quote(&matched.zone, subtotal)),
            fee: Some(matched.fee),
            zone: Some(matched.zone),
        },
        None => ResolveResponse {
            zone: None,
            fee: None,
            quote: None,
        },
    };
    Ok(Json(response))
}

async fn update_zone(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ZonePatch>,
) -> Result<Json<DeliveryZone>, AppError> {
    Ok(Json(state.catalog.update(id, payload).await?))
}

async fn duplicate_zone(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<DeliveryZone>), AppError> {
    let copy = state.catalog.duplicate_zone(id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}
