use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::{AdvanceData, AssignRequest};
use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assignments", post(assign_rider))
        .route("/assignments/:id", get(get_assignment))
        .route("/assignments/:id/status", post(advance_status))
        .route("/assignments/:id/failure-reason", patch(amend_failure_reason))
}

#[derive(Deserialize)]
pub struct AdvanceRequest {
    pub status: AssignmentStatus,
    #[serde(flatten)]
    pub data: AdvanceData,
}

#[derive(Deserialize)]
pub struct FailureReasonRequest {
    pub reason: String,
}

async fn assign_rider(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AssignRequest>,
) -> Result<(StatusCode, Json<DeliveryAssignment>), AppError> {
    let assignment = state.engine.assign_rider(payload).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

async fn get_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryAssignment>, AppError> {
    Ok(Json(state.engine.get(id).await?))
}

async fn advance_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdvanceRequest>,
) -> Result<Json<DeliveryAssignment>, AppError> {
    let assignment = state
        .engine
        .advance_status(id, payload.status, payload.data)
        .await?;
    Ok(Json(assignment))
}

async fn amend_failure_reason(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FailureReasonRequest>,
) -> Result<Json<DeliveryAssignment>, AppError> {
    let assignment = state.engine.amend_failure_reason(id, &payload.reason).await?;
    Ok(Json(assignment))
}
