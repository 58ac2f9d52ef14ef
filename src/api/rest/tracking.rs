use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::engine::TrackingView;
use crate::error::AppError;
use crate::state::AppState;

/// Public, unauthenticated lookup by tracking code.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/track/:code", get(track))
}

async fn track(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<TrackingView>, AppError> {
    Ok(Json(state.engine.track(&code).await?))
}
