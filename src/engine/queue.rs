use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// An order waiting for the auto-dispatch worker to find it a rider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoDispatchJob {
    pub store_id: Uuid,
    pub order_id: Uuid,
    pub attempts: u32,
}

impl AutoDispatchJob {
    pub fn new(store_id: Uuid, order_id: Uuid) -> Self {
        Self {
            store_id,
            order_id,
            attempts: 0,
        }
    }
}

pub async fn enqueue_order(state: &AppState, job: AutoDispatchJob) -> Result<(), AppError> {
    state
        .order_tx
        .send(job)
        .await
        .map_err(|err| AppError::Internal(format!("order queue send failed: {err}")))?;

    state.metrics.orders_in_queue.inc();
    Ok(())
}
