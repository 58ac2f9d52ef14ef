use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::engine::dispatch::AssignRequest;
use crate::engine::queue::{enqueue_order, AutoDispatchJob};
use crate::engine::scoring::rank_riders;
use crate::error::AppError;
use crate::state::AppState;

const REQUEUE_DELAY: Duration = Duration::from_millis(250);
/// Roughly five minutes of retries at the requeue delay.
const MAX_REQUEUES: u32 = 1_200;

pub async fn run_auto_dispatch(state: Arc<AppState>, mut order_rx: mpsc::Receiver<AutoDispatchJob>) {
    info!("auto-dispatch worker started");

    while let Some(job) = order_rx.recv().await {
        state.metrics.orders_in_queue.dec();

        if let Err(err) = process_job(state.clone(), job.clone()).await {
            error!(order_id = %job.order_id, error = %err, "auto-dispatch failed");
        }
    }

    warn!("auto-dispatch worker stopped: queue channel closed");
}

async fn process_job(state: Arc<AppState>, job: AutoDispatchJob) -> Result<(), AppError> {
    let order = state.engine.get_order(job.order_id).await?;
    if !state.engine.needs_rider(order.id).await? {
        debug!(order_id = %order.id, "order already served; dropping job");
        return Ok(());
    }

    let candidates = state.registry.list_available(order.store_id).await?;

    for candidate in rank_riders(&candidates, order.location.as_ref()) {
        let request = AssignRequest {
            store_id: order.store_id,
            order_id: order.id,
            rider_id: candidate.rider_id,
            zone_id: None,
            manual_fee: None,
        };

        match state.engine.assign_rider(request).await {
            Ok(assignment) => {
                info!(
                    order_id = %order.id,
                    rider_id = %candidate.rider_id,
                    assignment_id = %assignment.id,
                    score = candidate.total,
                    "order auto-dispatched"
                );
                return Ok(());
            }
            Err(AppError::RiderUnavailable(rider_id)) => {
                debug!(order_id = %order.id, rider_id = %rider_id, "candidate taken; trying next");
            }
            Err(AppError::AlreadyAssigned(_) | AppError::OrderAlreadyDelivered(_)) => {
                debug!(order_id = %order.id, "order already served elsewhere");
                return Ok(());
            }
            Err(err) => return Err(err),
        }
    }

    requeue_later(state, job);
    Ok(())
}

fn requeue_later(state: Arc<AppState>, mut job: AutoDispatchJob) {
    job.attempts += 1;
    if job.attempts > MAX_REQUEUES {
        warn!(order_id = %job.order_id, attempts = job.attempts, "no rider found; giving up on auto-dispatch");
        return;
    }

    warn!(order_id = %job.order_id, attempts = job.attempts, "no eligible riders; re-queueing order");
    tokio::spawn(async move {
        sleep(REQUEUE_DELAY).await;
        if let Err(err) = enqueue_order(&state, job).await {
            error!(error = %err, "failed to re-queue order");
        }
    });
}
