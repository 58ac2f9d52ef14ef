use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::models::notification::NotificationPayload;
use crate::notify::dispatcher::NotificationDispatcher;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub payload: NotificationPayload,
    pub prefer_whatsapp: bool,
}

/// Producer side of the notification pipeline.
///
/// A single worker drains the channel, so jobs are attempted in the order
/// they were enqueued. Enqueueing never waits.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<NotificationJob>,
    metrics: Metrics,
}

impl NotificationQueue {
    pub fn new(capacity: usize, metrics: Metrics) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, metrics }, rx)
    }

    pub fn enqueue(&self, job: NotificationJob) {
        let order_id = job.payload.order_id;
        let status = job.payload.status;

        match self.tx.try_send(job) {
            Ok(()) => debug!(order_id = %order_id, status = %status, "notification queued"),
            Err(TrySendError::Full(_)) => {
                warn!(order_id = %order_id, status = %status, "notification queue full; dropping");
                self.metrics
                    .notifications_total
                    .with_label_values(&["none", "dropped"])
                    .inc();
            }
            Err(TrySendError::Closed(_)) => {
                warn!(order_id = %order_id, status = %status, "notification worker gone; dropping");
            }
        }
    }
}

pub async fn run_notification_worker(
    dispatcher: Arc<NotificationDispatcher>,
    mut rx: mpsc::Receiver<NotificationJob>,
) {
    info!("notification worker started");

    while let Some(job) = rx.recv().await {
        let outcome = dispatcher.notify(&job.payload, job.prefer_whatsapp).await;
        debug!(
            order_id = %job.payload.order_id,
            status = %job.payload.status,
            channel = ?outcome.channel,
            sent = outcome.sent,
            "notification processed"
        );
    }

    warn!("notification worker stopped: queue channel closed");
}
