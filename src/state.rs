use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::config::Config;
use crate::engine::queue::AutoDispatchJob;
use crate::engine::{DispatchEngine, RiderRegistry, ZoneCatalog};
use crate::models::assignment::DeliveryAssignment;
use crate::notify::{MessageSender, NotificationDispatcher, NotificationJob, NotificationQueue};
use crate::observability::metrics::Metrics;
use crate::store::Stores;

pub struct AppState {
    pub stores: Stores,
    pub catalog: Arc<ZoneCatalog>,
    pub registry: Arc<RiderRegistry>,
    pub engine: Arc<DispatchEngine>,
    pub notifier: Arc<NotificationDispatcher>,
    pub order_tx: mpsc::Sender<AutoDispatchJob>,
    pub assignment_events_tx: broadcast::Sender<DeliveryAssignment>,
    pub metrics: Metrics,
}

/// Receiving ends for the background workers.
pub struct WorkerQueues {
    pub order_rx: mpsc::Receiver<AutoDispatchJob>,
    pub notification_rx: mpsc::Receiver<NotificationJob>,
}

impl AppState {
    pub fn new(config: &Config, stores: Stores, sender: Arc<dyn MessageSender>) -> (Self, WorkerQueues) {
        let metrics = Metrics::new();
        let (order_tx, order_rx) = mpsc::channel(config.order_queue_size.max(1));
        let (assignment_events_tx, _) = broadcast::channel(config.event_buffer_size.max(1));
        let (notifications, notification_rx) =
            NotificationQueue::new(config.notification_queue_size, metrics.clone());

        let catalog = Arc::new(ZoneCatalog::new(stores.zones.clone()));
        let registry = Arc::new(RiderRegistry::new(stores.riders.clone()));
        let notifier = Arc::new(NotificationDispatcher::new(
            sender,
            stores.notifications.clone(),
            metrics.clone(),
        ));
        let engine = Arc::new(DispatchEngine::new(
            stores.clone(),
            catalog.clone(),
            registry.clone(),
            notifications,
            assignment_events_tx.clone(),
            metrics.clone(),
            config.policy.clone(),
        ));

        (
            Self {
                stores,
                catalog,
                registry,
                engine,
                notifier,
                order_tx,
                assignment_events_tx,
                metrics,
            },
            WorkerQueues {
                order_rx,
                notification_rx,
            },
        )
    }
}
