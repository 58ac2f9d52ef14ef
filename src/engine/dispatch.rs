use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DispatchPolicy;
use crate::engine::riders::RiderRegistry;
use crate::engine::tracking;
use crate::engine::zones::{quote, ZoneCatalog};
use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
use crate::models::notification::{NotificationPayload, Recipient};
use crate::models::order::DeliveryOrder;
use crate::models::rider::Rider;
use crate::models::zone::GeoPoint;
use crate::notify::{NotificationJob, NotificationQueue};
use crate::observability::metrics::Metrics;
use crate::store::Stores;

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub store_id: Uuid,
    pub order_id: Uuid,
    pub rider_id: Uuid,
    /// Manual zone pick; skips coordinate matching and works for inactive zones.
    #[serde(default)]
    pub zone_id: Option<Uuid>,
    /// Fee to charge when no zone applies.
    #[serde(default)]
    pub manual_fee: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvanceData {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderInput {
    pub store_id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    pub address: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    pub subtotal: Decimal,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub prefer_whatsapp: bool,
}

/// Public view behind a tracking code. Carries no customer data.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingView {
    pub tracking_code: String,
    pub status: AssignmentStatus,
    pub estimated_minutes: Option<u32>,
    pub rider_first_name: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// What an assignment is charged, fixed at creation time.
struct Pricing {
    zone_id: Option<Uuid>,
    fee: Decimal,
    estimated_minutes: Option<u32>,
}

pub struct DispatchEngine {
    stores: Stores,
    /// One lock per live assignment. A transition holds it from the read
    /// until its notifications are queued, so queue order is commit order
    /// however long the store takes to answer.
    transition_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    catalog: Arc<ZoneCatalog>,
    registry: Arc<RiderRegistry>,
    notifications: NotificationQueue,
    events: broadcast::Sender<DeliveryAssignment>,
    metrics: Metrics,
    policy: DispatchPolicy,
}

impl DispatchEngine {
    pub fn new(
        stores: Stores,
        catalog: Arc<ZoneCatalog>,
        registry: Arc<RiderRegistry>,
        notifications: NotificationQueue,
        events: broadcast::Sender<DeliveryAssignment>,
        metrics: Metrics,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            stores,
            transition_locks: DashMap::new(),
            catalog,
            registry,
            notifications,
            events,
            metrics,
            policy,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub async fn register_order(&self, input: OrderInput) -> Result<DeliveryOrder, AppError> {
        if input.order_number.trim().is_empty() {
            return Err(AppError::BadRequest("order_number cannot be empty".to_string()));
        }
        if input.address.trim().is_empty() {
            return Err(AppError::BadRequest("address cannot be empty".to_string()));
        }
        if input.subtotal < Decimal::ZERO {
            return Err(AppError::BadRequest("subtotal must not be negative".to_string()));
        }

        let order = DeliveryOrder {
            id: Uuid::new_v4(),
            store_id: input.store_id,
            order_number: input.order_number.trim().to_string(),
            customer_name: input.customer_name.trim().to_string(),
            customer_phone: input
                .customer_phone
                .map(|phone| phone.trim().to_string())
                .filter(|phone| !phone.is_empty()),
            address: input.address.trim().to_string(),
            location: input.location,
            subtotal: input.subtotal,
            country: input
                .country
                .unwrap_or_else(|| self.policy.default_country.clone()),
            prefer_whatsapp: input.prefer_whatsapp,
            created_at: Utc::now(),
        };

        self.stores.orders.insert_order(order.clone()).await?;
        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<DeliveryOrder, AppError> {
        self.stores
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
    }

    pub async fn get(&self, assignment_id: Uuid) -> Result<DeliveryAssignment, AppError> {
        self.stores
            .assignments
            .get_assignment(assignment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id} not found")))
    }

    pub async fn assignments_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<DeliveryAssignment>, AppError> {
        Ok(self.stores.assignments.assignments_for_order(order_id).await?)
    }

    pub async fn track(&self, code: &str) -> Result<TrackingView, AppError> {
        let code = code.trim().to_ascii_uppercase();
        let assignment = self
            .stores
            .assignments
            .find_by_tracking_code(&code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tracking code {code} not found")))?;

        let rider_first_name = match assignment.rider_id {
            Some(rider_id) => self
                .stores
                .riders
                .get_rider(rider_id)
                .await?
                .map(|rider| rider.first_name().to_string()),
            None => None,
        };

        Ok(TrackingView {
            tracking_code: assignment.tracking_code,
            status: assignment.status,
            estimated_minutes: assignment.estimated_minutes,
            rider_first_name,
            assigned_at: assignment.assigned_at,
            picked_up_at: assignment.picked_up_at,
            delivered_at: assignment.delivered_at,
            updated_at: assignment.updated_at,
        })
    }

    /// Claims `rider_id` for a ready order and opens its assignment.
    pub async fn assign_rider(&self, request: AssignRequest) -> Result<DeliveryAssignment, AppError> {
        let start = Instant::now();
        let result = self.try_assign(&request).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(AppError::RiderUnavailable(_)) => "rider_unavailable",
            Err(AppError::AlreadyAssigned(_)) => "already_assigned",
            Err(AppError::OrderAlreadyDelivered(_)) => "already_delivered",
            Err(_) => "error",
        };
        self.metrics
            .assignment_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .assignments_total
            .with_label_values(&[outcome])
            .inc();

        result
    }

    async fn try_assign(&self, request: &AssignRequest) -> Result<DeliveryAssignment, AppError> {
        let order = self.get_order(request.order_id).await?;
        if order.store_id != request.store_id {
            return Err(AppError::NotFound(format!("order {} not found", order.id)));
        }

        self.ensure_needs_rider(order.id).await?;

        let pricing = self.price(&order, request).await?;
        let rider = self.registry.claim(order.store_id, request.rider_id).await?;

        // Held until the `assigned` notifications are queued, so no later
        // transition of this assignment can queue ahead of them.
        let assignment_id = Uuid::new_v4();
        let lock = self.transition_lock(assignment_id);
        let _guard = lock.lock().await;

        // From here on the rider is busy; every failure path must release it.
        let assignment = match self
            .open_assignment(assignment_id, &order, &rider, &pricing)
            .await
        {
            Ok(assignment) => assignment,
            Err(err) => {
                self.transition_locks.remove(&assignment_id);
                warn!(
                    order_id = %order.id,
                    rider_id = %rider.id,
                    error = %err,
                    "assignment failed after claim; releasing rider"
                );
                self.release_with_retry(order.store_id, rider.id).await;
                return Err(err);
            }
        };

        info!(
            order_id = %order.id,
            rider_id = %rider.id,
            assignment_id = %assignment.id,
            fee = %assignment.delivery_fee,
            "rider assigned"
        );

        self.metrics
            .status_transitions_total
            .with_label_values(&[AssignmentStatus::Assigned.as_str()])
            .inc();
        let _ = self.events.send(assignment.clone());
        self.enqueue_notifications(&assignment, &order, Some(&rider));

        Ok(assignment)
    }

    /// Whether an order still wants a rider: nothing live and never delivered.
    pub async fn needs_rider(&self, order_id: Uuid) -> Result<bool, AppError> {
        match self.ensure_needs_rider(order_id).await {
            Ok(()) => Ok(true),
            Err(AppError::AlreadyAssigned(_) | AppError::OrderAlreadyDelivered(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn ensure_needs_rider(&self, order_id: Uuid) -> Result<(), AppError> {
        if self
            .stores
            .assignments
            .active_assignment_for_order(order_id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyAssigned(order_id));
        }

        let delivered = self
            .stores
            .assignments
            .assignments_for_order(order_id)
            .await?
            .iter()
            .any(|assignment| assignment.status == AssignmentStatus::Delivered);
        if delivered {
            return Err(AppError::OrderAlreadyDelivered(order_id));
        }

        Ok(())
    }

    fn transition_lock(&self, assignment_id: Uuid) -> Arc<Mutex<()>> {
        self.transition_locks.entry(assignment_id).or_default().clone()
    }

    async fn price(&self, order: &DeliveryOrder, request: &AssignRequest) -> Result<Pricing, AppError> {
        if let Some(zone_id) = request.zone_id {
            let zone = self.catalog.get(zone_id).await?;
            if zone.store_id != order.store_id {
                return Err(AppError::NotFound(format!("zone {zone_id} not found")));
            }
            let quote = quote(&zone, order.subtotal);
            return Ok(Pricing {
                zone_id: Some(zone.id),
                fee: quote.fee,
                estimated_minutes: Some(quote.estimated_minutes),
            });
        }

        if let Some(point) = &order.location {
            if let Some(matched) = self.catalog.resolve(order.store_id, point).await? {
                let quote = quote(&matched.zone, order.subtotal);
                return Ok(Pricing {
                    zone_id: Some(matched.zone.id),
                    fee: quote.fee,
                    estimated_minutes: Some(quote.estimated_minutes),
                });
            }
        }

        match request.manual_fee {
            Some(fee) if fee < Decimal::ZERO => {
                Err(AppError::BadRequest("manual_fee must not be negative".to_string()))
            }
            Some(fee) => Ok(Pricing {
                zone_id: None,
                fee,
                estimated_minutes: None,
            }),
            None => Err(AppError::ZoneNotResolved(order.id)),
        }
    }

    async fn open_assignment(
        &self,
        id: Uuid,
        order: &DeliveryOrder,
        rider: &Rider,
        pricing: &Pricing,
    ) -> Result<DeliveryAssignment, AppError> {
        let tracking_code = tracking::generate_unique(
            self.stores.assignments.as_ref(),
            self.policy.tracking_code_attempts,
        )
        .await?;

        let now = Utc::now();
        let assignment = DeliveryAssignment {
            id,
            store_id: order.store_id,
            order_id: order.id,
            rider_id: Some(rider.id),
            zone_id: pricing.zone_id,
            status: AssignmentStatus::Assigned,
            delivery_fee: pricing.fee,
            rider_earnings: rider_earnings(pricing.fee, self.policy.commission_rate),
            estimated_minutes: pricing.estimated_minutes,
            tracking_code,
            assigned_at: Some(now),
            accepted_at: None,
            picked_up_at: None,
            in_transit_at: None,
            delivered_at: None,
            failed_at: None,
            cancelled_at: None,
            failure_reason: None,
            updated_at: now,
        };

        if !self
            .stores
            .assignments
            .insert_assignment(assignment.clone())
            .await?
        {
            return Err(AppError::AlreadyAssigned(order.id));
        }

        Ok(assignment)
    }

    /// Applies one status transition. The write is conditioned on the status
    /// read here, so of two racing updates only the first lands.
    pub async fn advance_status(
        &self,
        assignment_id: Uuid,
        next: AssignmentStatus,
        data: AdvanceData,
    ) -> Result<DeliveryAssignment, AppError> {
        // Unknown ids never get a lock entry.
        self.get(assignment_id).await?;

        let lock = self.transition_lock(assignment_id);
        let guard = lock.lock().await;
        let current = self.get(assignment_id).await?;

        if current.status.is_terminal() {
            self.transition_locks.remove(&assignment_id);
            return Err(AppError::AssignmentAlreadyTerminal {
                id: current.id,
                status: current.status,
            });
        }

        // Entering `assigned` requires a rider claim, see `assign_rider`.
        if next == AssignmentStatus::Assigned || !current.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        let reason = data
            .reason
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty());
        if next == AssignmentStatus::Failed && reason.is_none() {
            return Err(AppError::MissingFailureReason);
        }

        // Loaded before the write so the notification can be queued right
        // after it commits, with no await in between.
        let recipients = self.notification_context(&current).await;

        let mut updated = current.clone();
        updated.stamp(next, Utc::now());
        if next == AssignmentStatus::Failed {
            updated.failure_reason = reason;
        }

        if !self
            .stores
            .assignments
            .update_assignment_if_status(updated.clone(), current.status)
            .await?
        {
            debug!(assignment_id = %assignment_id, to = %next, "status update lost a race");
            return Err(AppError::StatusConflict(assignment_id));
        }

        if let Some((order, rider)) = &recipients {
            self.enqueue_notifications(&updated, order, rider.as_ref());
        }
        let _ = self.events.send(updated.clone());
        if next.is_terminal() {
            self.transition_locks.remove(&assignment_id);
        }
        drop(guard);

        info!(
            assignment_id = %assignment_id,
            order_id = %updated.order_id,
            from = %current.status,
            to = %next,
            "assignment status changed"
        );
        self.metrics
            .status_transitions_total
            .with_label_values(&[next.as_str()])
            .inc();

        if next.is_terminal() {
            if let Some(rider_id) = updated.rider_id {
                self.release_with_retry(updated.store_id, rider_id).await;
                if next == AssignmentStatus::Delivered {
                    if let Err(err) = self.registry.record_delivery(updated.store_id, rider_id).await {
                        error!(rider_id = %rider_id, error = %err, "failed to count completed delivery");
                    }
                }
            }
        }

        Ok(updated)
    }

    /// The one edit allowed on a terminal assignment.
    pub async fn amend_failure_reason(
        &self,
        assignment_id: Uuid,
        reason: &str,
    ) -> Result<DeliveryAssignment, AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::MissingFailureReason);
        }

        let current = self.get(assignment_id).await?;
        if current.status != AssignmentStatus::Failed {
            return Err(AppError::BadRequest(format!(
                "assignment {assignment_id} is {}, only failed assignments carry a reason",
                current.status
            )));
        }

        let mut updated = current.clone();
        updated.failure_reason = Some(reason.to_string());
        updated.updated_at = Utc::now();

        if !self
            .stores
            .assignments
            .update_assignment_if_status(updated.clone(), AssignmentStatus::Failed)
            .await?
        {
            return Err(AppError::StatusConflict(assignment_id));
        }

        let _ = self.events.send(updated.clone());
        Ok(updated)
    }

    /// Compensating release. Retries with exponential backoff; exhausting the
    /// retries leaves the rider stuck `busy` and is reported as an alert.
    async fn release_with_retry(&self, store_id: Uuid, rider_id: Uuid) -> bool {
        let max_attempts = self.policy.release_retry_attempts.max(1);
        let mut backoff = self.policy.release_retry_backoff;

        for attempt in 1..=max_attempts {
            match self.registry.release(store_id, rider_id).await {
                Ok(status) => {
                    if attempt > 1 {
                        info!(rider_id = %rider_id, attempt, "rider released after retry");
                    }
                    debug!(rider_id = %rider_id, status = ?status, "rider released");
                    return true;
                }
                Err(err) => {
                    warn!(
                        rider_id = %rider_id,
                        attempt,
                        max_attempts,
                        error = %err,
                        "rider release failed, will retry"
                    );
                    if attempt < max_attempts {
                        sleep(backoff).await;
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }

        error!(
            alert = true,
            store_id = %store_id,
            rider_id = %rider_id,
            "rider left busy without an assignment: release failed after every retry"
        );
        self.metrics.rider_release_failures_total.inc();
        false
    }

    /// Order and rider for the messages of a transition. Lookup failures only
    /// cost the notification, never the transition.
    async fn notification_context(
        &self,
        assignment: &DeliveryAssignment,
    ) -> Option<(DeliveryOrder, Option<Rider>)> {
        let order = match self.stores.orders.get_order(assignment.order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!(order_id = %assignment.order_id, "order vanished; skipping notification");
                return None;
            }
            Err(err) => {
                warn!(order_id = %assignment.order_id, error = %err, "order lookup failed; skipping notification");
                return None;
            }
        };

        let rider = match assignment.rider_id {
            Some(rider_id) => match self.stores.riders.get_rider(rider_id).await {
                Ok(rider) => rider,
                Err(err) => {
                    warn!(rider_id = %rider_id, error = %err, "rider lookup failed; notifying without rider details");
                    None
                }
            },
            None => None,
        };

        Some((order, rider))
    }

    fn enqueue_notifications(
        &self,
        assignment: &DeliveryAssignment,
        order: &DeliveryOrder,
        rider: Option<&Rider>,
    ) {
        let customer = self.payload(assignment, order, rider, Recipient::Customer);
        self.notifications.enqueue(NotificationJob {
            payload: customer,
            prefer_whatsapp: order.prefer_whatsapp,
        });

        let rider_needs_message = matches!(
            assignment.status,
            AssignmentStatus::Assigned | AssignmentStatus::Cancelled
        );
        if rider_needs_message && rider.is_some() {
            self.notifications.enqueue(NotificationJob {
                payload: self.payload(assignment, order, rider, Recipient::Rider),
                prefer_whatsapp: true,
            });
        }
    }

    fn payload(
        &self,
        assignment: &DeliveryAssignment,
        order: &DeliveryOrder,
        rider: Option<&Rider>,
        recipient: Recipient,
    ) -> NotificationPayload {
        NotificationPayload {
            order_id: order.id,
            assignment_id: assignment.id,
            status: assignment.status,
            recipient,
            order_number: order.order_number.clone(),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            rider_name: rider.map(|r| r.name.clone()),
            rider_phone: rider.map(|r| r.phone.clone()),
            address: order.address.clone(),
            estimated_minutes: assignment.estimated_minutes,
            tracking_url: tracking::tracking_url(
                &self.policy.tracking_base_url,
                &assignment.tracking_code,
            ),
            failure_reason: assignment.failure_reason.clone(),
            country: order.country.clone(),
        }
    }
}

/// Rider's cut of a delivery fee, rounded to cents.
pub fn rider_earnings(fee: Decimal, commission_rate: Decimal) -> Decimal {
    (fee * commission_rate).round_dp(2)
}
